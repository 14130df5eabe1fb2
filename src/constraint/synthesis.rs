//! 扭转骨约束合成
//!
//! 人形映射里有扭转骨但文档没有给出约束时，
//! 为每个扭转骨生成一条以主骨骼为源、局部 X 轴的滚转约束。

use super::{NodeConstraint, RollAxis};
use crate::skeleton::{HumanoidBone, HumanoidBoneMap};

pub fn synthesize_twist_constraints(
    humanoid: &HumanoidBoneMap,
    existing: &[NodeConstraint],
    weight: f32,
) -> Vec<NodeConstraint> {
    let mut out = Vec::new();
    for &bone in HumanoidBone::ALL {
        let Some(base) = bone.twist_base() else {
            continue;
        };
        let (Some(target), Some(source)) = (humanoid.get(bone), humanoid.get(base)) else {
            continue;
        };
        if existing.iter().any(|c| c.target == target) {
            continue;
        }
        log::debug!("合成扭转约束: {} <- {}", bone.name(), base.name());
        out.push(NodeConstraint::roll(target, source, RollAxis::X, weight));
    }
    out
}
