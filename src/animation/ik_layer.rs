//! IK 层：两骨骼肢体求解 + 脚部锁定
//!
//! 从上一帧传播后的姿态快照读取关节世界位置，输出根 / 中间关节的局部旋转。
//! 脚部着地时若没有显式目标，以锁定位置作为目标，消除滑步。

use std::collections::HashMap;

use glam::{Quat, Vec3};

use super::{AnimationContext, BoneOutput, FootContactConfig, FootContactDetector, LayerOutput, PoseSnapshot};
use crate::math::slerp_shortest;
use crate::skeleton::{solve_two_bone, HumanoidBone};

/// 可求解的肢体
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LimbChain {
    LeftLeg,
    RightLeg,
    LeftArm,
    RightArm,
}

impl LimbChain {
    pub const ALL: [LimbChain; 4] = [Self::LeftLeg, Self::RightLeg, Self::LeftArm, Self::RightArm];

    /// (根, 中间, 末端)
    pub fn bones(self) -> (HumanoidBone, HumanoidBone, HumanoidBone) {
        use HumanoidBone::*;
        match self {
            Self::LeftLeg => (LeftUpperLeg, LeftLowerLeg, LeftFoot),
            Self::RightLeg => (RightUpperLeg, RightLowerLeg, RightFoot),
            Self::LeftArm => (LeftUpperArm, LeftLowerArm, LeftHand),
            Self::RightArm => (RightUpperArm, RightLowerArm, RightHand),
        }
    }

    /// 默认极向量：膝盖朝前，手肘朝后
    pub fn default_pole(self) -> Vec3 {
        match self {
            Self::LeftLeg | Self::RightLeg => Vec3::Z,
            Self::LeftArm | Self::RightArm => Vec3::NEG_Z,
        }
    }

    fn foot_index(self) -> Option<usize> {
        match self {
            Self::LeftLeg => Some(0),
            Self::RightLeg => Some(1),
            _ => None,
        }
    }
}

/// IK 目标（世界空间）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IkTarget {
    pub position: Vec3,
    /// 弯曲平面方向
    pub pole: Vec3,
    /// 目标权重 [0, 1]
    pub weight: f32,
}

impl IkTarget {
    pub fn new(chain: LimbChain, position: Vec3) -> Self {
        Self {
            position,
            pole: chain.default_pole(),
            weight: 1.0,
        }
    }
}

/// IK 层
#[derive(Clone, Debug)]
pub struct IkLayer {
    targets: HashMap<LimbChain, IkTarget>,
    /// 启用脚部锁定
    pub foot_planting: bool,
    feet: [FootContactDetector; 2],
}

impl Default for IkLayer {
    fn default() -> Self {
        Self::new(FootContactConfig::default())
    }
}

impl IkLayer {
    pub fn new(foot_config: FootContactConfig) -> Self {
        Self {
            targets: HashMap::new(),
            foot_planting: true,
            feet: [
                FootContactDetector::new(foot_config),
                FootContactDetector::new(foot_config),
            ],
        }
    }

    pub fn set_target(&mut self, chain: LimbChain, target: IkTarget) {
        if target.position.is_finite() {
            self.targets.insert(chain, target);
        }
    }

    pub fn clear_target(&mut self, chain: LimbChain) {
        self.targets.remove(&chain);
    }

    pub fn target(&self, chain: LimbChain) -> Option<&IkTarget> {
        self.targets.get(&chain)
    }

    /// 0 = 左脚，1 = 右脚
    pub fn foot(&self, index: usize) -> Option<&FootContactDetector> {
        self.feet.get(index)
    }

    /// 清除脚部状态（瞬移、切换片段后调用）
    pub fn reset_feet(&mut self) {
        for foot in &mut self.feet {
            foot.reset();
        }
    }

    pub fn affected_bones(&self) -> Vec<HumanoidBone> {
        let mut bones = Vec::new();
        for chain in LimbChain::ALL {
            if self.active_target(chain).is_some() {
                let (root, mid, _) = chain.bones();
                bones.push(root);
                bones.push(mid);
            }
        }
        bones
    }

    pub fn update(&mut self, ctx: &AnimationContext) {
        if !self.foot_planting {
            return;
        }
        let Some(pose) = ctx.pose else {
            return;
        };
        for (foot, bone) in self.feet.iter_mut().zip([HumanoidBone::LeftFoot, HumanoidBone::RightFoot]) {
            if let Some(p) = pose.get(bone) {
                foot.update(p.position, ctx.delta_time);
            }
        }
    }

    pub fn evaluate(&self, ctx: &AnimationContext) -> LayerOutput {
        let mut output = LayerOutput::default();
        let Some(pose) = ctx.pose else {
            return output;
        };
        for chain in LimbChain::ALL {
            let Some(target) = self.active_target(chain) else {
                continue;
            };
            if let Some((root_local, mid_local)) = solve_chain(pose, chain, &target) {
                let (root, mid, _) = chain.bones();
                output.bones.insert(root, BoneOutput::rotation(root_local));
                output.bones.insert(mid, BoneOutput::rotation(mid_local));
            }
        }
        output
    }

    /// 显式目标优先，其次是着地脚的锁定位置
    fn active_target(&self, chain: LimbChain) -> Option<IkTarget> {
        if let Some(target) = self.targets.get(&chain) {
            return Some(*target);
        }
        if !self.foot_planting {
            return None;
        }
        let foot = &self.feet[chain.foot_index()?];
        foot.locked_position().map(|p| IkTarget::new(chain, p))
    }
}

/// 求解一条肢体，返回 (根局部旋转, 中间局部旋转)
fn solve_chain(pose: &PoseSnapshot, chain: LimbChain, target: &IkTarget) -> Option<(Quat, Quat)> {
    let (root_bone, mid_bone, end_bone) = chain.bones();
    let root = pose.get(root_bone)?;
    let mid = pose.get(mid_bone)?;
    let end = pose.get(end_bone)?;

    let solution = solve_two_bone(root.position, mid.position, end.position, target.position, target.pole)?;
    let (root_local, mid_local) = solution.to_local(root.parent_rotation, root.rotation, mid.rotation);

    let weight = if target.weight.is_finite() { target.weight.clamp(0.0, 1.0) } else { 0.0 };
    if weight >= 1.0 {
        return Some((root_local, mid_local));
    }
    let current_root = root.parent_rotation.inverse() * root.rotation;
    let current_mid = root.rotation.inverse() * mid.rotation;
    Some((
        slerp_shortest(current_root, root_local, weight),
        slerp_shortest(current_mid, mid_local, weight),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::BonePose;

    /// 直立的左腿：髋 (0.1,1,0) → 膝 (0.1,0.5,0) → 脚 (0.1,0.05,0)
    fn standing_pose(foot_y: f32) -> PoseSnapshot {
        let mut bones = HashMap::new();
        let at = |p: Vec3| BonePose {
            position: p,
            rotation: Quat::IDENTITY,
            parent_rotation: Quat::IDENTITY,
        };
        bones.insert(HumanoidBone::LeftUpperLeg, at(Vec3::new(0.1, 1.0, 0.0)));
        bones.insert(HumanoidBone::LeftLowerLeg, at(Vec3::new(0.1, 0.5, 0.0)));
        bones.insert(HumanoidBone::LeftFoot, at(Vec3::new(0.1, foot_y, 0.0)));
        PoseSnapshot { bones }
    }

    fn end_position(out: &LayerOutput) -> Vec3 {
        let root_q = out.bones[&HumanoidBone::LeftUpperLeg].rotation.unwrap();
        let mid_q = out.bones[&HumanoidBone::LeftLowerLeg].rotation.unwrap();
        let hip = Vec3::new(0.1, 1.0, 0.0);
        let knee = hip + root_q * Vec3::new(0.0, -0.5, 0.0);
        knee + root_q * mid_q * Vec3::new(0.0, -0.45, 0.0)
    }

    #[test]
    fn test_no_pose_no_output() {
        let mut layer = IkLayer::default();
        layer.set_target(LimbChain::LeftLeg, IkTarget::new(LimbChain::LeftLeg, Vec3::ZERO));
        assert!(layer.evaluate(&AnimationContext::default()).is_empty());
    }

    #[test]
    fn test_explicit_target_reached() {
        let pose = standing_pose(0.05);
        let mut layer = IkLayer::default();
        let target = Vec3::new(0.1, 0.3, 0.2);
        layer.set_target(LimbChain::LeftLeg, IkTarget::new(LimbChain::LeftLeg, target));
        let ctx = AnimationContext {
            pose: Some(&pose),
            ..Default::default()
        };
        let out = layer.evaluate(&ctx);
        assert!((end_position(&out) - target).length() < 1e-3);
        // 膝盖朝前
        let root_q = out.bones[&HumanoidBone::LeftUpperLeg].rotation.unwrap();
        assert!((root_q * Vec3::NEG_Y).z > 0.0);
    }

    #[test]
    fn test_planted_foot_becomes_target() {
        let pose = standing_pose(0.02);
        let mut layer = IkLayer::default();
        let ctx = AnimationContext {
            delta_time: 1.0 / 60.0,
            pose: Some(&pose),
            ..Default::default()
        };
        assert!(layer.affected_bones().is_empty());
        for _ in 0..4 {
            layer.update(&ctx);
        }
        assert!(layer.foot(0).unwrap().is_planted());
        assert_eq!(
            layer.affected_bones(),
            vec![HumanoidBone::LeftUpperLeg, HumanoidBone::LeftLowerLeg]
        );

        // 身体下沉后脚仍停在锁定位置
        let crouched = {
            let mut p = standing_pose(0.02);
            for pose in p.bones.values_mut() {
                pose.position.y -= 0.1;
            }
            p
        };
        let out = layer.evaluate(&AnimationContext {
            pose: Some(&crouched),
            ..ctx
        });
        let root_q = out.bones[&HumanoidBone::LeftUpperLeg].rotation.unwrap();
        let mid_q = out.bones[&HumanoidBone::LeftLowerLeg].rotation.unwrap();
        let hip = Vec3::new(0.1, 0.9, 0.0);
        let knee = hip + root_q * Vec3::new(0.0, -0.5, 0.0);
        let foot = knee + root_q * mid_q * Vec3::new(0.0, -0.48, 0.0);
        assert!((foot - Vec3::new(0.1, 0.02, 0.0)).length() < 1e-3);

        layer.reset_feet();
        assert!(layer.affected_bones().is_empty());
    }

    #[test]
    fn test_partial_weight_between_current_and_solved() {
        let pose = standing_pose(0.05);
        let mut layer = IkLayer::default();
        layer.set_target(
            LimbChain::LeftLeg,
            IkTarget {
                weight: 0.5,
                ..IkTarget::new(LimbChain::LeftLeg, Vec3::new(0.1, 0.3, 0.2))
            },
        );
        let out = layer.evaluate(&AnimationContext {
            pose: Some(&pose),
            ..Default::default()
        });
        let q = out.bones[&HumanoidBone::LeftUpperLeg].rotation.unwrap();
        assert!(q.dot(Quat::IDENTITY).abs() < 0.99999);
        assert!((q.length() - 1.0).abs() < 1e-4);
    }
}
