//! 人形骨骼映射

use std::collections::HashMap;

use super::{HumanoidBone, NodeFlags, NodeSet};
use crate::{Result, VrmError};

/// 人形骨骼角色 → 节点索引
#[derive(Clone, Debug, Default)]
pub struct HumanoidBoneMap {
    bones: HashMap<HumanoidBone, usize>,
    node_to_bone: HashMap<usize, HumanoidBone>,
}

impl HumanoidBoneMap {
    /// 构建并校验：必需角色缺失或索引越界时拒绝模型
    pub fn new(bones: HashMap<HumanoidBone, usize>, node_count: usize) -> Result<Self> {
        for &required in HumanoidBone::REQUIRED {
            if !bones.contains_key(&required) {
                return Err(VrmError::MissingRequiredBone(required.name()));
            }
        }
        for &index in bones.values() {
            if index >= node_count {
                return Err(VrmError::NodeIndexOutOfRange { index, count: node_count });
            }
        }
        let node_to_bone = bones.iter().map(|(&bone, &node)| (node, bone)).collect();
        Ok(Self { bones, node_to_bone })
    }

    /// 给映射到的节点打上 HUMANOID 标志
    pub fn mark_nodes(&self, nodes: &mut NodeSet) {
        for &index in self.bones.values() {
            if let Some(node) = nodes.get_mut(index) {
                node.flags.insert(NodeFlags::HUMANOID);
            }
        }
    }

    #[inline]
    pub fn get(&self, bone: HumanoidBone) -> Option<usize> {
        self.bones.get(&bone).copied()
    }

    #[inline]
    pub fn contains(&self, bone: HumanoidBone) -> bool {
        self.bones.contains_key(&bone)
    }

    /// 反查节点对应的角色
    pub fn bone_for_node(&self, node: usize) -> Option<HumanoidBone> {
        self.node_to_bone.get(&node).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HumanoidBone, usize)> + '_ {
        self.bones.iter().map(|(&b, &n)| (b, n))
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}
