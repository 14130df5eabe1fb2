//! 加载器输出的数据模型
//!
//! 解析 glTF / VRM 文档不在本库范围内；加载器填好这些结构后
//! 交给 [`super::VrmRuntime::from_descriptor`]。

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};

use crate::constraint::NodeConstraint;
use crate::morph::ExpressionDef;
use crate::physics::SpringBoneDeclaration;
use crate::skeleton::HumanoidBone;

/// VRM 规范代际
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum VrmVersion {
    /// VRM 0.x
    V0,
    /// VRM 1.0
    #[default]
    V1,
}

/// 单个节点
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDescriptor {
    pub name: Option<String>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
}

impl Default for NodeDescriptor {
    fn default() -> Self {
        Self {
            name: None,
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            children: Vec::new(),
            mesh: None,
            skin: None,
        }
    }
}

/// 蒙皮
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkinDescriptor {
    pub name: Option<String>,
    pub joints: Vec<usize>,
    /// 为空时全部取单位矩阵
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// 网格（只关心 Morph 目标数）
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshDescriptor {
    pub name: Option<String>,
    pub morph_target_count: usize,
}

/// 完整模型描述
#[derive(Clone, Debug, Default)]
pub struct ModelDescriptor {
    pub version: VrmVersion,
    pub nodes: Vec<NodeDescriptor>,
    pub humanoid: HashMap<HumanoidBone, usize>,
    pub skins: Vec<SkinDescriptor>,
    pub meshes: Vec<MeshDescriptor>,
    pub spring: SpringBoneDeclaration,
    /// 文档中显式给出的节点约束
    pub constraints: Vec<NodeConstraint>,
    pub expressions: Vec<ExpressionDef>,
}

impl ModelDescriptor {
    /// 按 VRM 0.x 或 1.0 名称填入人形映射；无法识别的名称返回 false
    pub fn map_humanoid_bone(&mut self, name: &str, node: usize) -> bool {
        let bone = match self.version {
            VrmVersion::V0 => HumanoidBone::from_v0_name(name),
            VrmVersion::V1 => HumanoidBone::from_name(name),
        };
        match bone {
            Some(bone) => {
                self.humanoid.insert(bone, node);
                true
            }
            None => {
                log::debug!("未知人形骨骼名称 '{}'，忽略", name);
                false
            }
        }
    }
}
