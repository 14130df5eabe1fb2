//! 骨骼系统
//!
//! 核心设计思想：
//! - SceneNode: 单个节点（TRS + 缓存矩阵），父子关系只存索引
//! - NodeSet: 节点竞技场，负责层次构建与自顶向下的世界变换传播
//! - HumanoidBoneMap: 人形骨骼角色 → 节点索引
//! - ik_solver: 两骨骼 IK

mod humanoid;
mod humanoid_map;
mod ik_solver;
mod node;
mod node_set;
mod skin;

pub use humanoid::{BoneAxisClass, HumanoidBone};
pub use humanoid_map::HumanoidBoneMap;
pub use ik_solver::{solve_two_bone, TwoBoneIkSolution};
pub use node::{NodeFlags, SceneNode};
pub use node_set::NodeSet;
pub use skin::Skin;

use glam::{Mat4, Quat, Vec3};

use crate::math::{normalize_or_identity, quat_is_finite, slerp_shortest};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 节点局部变换数据
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl NodeTransform {
    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self { translation, rotation, scale }
    }

    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 从矩阵分解
    #[inline]
    pub fn from_matrix(m: Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self { translation, rotation, scale }
    }

    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.scale.is_finite() && quat_is_finite(self.rotation)
    }

    /// 插值（旋转走最短路径）
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            translation: self.translation.lerp(other.translation, t),
            rotation: slerp_shortest(self.rotation, other.rotation, t),
            scale: self.scale.lerp(other.scale, t),
        }
    }

    /// 旋转重新归一化
    pub fn normalized(mut self) -> Self {
        self.rotation = normalize_or_identity(self.rotation);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_matrix_roundtrip() {
        let t = NodeTransform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(0.5),
            Vec3::ONE,
        );
        let back = NodeTransform::from_matrix(t.to_matrix());
        assert!((back.translation - t.translation).length() < 1e-5);
        assert!(back.rotation.dot(t.rotation).abs() > 0.9999);
    }

    #[test]
    fn test_transform_lerp_midpoint() {
        let a = NodeTransform::default();
        let b = NodeTransform::new(Vec3::new(2.0, 0.0, 0.0), Quat::from_rotation_z(1.0), Vec3::ONE);
        let mid = a.lerp(&b, 0.5);
        assert!((mid.translation.x - 1.0).abs() < 1e-6);
        assert!(mid.rotation.dot(Quat::from_rotation_z(0.5)).abs() > 0.9999);
    }
}
