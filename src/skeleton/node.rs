//! 场景节点
//!
//! SceneNode 是骨骼系统的核心单元：保存静止姿态、当前局部 TRS，
//! 以及缓存的局部 / 世界矩阵。父子关系只存竞技场索引。

use bitflags::bitflags;
use glam::{Mat4, Quat, Vec3};

use super::NodeTransform;
use crate::math::quat_is_finite;

// ============================================================================
// 节点标志
// ============================================================================

bitflags! {
    /// 节点标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct NodeFlags: u32 {
        /// 映射到某个人形骨骼角色
        const HUMANOID = 1 << 0;
        /// 被某个蒙皮引用为关节
        const SKIN_JOINT = 1 << 1;
        /// 弹簧骨骼关节（物理写回）
        const SPRING_JOINT = 1 << 2;
        /// 节点约束的目标
        const CONSTRAINED = 1 << 3;
        /// 本帧被动画写入
        const ANIMATED = 1 << 4;
    }
}

// ============================================================================
// 场景节点
// ============================================================================

/// 场景节点
#[derive(Clone, Debug)]
pub struct SceneNode {
    // ========== 静态数据 ==========
    /// 节点索引
    pub index: usize,
    /// 节点名称
    pub name: Option<String>,
    /// 父节点索引（首次写入生效）
    pub parent: Option<usize>,
    /// 子节点索引
    pub children: Vec<usize>,
    /// 静止姿态（加载时的 TRS）
    pub rest: NodeTransform,
    /// 标志位
    pub flags: NodeFlags,

    // ========== 动态数据 ==========
    /// 当前局部变换
    pub transform: NodeTransform,
    /// 局部矩阵
    pub local_matrix: Mat4,
    /// 世界矩阵
    pub world_matrix: Mat4,
}

impl SceneNode {
    pub fn new(index: usize, name: Option<String>, rest: NodeTransform) -> Self {
        let local = rest.to_matrix();
        Self {
            index,
            name,
            parent: None,
            children: Vec::new(),
            rest,
            flags: NodeFlags::empty(),
            transform: rest,
            local_matrix: local,
            world_matrix: local,
        }
    }

    /// 由当前 TRS 计算局部矩阵
    #[inline]
    pub fn compute_local_matrix(&mut self) {
        self.local_matrix = self.transform.to_matrix();
    }

    /// 恢复静止姿态
    pub fn reset_to_rest(&mut self) {
        self.transform = self.rest;
        self.flags.remove(NodeFlags::ANIMATED);
    }

    /// 写入局部旋转；非有限值被拒绝并返回 false
    pub fn set_rotation(&mut self, rotation: Quat) -> bool {
        if !quat_is_finite(rotation) {
            return false;
        }
        self.transform.rotation = rotation;
        true
    }

    /// 写入局部平移；非有限值被拒绝并返回 false
    pub fn set_translation(&mut self, translation: Vec3) -> bool {
        if !translation.is_finite() {
            return false;
        }
        self.transform.translation = translation;
        true
    }

    /// 写入局部缩放；非有限值被拒绝并返回 false
    pub fn set_scale(&mut self, scale: Vec3) -> bool {
        if !scale.is_finite() {
            return false;
        }
        self.transform.scale = scale;
        true
    }

    #[inline]
    pub fn world_position(&self) -> Vec3 {
        self.world_matrix.w_axis.truncate()
    }

    #[inline]
    pub fn world_rotation(&self) -> Quat {
        let (_, rotation, _) = self.world_matrix.to_scale_rotation_translation();
        rotation
    }
}
