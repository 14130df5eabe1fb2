//! 节点约束
//!
//! 滚转 / 瞄准 / 旋转三种约束，在动画写回之后、最终世界变换传播之前求解。

mod solver;
mod synthesis;

pub use solver::{aim_rotation, roll_rotation, rotation_copy, ConstraintSolver};
pub use synthesis::synthesize_twist_constraints;

use glam::Vec3;

/// 滚转轴（目标局部空间）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RollAxis {
    X,
    Y,
    Z,
}

impl RollAxis {
    pub fn to_vec3(self) -> Vec3 {
        match self {
            RollAxis::X => Vec3::X,
            RollAxis::Y => Vec3::Y,
            RollAxis::Z => Vec3::Z,
        }
    }
}

/// 瞄准轴（目标局部空间）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AimAxis {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl AimAxis {
    pub fn to_vec3(self) -> Vec3 {
        match self {
            AimAxis::PositiveX => Vec3::X,
            AimAxis::NegativeX => Vec3::NEG_X,
            AimAxis::PositiveY => Vec3::Y,
            AimAxis::NegativeY => Vec3::NEG_Y,
            AimAxis::PositiveZ => Vec3::Z,
            AimAxis::NegativeZ => Vec3::NEG_Z,
        }
    }
}

/// 约束类型
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstraintKind {
    /// 把源节点绕轴的扭转按权重传给目标，忽略摆动
    Roll { source: usize, axis: RollAxis, weight: f32 },
    /// 旋转目标使局部轴指向源节点位置
    Aim { source: usize, aim_axis: AimAxis, weight: f32 },
    /// 按权重复制源节点旋转
    Rotation { source: usize, weight: f32 },
}

impl ConstraintKind {
    pub fn source(&self) -> usize {
        match *self {
            ConstraintKind::Roll { source, .. }
            | ConstraintKind::Aim { source, .. }
            | ConstraintKind::Rotation { source, .. } => source,
        }
    }

    pub fn weight(&self) -> f32 {
        match *self {
            ConstraintKind::Roll { weight, .. }
            | ConstraintKind::Aim { weight, .. }
            | ConstraintKind::Rotation { weight, .. } => weight,
        }
    }
}

/// 节点约束
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeConstraint {
    /// 目标节点
    pub target: usize,
    pub kind: ConstraintKind,
}

impl NodeConstraint {
    pub fn roll(target: usize, source: usize, axis: RollAxis, weight: f32) -> Self {
        Self {
            target,
            kind: ConstraintKind::Roll { source, axis, weight },
        }
    }

    pub fn aim(target: usize, source: usize, aim_axis: AimAxis, weight: f32) -> Self {
        Self {
            target,
            kind: ConstraintKind::Aim { source, aim_axis, weight },
        }
    }

    pub fn rotation(target: usize, source: usize, weight: f32) -> Self {
        Self {
            target,
            kind: ConstraintKind::Rotation { source, weight },
        }
    }
}
