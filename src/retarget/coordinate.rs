//! 坐标约定转换
//!
//! 都是固定的分量取反规则，不是一般意义的基变换。

use glam::{Quat, Vec3};

use crate::model::VrmVersion;
use crate::skeleton::{BoneAxisClass, HumanoidBone};

/// 手性转换：旋转 `(-x, -y, z, w)`
#[inline]
pub fn convert_rotation_handedness(q: Quat) -> Quat {
    Quat::from_xyzw(-q.x, -q.y, q.z, q.w)
}

/// 手性转换：平移 `(-x, y, -z)`
#[inline]
pub fn convert_translation_handedness(v: Vec3) -> Vec3 {
    Vec3::new(-v.x, v.y, -v.z)
}

/// 外部动画约定下的逐骨骼修正
///
/// - 中线骨骼：保留 X，取反 Y
/// - 肢体骨骼：取反 X，取反 Y
#[inline]
pub fn correct_for_axis_class(q: Quat, class: BoneAxisClass) -> Quat {
    match class {
        BoneAxisClass::Centerline => Quat::from_xyzw(q.x, -q.y, q.z, q.w),
        BoneAxisClass::Limb => Quat::from_xyzw(-q.x, -q.y, q.z, q.w),
    }
}

// ============================================================================
// 容器级竖直轴
// ============================================================================

/// 竖直轴约定
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpAxis {
    #[default]
    Y,
    Z,
}

/// 一次性的“站立”旋转，作用在模型 / 世界层级而不是逐骨骼
pub fn stand_up_rotation(from: UpAxis, to: UpAxis) -> Quat {
    match (from, to) {
        (UpAxis::Z, UpAxis::Y) => Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
        (UpAxis::Y, UpAxis::Z) => Quat::from_rotation_x(std::f32::consts::FRAC_PI_2),
        _ => Quat::IDENTITY,
    }
}

// ============================================================================
// 转换器
// ============================================================================

/// 动画数据的来源约定
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationConvention {
    /// VRM 动画，带规范代际
    Vrm(VrmVersion),
    /// 外部动画格式（镜像约定，按中线 / 肢体分类修正）
    External { up_axis: UpAxis },
}

impl Default for AnimationConvention {
    fn default() -> Self {
        AnimationConvention::Vrm(VrmVersion::V1)
    }
}

/// 把动画约定下的数值转换到目标模型约定
#[derive(Clone, Copy, Debug)]
pub struct CoordinateConverter {
    pub source: AnimationConvention,
    pub target: VrmVersion,
    /// 目标渲染器的竖直轴
    pub target_up: UpAxis,
}

impl CoordinateConverter {
    pub fn new(source: AnimationConvention, target: VrmVersion) -> Self {
        Self {
            source,
            target,
            target_up: UpAxis::Y,
        }
    }

    /// 是否需要手性转换（两代 VRM 之间）
    pub fn flips_handedness(&self) -> bool {
        matches!(self.source, AnimationConvention::Vrm(v) if v != self.target)
    }

    /// 逐骨骼旋转转换
    pub fn convert_rotation(&self, bone: HumanoidBone, q: Quat) -> Quat {
        match self.source {
            AnimationConvention::Vrm(version) if version != self.target => {
                convert_rotation_handedness(q)
            }
            AnimationConvention::Vrm(_) => q,
            AnimationConvention::External { .. } => correct_for_axis_class(q, bone.axis_class()),
        }
    }

    /// 平移转换（非人形节点轨道同样适用）
    pub fn convert_translation(&self, v: Vec3) -> Vec3 {
        match self.source {
            AnimationConvention::Vrm(version) if version != self.target => {
                convert_translation_handedness(v)
            }
            _ => v,
        }
    }

    /// 非人形节点的旋转（没有中线 / 肢体分类，只处理手性）
    pub fn convert_node_rotation(&self, q: Quat) -> Quat {
        if self.flips_handedness() {
            convert_rotation_handedness(q)
        } else {
            q
        }
    }

    /// 容器旋转
    pub fn container_rotation(&self) -> Quat {
        match self.source {
            AnimationConvention::External { up_axis } => stand_up_rotation(up_axis, self.target_up),
            AnimationConvention::Vrm(_) => Quat::IDENTITY,
        }
    }

    /// `containerRotation · perBoneResult`
    #[inline]
    pub fn compose_with_container(&self, per_bone: Quat) -> Quat {
        self.container_rotation() * per_bone
    }
}
