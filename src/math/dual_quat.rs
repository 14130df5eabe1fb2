//! 对偶四元数
//!
//! GPU 蒙皮结构体，与着色器侧逐字节一致：
//! 32 字节，16 字节对齐，先实部 (x, y, z, w) 后对偶部 (x, y, z, w)。

use std::ops::Neg;

use glam::{Mat4, Quat, Vec3};
use static_assertions::const_assert_eq;

use super::{normalize_or_identity, quat_is_finite};

/// 刚体变换的对偶四元数表示
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DualQuaternion {
    /// 旋转（单位四元数）xyzw
    pub real: [f32; 4],
    /// 平移编码 `0.5 * t * real`，xyzw
    pub dual: [f32; 4],
}

const_assert_eq!(std::mem::size_of::<DualQuaternion>(), 32);
const_assert_eq!(std::mem::align_of::<DualQuaternion>(), 16);

impl Default for DualQuaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Neg for DualQuaternion {
    type Output = Self;

    /// 同一刚体变换的另一表示
    fn neg(self) -> Self {
        Self::from_quats(-self.real(), -self.dual())
    }
}

impl DualQuaternion {
    pub const IDENTITY: Self = Self {
        real: [0.0, 0.0, 0.0, 1.0],
        dual: [0.0, 0.0, 0.0, 0.0],
    };

    #[inline]
    pub fn from_quats(real: Quat, dual: Quat) -> Self {
        Self {
            real: real.to_array(),
            dual: dual.to_array(),
        }
    }

    #[inline]
    pub fn real(&self) -> Quat {
        Quat::from_array(self.real)
    }

    #[inline]
    pub fn dual(&self) -> Quat {
        Quat::from_array(self.dual)
    }

    /// 由旋转与平移构造
    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        let real = normalize_or_identity(rotation);
        let t = Quat::from_xyzw(translation.x, translation.y, translation.z, 0.0);
        Self::from_quats(real, (t * real) * 0.5)
    }

    /// 由关节矩阵分解构造（缩放被丢弃）
    ///
    /// 非有限矩阵返回单位变换，避免 NaN 进入调色板。
    pub fn from_mat4(m: &Mat4) -> Self {
        if !m.is_finite() {
            return Self::IDENTITY;
        }
        let (_, rotation, translation) = m.to_scale_rotation_translation();
        if !quat_is_finite(rotation) || !translation.is_finite() {
            return Self::IDENTITY;
        }
        Self::from_rotation_translation(rotation, translation)
    }

    /// 平移分量：`2 * dual * conj(real)`
    pub fn translation(&self) -> Vec3 {
        ((self.dual() * self.real().conjugate()) * 2.0).xyz()
    }

    pub fn rotation(&self) -> Quat {
        self.real()
    }

    /// 归一化：实部单位化，并去掉对偶部中与实部平行的分量
    pub fn normalized(&self) -> Self {
        let real = self.real();
        let len = real.length();
        if !len.is_finite() || len < 1e-8 {
            return Self::IDENTITY;
        }
        let inv = len.recip();
        let real = real * inv;
        let mut dual = self.dual() * inv;
        dual = dual - real * real.dot(dual);
        Self::from_quats(real, dual)
    }

    /// 变换点：先旋转，再加平移
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.real() * p + self.translation()
    }

    /// 变换法线：只旋转
    pub fn transform_normal(&self, n: Vec3) -> Vec3 {
        self.real() * n
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.real(), self.translation())
    }

    /// 加权混合多个对偶四元数
    ///
    /// 以第一个有效输入的实部为参照，把其余输入翻到同一半球后再求和，
    /// 否则 `q` 与 `-q` 会互相抵消。
    pub fn blend(inputs: &[(DualQuaternion, f32)]) -> Self {
        let pivot = match inputs.iter().find(|(_, w)| *w != 0.0) {
            Some((dq, _)) => dq.real(),
            None => return Self::IDENTITY,
        };

        let mut real = Quat::from_xyzw(0.0, 0.0, 0.0, 0.0);
        let mut dual = Quat::from_xyzw(0.0, 0.0, 0.0, 0.0);
        for (dq, weight) in inputs {
            let sign = if pivot.dot(dq.real()) < 0.0 { -1.0 } else { 1.0 };
            let w = weight * sign;
            real = real + dq.real() * w;
            dual = dual + dq.dual() * w;
        }
        Self::from_quats(real, dual).normalized()
    }
}
