//! 数学工具
//!
//! 四元数归一化 / 最短路径 slerp / 摆动-扭转分解，以及对偶四元数。

mod dual_quat;

pub use dual_quat::DualQuaternion;

use glam::{Quat, Vec3};

/// 归一化容差
const EPSILON: f32 = 1e-8;

/// 安全归一化：长度为零或非有限时返回单位四元数
#[inline]
pub fn normalize_or_identity(q: Quat) -> Quat {
    let len_sq = q.length_squared();
    if !len_sq.is_finite() || len_sq < EPSILON {
        return Quat::IDENTITY;
    }
    q * len_sq.sqrt().recip()
}

/// 两个旋转之间的夹角（度）
///
/// 利用双覆盖：点积取绝对值，`q` 与 `-q` 的夹角为 0。
pub fn angle_between_deg(a: Quat, b: Quat) -> f32 {
    let dot = normalize_or_identity(a)
        .dot(normalize_or_identity(b))
        .abs()
        .clamp(0.0, 1.0);
    (2.0 * dot.acos()).to_degrees()
}

/// 最短路径球面插值
///
/// 点积为负时先翻转终点，保证 `b` 与 `-b` 得到相同结果。
pub fn slerp_shortest(a: Quat, b: Quat, t: f32) -> Quat {
    let mut b = b;
    let mut dot = a.dot(b);
    if dot < 0.0 {
        b = -b;
        dot = -dot;
    }

    // 几乎重合时退化为归一化线性插值
    if dot > 0.9995 {
        return normalize_or_identity(a + (b - a) * t);
    }

    let theta = dot.clamp(-1.0, 1.0).acos();
    let sin_theta = theta.sin();
    let wa = ((1.0 - t) * theta).sin() / sin_theta;
    let wb = (t * theta).sin() / sin_theta;
    normalize_or_identity(a * wa + b * wb)
}

/// 摆动-扭转分解，返回 `(swing, twist)`，满足 `q = swing * twist`
///
/// 扭转分量由虚部在轴上的投影重新归一化得到；
/// 纯摆动（投影与实部都接近零）时扭转为单位四元数。
pub fn swing_twist(q: Quat, axis: Vec3) -> (Quat, Quat) {
    let axis = axis.normalize_or_zero();
    if axis == Vec3::ZERO {
        return (q, Quat::IDENTITY);
    }
    let proj = axis * q.xyz().dot(axis);
    let raw = Quat::from_xyzw(proj.x, proj.y, proj.z, q.w);
    let twist = if raw.length_squared() < EPSILON {
        Quat::IDENTITY
    } else {
        raw.normalize()
    };
    let swing = q * twist.conjugate();
    (swing, twist)
}

/// 绕轴的带符号扭转角（弧度，范围 [-π, π]）
pub fn twist_angle(q: Quat, axis: Vec3) -> f32 {
    let axis = axis.normalize_or_zero();
    let (_, mut twist) = swing_twist(q, axis);
    if twist.w < 0.0 {
        twist = -twist;
    }
    2.0 * twist.xyz().dot(axis).atan2(twist.w)
}

/// 四个分量是否都是有限值
#[inline]
pub fn quat_is_finite(q: Quat) -> bool {
    q.x.is_finite() && q.y.is_finite() && q.z.is_finite() && q.w.is_finite()
}
