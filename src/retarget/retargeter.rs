//! 静止姿态增量重定向
//!
//! `delta = inv(animRest) * animRot`，`result = modelRest * delta`。
//! 两个静止姿态夹角接近 180° 时该公式把“无运动”映射成翻转（网格塌缩），
//! 因此夹角达到阈值时直接透传动画旋转。

use glam::{Quat, Vec3};

use crate::math::{angle_between_deg, normalize_or_identity};

/// 是否使用增量重定向
///
/// 夹角用 `2·acos(|dot|)` 计算，`q` 与 `-q` 视为同一旋转。
pub fn should_use_delta_retargeting(
    animation_rest: Quat,
    model_rest: Quat,
    threshold_deg: f32,
) -> bool {
    angle_between_deg(animation_rest, model_rest) < threshold_deg
}

/// 旋转重定向器
#[derive(Clone, Copy, Debug)]
pub struct RotationRetargeter {
    /// 安全阈值（度）
    pub threshold_deg: f32,
}

impl Default for RotationRetargeter {
    fn default() -> Self {
        Self { threshold_deg: 90.0 }
    }
}

impl RotationRetargeter {
    pub fn new(threshold_deg: f32) -> Self {
        Self { threshold_deg }
    }

    /// 使用全局运行时配置中的阈值
    pub fn from_config() -> Self {
        Self::new(crate::config::get_config().retarget_safety_threshold_deg)
    }

    #[inline]
    pub fn uses_delta(&self, animation_rest: Quat, model_rest: Quat) -> bool {
        should_use_delta_retargeting(animation_rest, model_rest, self.threshold_deg)
    }

    /// 把动画旋转换算到模型局部空间
    pub fn retarget_rotation(&self, animation_rest: Quat, model_rest: Quat, animation_rotation: Quat) -> Quat {
        if !self.uses_delta(animation_rest, model_rest) {
            log::trace!(
                "静止姿态夹角 {:.1}° 超过阈值，绕过增量重定向",
                angle_between_deg(animation_rest, model_rest)
            );
            return normalize_or_identity(animation_rotation);
        }
        let delta = normalize_or_identity(
            normalize_or_identity(animation_rest).inverse() * normalize_or_identity(animation_rotation),
        );
        normalize_or_identity(normalize_or_identity(model_rest) * delta)
    }

    /// 髋部平移：相对动画静止位置的位移按髋高比例缩放后叠加到模型静止位置
    pub fn retarget_translation(
        &self,
        animation_rest: Vec3,
        model_rest: Vec3,
        animation_translation: Vec3,
    ) -> Vec3 {
        let scale = if animation_rest.y.abs() > 1e-4 && model_rest.y.abs() > 1e-4 {
            model_rest.y / animation_rest.y
        } else {
            1.0
        };
        let result = model_rest + (animation_translation - animation_rest) * scale;
        if result.is_finite() {
            result
        } else {
            model_rest
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_170_degrees_bypasses() {
        let a = Quat::IDENTITY;
        let b = Quat::from_rotation_y(170f32.to_radians());
        assert!(!should_use_delta_retargeting(a, b, 90.0));
    }

    #[test]
    fn test_45_degrees_uses_delta() {
        let a = Quat::IDENTITY;
        let b = Quat::from_rotation_y(45f32.to_radians());
        assert!(should_use_delta_retargeting(a, b, 90.0));
    }

    #[test]
    fn test_near_180_bug_case_bypasses() {
        // 两个静止姿态相差约 179.8°
        let animation_rest = Quat::from_xyzw(0.0, 0.0, 0.0, 1.0);
        let model_rest = Quat::from_xyzw(0.0, 0.999_998_5, 0.0, 0.001_745_3).normalize();
        let angle = angle_between_deg(animation_rest, model_rest);
        assert!((angle - 179.8).abs() < 0.05, "angle={}", angle);
        assert!(!should_use_delta_retargeting(animation_rest, model_rest, 90.0));

        // 绕过时“无运动”保持无运动，而不是翻转 180°
        let retargeter = RotationRetargeter::default();
        let result = retargeter.retarget_rotation(animation_rest, model_rest, animation_rest);
        assert!(angle_between_deg(result, Quat::IDENTITY) < 0.01);
    }

    #[test]
    fn test_double_cover_rest_uses_delta() {
        let rest = Quat::from_rotation_z(0.6);
        assert!(should_use_delta_retargeting(rest, -rest, 90.0));
    }

    #[test]
    fn test_delta_composes_angle() {
        let retargeter = RotationRetargeter::default();
        let animation_rest = Quat::IDENTITY;
        let model_rest = Quat::from_rotation_y(45f32.to_radians());
        let motion = Quat::from_rotation_x(30f32.to_radians());
        let result = retargeter.retarget_rotation(animation_rest, model_rest, motion);

        let expected = model_rest * motion;
        assert!(result.dot(expected).abs() > 0.9999);
        assert!((angle_between_deg(result, model_rest) - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_threshold_configurable() {
        let strict = RotationRetargeter::new(30.0);
        let a = Quat::IDENTITY;
        let b = Quat::from_rotation_y(45f32.to_radians());
        assert!(!strict.uses_delta(a, b));
    }

    #[test]
    fn test_translation_scaled_by_hip_height() {
        let retargeter = RotationRetargeter::default();
        let result = retargeter.retarget_translation(
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.8, 0.0),
            Vec3::new(0.5, 1.0, 0.0),
        );
        assert!((result - Vec3::new(0.4, 0.8, 0.0)).length() < 1e-6);
    }
}
