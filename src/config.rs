//! 运行时配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。
//! 弹簧骨骼相关参数见 [`crate::physics::config`]。

use once_cell::sync::Lazy;
use std::sync::RwLock;

use crate::skinning::SkinningMode;
use crate::{Result, VrmError};

/// 校验严格度
///
/// - `Off`：仅 debug 日志
/// - `Warn`：warn 日志并记录到 [`ValidationReport`]，继续执行
/// - `Fail`：立即返回 [`VrmError::Validation`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValidationLevel {
    Off,
    #[default]
    Warn,
    Fail,
}

/// 运行时配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    // ========== 校验 ==========
    /// 校验严格度，默认 Warn
    pub validation_level: ValidationLevel,

    // ========== 蒙皮 ==========
    /// 调色板形式，默认线性混合（矩阵）
    pub skinning_mode: SkinningMode,
    /// 每个网格上传的最大活动 Morph 数，默认 8
    pub max_active_morphs: usize,

    // ========== 重定向 ==========
    /// 静止姿态夹角阈值（度），达到或超过时绕过增量重定向，默认 90.0
    pub retarget_safety_threshold_deg: f32,

    // ========== 口型 ==========
    /// 未驱动口型的指数衰减速率（每秒），默认 18.0
    /// 1.0 在 60Hz 下 10 帧后约为 0.05
    pub viseme_decay_rate: f32,

    // ========== 约束 ==========
    /// 缺少显式约束时是否为扭转骨合成滚转约束，默认 true
    pub enable_constraint_synthesis: bool,
    /// 合成滚转约束的权重，默认 0.5
    pub synthesized_twist_weight: f32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            validation_level: ValidationLevel::Warn,

            skinning_mode: SkinningMode::Linear,
            max_active_morphs: 8,

            // 经验值：接近 180° 时增量公式把“无运动”映射为翻转
            retarget_safety_threshold_deg: 90.0,

            viseme_decay_rate: 18.0,

            enable_constraint_synthesis: true,
            synthesized_twist_weight: 0.5,
        }
    }
}

/// 全局配置实例
static RUNTIME_CONFIG: Lazy<RwLock<RuntimeConfig>> = Lazy::new(|| {
    RwLock::new(RuntimeConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> RuntimeConfig {
    RUNTIME_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: RuntimeConfig) {
    *RUNTIME_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *RUNTIME_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = RuntimeConfig::default();
}

// ============================================================================
// 校验报告
// ============================================================================

/// 按严格度处理检测到的不一致
#[derive(Clone, Debug, Default)]
pub struct ValidationReport {
    level: ValidationLevel,
    issues: Vec<String>,
}

impl ValidationReport {
    pub fn new(level: ValidationLevel) -> Self {
        Self {
            level,
            issues: Vec::new(),
        }
    }

    pub fn level(&self) -> ValidationLevel {
        self.level
    }

    /// 上报一个问题；`Fail` 级别下返回错误
    pub fn report(&mut self, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        match self.level {
            ValidationLevel::Off => {
                log::debug!("校验: {}", message);
                Ok(())
            }
            ValidationLevel::Warn => {
                log::warn!("校验: {}", message);
                self.issues.push(message);
                Ok(())
            }
            ValidationLevel::Fail => Err(VrmError::Validation(message)),
        }
    }

    /// 已记录的问题（仅 Warn 级别会记录）
    pub fn issues(&self) -> &[String] {
        &self.issues
    }

    pub fn take_issues(&mut self) -> Vec<String> {
        std::mem::take(&mut self.issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = RuntimeConfig::default();
        assert_eq!(config.retarget_safety_threshold_deg, 90.0);
        assert_eq!(config.synthesized_twist_weight, 0.5);
        assert_eq!(config.validation_level, ValidationLevel::Warn);
    }

    #[test]
    fn test_report_levels() {
        let mut off = ValidationReport::new(ValidationLevel::Off);
        assert!(off.report("a").is_ok());
        assert!(off.issues().is_empty());

        let mut warn = ValidationReport::new(ValidationLevel::Warn);
        assert!(warn.report("b").is_ok());
        assert_eq!(warn.issues(), &["b".to_string()]);

        let mut fail = ValidationReport::new(ValidationLevel::Fail);
        assert!(matches!(fail.report("c"), Err(VrmError::Validation(_))));
    }
}
