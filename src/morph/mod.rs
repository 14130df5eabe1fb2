//! 表情 → Morph 目标权重
//!
//! 表情由若干 Morph 绑定组成；合成器输出的表情权重经覆盖规则处理后
//! 解析为每个网格的 Morph 目标权重，供上传到 GPU。

mod manager;

pub use manager::{ActiveMorph, ExpressionManager};

use crate::animation::ExpressionKey;

/// 表情对另一组表情的覆盖方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverrideMode {
    #[default]
    None,
    /// 本表情激活时被覆盖组完全抑制
    Block,
    /// 被覆盖组按 `1 - weight` 缩放
    Blend,
}

/// 单个 Morph 目标绑定
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MorphBind {
    pub mesh: usize,
    pub morph_index: usize,
    pub weight: f32,
}

/// 表情定义
#[derive(Clone, Debug, PartialEq)]
pub struct ExpressionDef {
    pub key: ExpressionKey,
    pub binds: Vec<MorphBind>,
    /// 二值表情：权重 > 0.5 视为 1，否则 0
    pub is_binary: bool,
    pub override_blink: OverrideMode,
    pub override_mouth: OverrideMode,
    pub override_look_at: OverrideMode,
}

impl ExpressionDef {
    pub fn new(key: impl Into<ExpressionKey>, binds: Vec<MorphBind>) -> Self {
        Self {
            key: key.into(),
            binds,
            is_binary: false,
            override_blink: OverrideMode::None,
            override_mouth: OverrideMode::None,
            override_look_at: OverrideMode::None,
        }
    }
}
