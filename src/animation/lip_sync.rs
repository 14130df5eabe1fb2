//! 口型层
//!
//! 口型权重写入时钳制到 [0, 1]；本帧未被驱动的口型按指数衰减。
//! 优先级必须高于表情层，由合成器保证。

use std::collections::{HashMap, HashSet};

use super::{AnimationContext, ExpressionPreset, LayerOutput};

/// 衰减到此值以下视为零
const SILENT: f32 = 1e-3;

/// 口型
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Viseme {
    Aa,
    Ih,
    Ou,
    Ee,
    Oh,
    Custom(String),
}

impl Viseme {
    /// 对应的表情名称
    pub fn expression_name(&self) -> &str {
        match self {
            Viseme::Aa => ExpressionPreset::Aa.name(),
            Viseme::Ih => ExpressionPreset::Ih.name(),
            Viseme::Ou => ExpressionPreset::Ou.name(),
            Viseme::Ee => ExpressionPreset::Ee.name(),
            Viseme::Oh => ExpressionPreset::Oh.name(),
            Viseme::Custom(name) => name,
        }
    }
}

/// 口型层
#[derive(Clone, Debug)]
pub struct LipSyncLayer {
    weights: HashMap<Viseme, f32>,
    /// 本帧被驱动过的口型
    driven: HashSet<Viseme>,
    /// 衰减速率（每秒）
    pub decay_rate: f32,
}

impl Default for LipSyncLayer {
    fn default() -> Self {
        Self::new(crate::config::get_config().viseme_decay_rate)
    }
}

impl LipSyncLayer {
    pub fn new(decay_rate: f32) -> Self {
        Self {
            weights: HashMap::new(),
            driven: HashSet::new(),
            decay_rate: decay_rate.max(0.0),
        }
    }

    /// 写入口型权重，钳制到 [0, 1]
    pub fn set_viseme(&mut self, viseme: Viseme, weight: f32) {
        let weight = if weight.is_finite() { weight.clamp(0.0, 1.0) } else { 0.0 };
        self.driven.insert(viseme.clone());
        self.weights.insert(viseme, weight);
    }

    pub fn weight(&self, viseme: &Viseme) -> f32 {
        self.weights.get(viseme).copied().unwrap_or(0.0)
    }

    /// 立即清零
    pub fn silence(&mut self) {
        self.weights.clear();
        self.driven.clear();
    }

    pub fn update(&mut self, ctx: &AnimationContext) {
        let dt = if ctx.delta_time.is_finite() { ctx.delta_time.max(0.0) } else { 0.0 };
        let factor = (-self.decay_rate * dt).exp();
        let driven = &self.driven;
        self.weights.retain(|viseme, w| {
            if !driven.contains(viseme) {
                *w *= factor;
            }
            *w > SILENT
        });
        self.driven.clear();
    }

    pub fn evaluate(&self, _ctx: &AnimationContext) -> LayerOutput {
        let mut output = LayerOutput::default();
        for (viseme, &w) in &self.weights {
            output.morph_weights.insert(viseme.expression_name().to_string(), w);
        }
        output
    }
}
