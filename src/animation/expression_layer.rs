//! 表情层
//!
//! 保存表情键 → 权重，并可运行确定性的自动眨眼。
//! 眨眼覆盖（override）由 ExpressionManager 在解析 Morph 时处理。

use std::collections::HashMap;

use super::{AnimationContext, ExpressionKey, ExpressionPreset, LayerOutput};

/// 自动眨眼
#[derive(Clone, Debug)]
pub struct AutoBlink {
    /// 两次眨眼的间隔（秒），默认 4.0
    pub interval: f32,
    /// 单次眨眼时长（秒），默认 0.15
    pub duration: f32,
    timer: f32,
}

impl Default for AutoBlink {
    fn default() -> Self {
        Self {
            interval: 4.0,
            duration: 0.15,
            timer: 0.0,
        }
    }
}

impl AutoBlink {
    fn advance(&mut self, dt: f32) {
        let period = self.interval.max(self.duration) + self.duration;
        self.timer = (self.timer + dt) % period.max(f32::EPSILON);
    }

    /// 当前眨眼权重：闭眼再睁眼的三角波
    pub fn weight(&self) -> f32 {
        let t = self.timer - self.interval;
        if t < 0.0 || self.duration <= 0.0 {
            return 0.0;
        }
        let s = (t / self.duration).clamp(0.0, 1.0);
        1.0 - (2.0 * s - 1.0).abs()
    }
}

/// 表情层
#[derive(Clone, Debug, Default)]
pub struct ExpressionLayer {
    weights: HashMap<ExpressionKey, f32>,
    pub auto_blink: Option<AutoBlink>,
    /// 有覆盖眨眼的表情生效时暂停自动眨眼
    blink_suspended: bool,
}

impl ExpressionLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_blink(mut self, blink: AutoBlink) -> Self {
        self.auto_blink = Some(blink);
        self
    }

    /// 设置表情权重，钳制到 [0, 1]
    pub fn set_weight(&mut self, key: impl Into<ExpressionKey>, weight: f32) {
        let weight = if weight.is_finite() { weight.clamp(0.0, 1.0) } else { 0.0 };
        self.weights.insert(key.into(), weight);
    }

    pub fn weight(&self, key: &ExpressionKey) -> f32 {
        self.weights.get(key).copied().unwrap_or(0.0)
    }

    pub fn set_blink_suspended(&mut self, suspended: bool) {
        self.blink_suspended = suspended;
    }

    pub fn clear(&mut self) {
        self.weights.clear();
    }

    pub fn update(&mut self, ctx: &AnimationContext) {
        if let Some(blink) = &mut self.auto_blink {
            if ctx.delta_time.is_finite() && ctx.delta_time > 0.0 {
                blink.advance(ctx.delta_time);
            }
        }
    }

    pub fn evaluate(&self, _ctx: &AnimationContext) -> LayerOutput {
        let mut output = LayerOutput::default();
        for (key, &w) in &self.weights {
            if w > 0.0 {
                output.morph_weights.insert(key.name().to_string(), w);
            }
        }

        // 手动设置的眨眼优先
        let blink_key = ExpressionKey::Preset(ExpressionPreset::Blink);
        if let Some(blink) = self.auto_blink.as_ref().filter(|_| !self.blink_suspended) {
            if !self.weights.contains_key(&blink_key) {
                let w = blink.weight();
                if w > 0.0 {
                    output.morph_weights.insert(blink_key.name().to_string(), w);
                }
            }
        }
        output
    }
}

impl From<&str> for ExpressionKey {
    fn from(name: &str) -> Self {
        ExpressionKey::parse(name)
    }
}
