//! 叠加层：呼吸与说话时的点头
//!
//! 输出的是相对下层结果的旋转偏移，由合成器叠乘。

use std::f32::consts::TAU;

use glam::Quat;

use super::{AnimationContext, BoneOutput, LayerOutput};
use crate::skeleton::HumanoidBone;

/// 叠加层参数
#[derive(Clone, Debug)]
pub struct AdditiveLayer {
    // ========== 呼吸 ==========
    /// 呼吸频率（Hz），默认 0.25
    pub breathing_rate: f32,
    /// 胸部俯仰幅度（弧度），默认 0.02
    pub breathing_amplitude: f32,

    // ========== 说话点头 ==========
    /// 点头频率（Hz），默认 1.5
    pub nod_rate: f32,
    /// 点头幅度（弧度），默认 0.04
    pub nod_amplitude: f32,
    /// 说话状态切换的过渡速度（每秒），默认 4.0
    pub nod_blend_speed: f32,

    /// 呼吸 / 点头波形相位（弧度，[0, 2π)）
    pub(crate) breath_phase: f32,
    pub(crate) nod_phase: f32,
    pub(crate) nod_blend: f32,
}

impl Default for AdditiveLayer {
    fn default() -> Self {
        Self {
            breathing_rate: 0.25,
            breathing_amplitude: 0.02,
            nod_rate: 1.5,
            nod_amplitude: 0.04,
            nod_blend_speed: 4.0,
            breath_phase: 0.0,
            nod_phase: 0.0,
            nod_blend: 0.0,
        }
    }
}

impl AdditiveLayer {
    pub fn affected_bones(&self) -> Vec<HumanoidBone> {
        vec![HumanoidBone::Chest, HumanoidBone::Head]
    }

    pub fn update(&mut self, ctx: &AnimationContext) {
        if !ctx.delta_time.is_finite() || ctx.delta_time <= 0.0 {
            return;
        }
        self.breath_phase = (self.breath_phase + self.breathing_rate * TAU * ctx.delta_time).rem_euclid(TAU);
        self.nod_phase = (self.nod_phase + self.nod_rate * TAU * ctx.delta_time).rem_euclid(TAU);
        let target = if ctx.speech.is_speaking { 1.0 } else { 0.0 };
        let step = self.nod_blend_speed * ctx.delta_time;
        self.nod_blend += (target - self.nod_blend).clamp(-step, step);
    }

    pub fn evaluate(&self, _ctx: &AnimationContext) -> LayerOutput {
        let mut output = LayerOutput::default();

        let breath = self.breath_phase.sin() * self.breathing_amplitude;
        output
            .bones
            .insert(HumanoidBone::Chest, BoneOutput::rotation(Quat::from_rotation_x(breath)));

        if self.nod_blend > 0.0 {
            let nod = self.nod_phase.sin() * self.nod_amplitude * self.nod_blend;
            output
                .bones
                .insert(HumanoidBone::Head, BoneOutput::rotation(Quat::from_rotation_x(nod)));
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::SpeechState;

    #[test]
    fn test_breathing_bounded() {
        let mut layer = AdditiveLayer::default();
        let ctx = AnimationContext {
            delta_time: 0.1,
            ..Default::default()
        };
        for _ in 0..50 {
            layer.update(&ctx);
            let out = layer.evaluate(&ctx);
            let q = out.bones[&HumanoidBone::Chest].rotation.unwrap();
            let angle = 2.0 * q.w.clamp(-1.0, 1.0).acos();
            assert!(angle <= layer.breathing_amplitude + 1e-4);
        }
    }

    #[test]
    fn test_phase_stays_wrapped_over_long_sessions() {
        let mut layer = AdditiveLayer::default();
        let ctx = AnimationContext {
            delta_time: 0.1,
            ..Default::default()
        };
        // 10000 秒，恰好是呼吸周期（4 秒）的整数倍
        for _ in 0..100_000 {
            layer.update(&ctx);
            assert!((0.0..TAU).contains(&layer.breath_phase));
            assert!((0.0..TAU).contains(&layer.nod_phase));
        }
        let drift = layer.breath_phase.min(TAU - layer.breath_phase);
        assert!(drift < 0.05, "相位漂移 {}", drift);

        let q = layer.evaluate(&ctx).bones[&HumanoidBone::Chest].rotation.unwrap();
        assert!(q.angle_between(Quat::IDENTITY) < 2e-3);
    }

    #[test]
    fn test_nod_only_when_speaking() {
        let mut layer = AdditiveLayer::default();
        let quiet = AnimationContext {
            delta_time: 0.1,
            ..Default::default()
        };
        layer.update(&quiet);
        assert!(!layer.evaluate(&quiet).bones.contains_key(&HumanoidBone::Head));

        let talking = AnimationContext {
            delta_time: 0.1,
            speech: SpeechState { is_speaking: true, level: 0.8 },
            ..Default::default()
        };
        layer.update(&talking);
        assert!(layer.evaluate(&talking).bones.contains_key(&HumanoidBone::Head));
    }
}
