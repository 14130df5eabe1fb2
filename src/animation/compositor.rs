//! 动画层合成器
//!
//! 按优先级升序合成各层输出。每个通道（旋转 / 平移 / 缩放 / Morph）
//! 的合成方式由层类型决定：替换、叠加或加权混合。
//! 口型层的优先级始终高于所有表情层。

use std::collections::HashMap;

use glam::{Quat, Vec3};

use super::{AnimationContext, AnimationLayer, BlendMode, BoneOutput, LayerKind, LayerOutput, RestPose};
use crate::math::{normalize_or_identity, slerp_shortest};
use crate::skeleton::{HumanoidBone, NodeTransform};

/// 动画层合成器
#[derive(Clone, Debug, Default)]
pub struct AnimationCompositor {
    /// 按优先级升序（同优先级保持加入顺序）
    layers: Vec<AnimationLayer>,
    rest: RestPose,
    result: LayerOutput,
}

impl AnimationCompositor {
    pub fn new(rest: RestPose) -> Self {
        Self {
            layers: Vec::new(),
            rest,
            result: LayerOutput::default(),
        }
    }

    pub fn set_rest_pose(&mut self, rest: RestPose) {
        self.rest = rest;
    }

    // ========== 层管理 ==========

    /// 加入层；同 id 的旧层被替换
    pub fn add_layer(&mut self, layer: AnimationLayer) {
        if let Some(pos) = self.layers.iter().position(|l| l.id == layer.id) {
            log::debug!("替换动画层 '{}'", layer.id);
            self.layers.remove(pos);
        }
        self.layers.push(layer);
        self.enforce_lip_sync_priority();
        self.layers.sort_by_key(|l| l.priority);
    }

    pub fn remove_layer(&mut self, id: &str) -> Option<AnimationLayer> {
        let pos = self.layers.iter().position(|l| l.id == id)?;
        Some(self.layers.remove(pos))
    }

    pub fn layer(&self, id: &str) -> Option<&AnimationLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// 可变访问；不允许借此修改优先级（修改后调用 `resort`）
    pub fn layer_mut(&mut self, id: &str) -> Option<&mut AnimationLayer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn layers(&self) -> &[AnimationLayer] {
        &self.layers
    }

    /// 同 `layer_mut`，修改优先级后需调用 `resort`
    pub fn layers_mut(&mut self) -> &mut [AnimationLayer] {
        &mut self.layers
    }

    /// 优先级被外部修改后重新排序
    pub fn resort(&mut self) {
        self.enforce_lip_sync_priority();
        self.layers.sort_by_key(|l| l.priority);
    }

    /// 口型层必须压过表情层，否则提升到最高表情优先级 + 1
    fn enforce_lip_sync_priority(&mut self) {
        let Some(max_expression) = self
            .layers
            .iter()
            .filter(|l| matches!(l.kind, LayerKind::Expression(_)))
            .map(|l| l.priority)
            .max()
        else {
            return;
        };
        for layer in &mut self.layers {
            if matches!(layer.kind, LayerKind::LipSync(_)) && layer.priority <= max_expression {
                log::warn!(
                    "口型层 '{}' 优先级 {} 不高于表情层 {}，已提升",
                    layer.id,
                    layer.priority,
                    max_expression
                );
                layer.priority = max_expression + 1;
            }
        }
    }

    // ========== 每帧 ==========

    /// 推进所有层并合成本帧结果
    pub fn update(&mut self, ctx: &AnimationContext) {
        for layer in &mut self.layers {
            layer.update(ctx);
        }

        let mut result = LayerOutput::default();
        for layer in &self.layers {
            let weight = layer.effective_weight();
            if weight <= 0.0 {
                continue;
            }
            let output = layer.evaluate(ctx);
            if output.is_empty() {
                continue;
            }
            merge(&mut result, output, layer.blend_mode(), weight, &self.rest);
        }
        self.result = result;
    }

    // ========== 结果查询 ==========

    /// 合成结果赋给该骨骼的旋转；未被任何层触及时为 None
    #[inline]
    pub fn rotation(&self, bone: HumanoidBone) -> Option<Quat> {
        self.result.bones.get(&bone).and_then(|b| b.rotation)
    }

    #[inline]
    pub fn translation(&self, bone: HumanoidBone) -> Option<Vec3> {
        self.result.bones.get(&bone).and_then(|b| b.translation)
    }

    #[inline]
    pub fn scale(&self, bone: HumanoidBone) -> Option<Vec3> {
        self.result.bones.get(&bone).and_then(|b| b.scale)
    }

    pub fn bone(&self, bone: HumanoidBone) -> Option<&BoneOutput> {
        self.result.bones.get(&bone)
    }

    pub fn morph_weight(&self, name: &str) -> Option<f32> {
        self.result.morph_weights.get(name).copied()
    }

    pub fn output(&self) -> &LayerOutput {
        &self.result
    }

    pub fn root_motion_delta(&self) -> Vec3 {
        self.result.root_motion_delta
    }
}

/// 把一层输出合入累计结果
fn merge(result: &mut LayerOutput, output: LayerOutput, mode: BlendMode, weight: f32, rest: &RestPose) {
    for (bone, value) in output.bones {
        let base = rest.get(bone).copied().unwrap_or_default();
        let slot = result.bones.entry(bone).or_default();
        blend_bone(slot, &value, mode, weight, &base);
    }
    for (node, value) in output.nodes {
        let slot = result.nodes.entry(node).or_default();
        blend_bone(slot, &value, mode, weight, &NodeTransform::default());
    }
    for (name, value) in output.morph_weights {
        if !value.is_finite() {
            continue;
        }
        let prior = result.morph_weights.get(&name).copied();
        let blended = match mode {
            BlendMode::Additive => prior.unwrap_or(0.0) + value * weight,
            BlendMode::Replace | BlendMode::Blend => {
                let p = prior.unwrap_or(0.0);
                p + (value - p) * weight
            }
        };
        result.morph_weights.insert(name, blended.clamp(0.0, 1.0));
    }
    if output.root_motion_delta.is_finite() {
        result.root_motion_delta += output.root_motion_delta * weight;
    }
}

/// 单根骨骼各通道的合成
///
/// 下层没有意见时以静止姿态为起点，保证部分权重的层仍从静止姿态过渡。
fn blend_bone(slot: &mut BoneOutput, value: &BoneOutput, mode: BlendMode, weight: f32, rest: &NodeTransform) {
    if let Some(v) = value.rotation.filter(|q| q.is_finite()) {
        let v = normalize_or_identity(v);
        let prior = slot.rotation;
        slot.rotation = Some(match mode {
            BlendMode::Additive => {
                normalize_or_identity(prior.unwrap_or(rest.rotation) * slerp_shortest(Quat::IDENTITY, v, weight))
            }
            BlendMode::Replace | BlendMode::Blend => {
                if weight >= 1.0 {
                    v
                } else {
                    slerp_shortest(prior.unwrap_or(rest.rotation), v, weight)
                }
            }
        });
    }

    if let Some(v) = value.translation.filter(|t| t.is_finite()) {
        let prior = slot.translation.unwrap_or(rest.translation);
        slot.translation = Some(match mode {
            BlendMode::Additive => prior + v * weight,
            BlendMode::Replace | BlendMode::Blend => prior.lerp(v, weight),
        });
    }

    if let Some(v) = value.scale.filter(|s| s.is_finite()) {
        let prior = slot.scale.unwrap_or(rest.scale);
        slot.scale = Some(match mode {
            BlendMode::Additive => prior * Vec3::ONE.lerp(v, weight),
            BlendMode::Replace | BlendMode::Blend => prior.lerp(v, weight),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{
        AdditiveLayer, ClipBuilder, ClipLayer, ExpressionLayer, ExpressionPreset, JointTrack, LipSyncLayer, Sampler,
        TransformTracks, Viseme, PRIORITY_EXPRESSION,
    };
    use crate::math::angle_between_deg;
    use crate::model::VrmVersion;
    use crate::retarget::RotationRetargeter;
    use crate::skeleton::NodeSet;
    use std::sync::Arc;

    fn rest_pose() -> RestPose {
        let mut bones = HashMap::new();
        for bone in [HumanoidBone::Hips, HumanoidBone::Chest, HumanoidBone::Head] {
            bones.insert(bone, NodeTransform::default());
        }
        RestPose { bones }
    }

    /// 头部恒定绕 Y 旋转的片段层
    fn head_turn(angle: f32) -> ClipLayer {
        let mut builder = ClipBuilder::new("turn");
        builder.add_joint_track(
            HumanoidBone::Head,
            JointTrack::new(
                TransformTracks {
                    rotation: Some(Sampler::constant(Quat::from_rotation_y(angle))),
                    ..Default::default()
                },
                NodeTransform::default(),
            ),
        );
        ClipLayer::bind(
            Arc::new(builder.build()),
            rest_pose(),
            &NodeSet::new(),
            VrmVersion::V1,
            RotationRetargeter::default(),
        )
    }

    fn frame() -> AnimationContext<'static> {
        AnimationContext {
            delta_time: 1.0 / 60.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_higher_priority_replaces() {
        let mut c = AnimationCompositor::new(rest_pose());
        c.add_layer(AnimationLayer::clip("base", head_turn(0.5)));
        c.add_layer(AnimationLayer::clip("override", head_turn(1.0)).with_priority(50));
        c.update(&frame());
        let q = c.rotation(HumanoidBone::Head).unwrap();
        assert!(q.dot(Quat::from_rotation_y(1.0)).abs() > 0.9999);
        // 未触及的骨骼
        assert!(c.rotation(HumanoidBone::LeftHand).is_none());
    }

    #[test]
    fn test_partial_weight_blends() {
        let mut c = AnimationCompositor::new(rest_pose());
        c.add_layer(AnimationLayer::clip("base", head_turn(0.0)));
        c.add_layer(AnimationLayer::clip("half", head_turn(1.0)).with_priority(10).with_weight(0.5));
        c.update(&frame());
        let q = c.rotation(HumanoidBone::Head).unwrap();
        assert!((angle_between_deg(q, Quat::IDENTITY) - 0.5f32.to_degrees()).abs() < 0.05);
    }

    #[test]
    fn test_disabled_layer_ignored() {
        let mut c = AnimationCompositor::new(rest_pose());
        c.add_layer(AnimationLayer::clip("base", head_turn(0.5)));
        let mut top = AnimationLayer::clip("top", head_turn(1.0)).with_priority(10);
        top.enabled = false;
        c.add_layer(top);
        c.update(&frame());
        let q = c.rotation(HumanoidBone::Head).unwrap();
        assert!(q.dot(Quat::from_rotation_y(0.5)).abs() > 0.9999);
    }

    #[test]
    fn test_additive_stacks_on_base() {
        let mut c = AnimationCompositor::new(rest_pose());
        c.add_layer(AnimationLayer::clip("base", head_turn(0.5)));
        let additive = AdditiveLayer {
            nod_amplitude: 0.0,
            ..Default::default()
        };
        c.add_layer(AnimationLayer::additive("breath", additive));
        for _ in 0..30 {
            c.update(&frame());
        }
        // 基础层的头部旋转保持不变
        let head = c.rotation(HumanoidBone::Head).unwrap();
        assert!(head.dot(Quat::from_rotation_y(0.5)).abs() > 0.9999);
        // 胸部只有呼吸偏移
        let chest = c.rotation(HumanoidBone::Chest).unwrap();
        assert!(angle_between_deg(chest, Quat::IDENTITY) < 2.0);
    }

    #[test]
    fn test_lip_sync_priority_enforced() {
        let mut c = AnimationCompositor::new(rest_pose());
        let mut expression = ExpressionLayer::new();
        expression.set_weight(ExpressionPreset::Aa, 0.2);
        c.add_layer(AnimationLayer::expression("face", expression));

        let mut lips = LipSyncLayer::new(18.0);
        lips.set_viseme(Viseme::Aa, 0.9);
        c.add_layer(AnimationLayer::lip_sync("lips", lips).with_priority(PRIORITY_EXPRESSION - 50));

        assert_eq!(c.layer("lips").unwrap().priority, PRIORITY_EXPRESSION + 1);
        assert_eq!(c.layers().last().unwrap().id, "lips");

        c.update(&AnimationContext::default());
        assert!((c.morph_weight("aa").unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_empty_compositor_no_opinion() {
        let mut c = AnimationCompositor::new(rest_pose());
        c.update(&frame());
        assert!(c.output().is_empty());
        assert!(c.rotation(HumanoidBone::Hips).is_none());
        assert!(c.morph_weight("blink").is_none());
    }

    #[test]
    fn test_remove_layer() {
        let mut c = AnimationCompositor::new(rest_pose());
        c.add_layer(AnimationLayer::clip("base", head_turn(0.5)));
        assert!(c.remove_layer("base").is_some());
        assert!(c.remove_layer("base").is_none());
        c.update(&frame());
        assert!(c.rotation(HumanoidBone::Head).is_none());
    }
}
