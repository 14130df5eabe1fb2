//! 动画层
//!
//! 层集合是封闭的（基础片段、叠加、表情、口型、IK），用枚举表达。
//! `evaluate()` 在两次 `update()` 之间是幂等的。

use std::collections::HashMap;

use glam::{Quat, Vec3};

use super::{AdditiveLayer, ClipLayer, ExpressionLayer, IkLayer, LipSyncLayer};
use crate::skeleton::{HumanoidBone, HumanoidBoneMap, NodeSet, NodeTransform};

// ============================================================================
// 优先级
// ============================================================================

pub const PRIORITY_BASE: i32 = 0;
pub const PRIORITY_ADDITIVE: i32 = 100;
pub const PRIORITY_EXPRESSION: i32 = 200;
pub const PRIORITY_LIP_SYNC: i32 = 300;
pub const PRIORITY_IK: i32 = 400;

// ============================================================================
// 上下文与输出
// ============================================================================

/// 说话状态
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpeechState {
    pub is_speaking: bool,
    /// 音量 [0, 1]
    pub level: f32,
}

/// 单根人形骨骼的世界姿态快照
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BonePose {
    pub position: Vec3,
    pub rotation: Quat,
    pub parent_rotation: Quat,
}

/// 最近一次传播后的人形骨骼世界姿态（IK 回读用）
#[derive(Clone, Debug, Default)]
pub struct PoseSnapshot {
    pub bones: HashMap<HumanoidBone, BonePose>,
}

impl PoseSnapshot {
    pub fn capture(nodes: &NodeSet, humanoid: &HumanoidBoneMap) -> Self {
        let bones = humanoid
            .iter()
            .map(|(bone, idx)| {
                (
                    bone,
                    BonePose {
                        position: nodes.world_position(idx),
                        rotation: nodes.world_rotation(idx),
                        parent_rotation: nodes.parent_world_rotation(idx),
                    },
                )
            })
            .collect();
        Self { bones }
    }

    #[inline]
    pub fn get(&self, bone: HumanoidBone) -> Option<&BonePose> {
        self.bones.get(&bone)
    }
}

/// 目标模型的人形骨骼静止姿态
#[derive(Clone, Debug, Default)]
pub struct RestPose {
    pub bones: HashMap<HumanoidBone, NodeTransform>,
}

impl RestPose {
    pub fn capture(nodes: &NodeSet, humanoid: &HumanoidBoneMap) -> Self {
        let bones = humanoid
            .iter()
            .filter_map(|(bone, idx)| nodes.get(idx).map(|n| (bone, n.rest)))
            .collect();
        Self { bones }
    }

    #[inline]
    pub fn get(&self, bone: HumanoidBone) -> Option<&NodeTransform> {
        self.bones.get(&bone)
    }
}

/// 每帧传给各层的上下文
#[derive(Clone, Copy, Debug, Default)]
pub struct AnimationContext<'a> {
    /// 累计时间（秒）
    pub time: f32,
    pub delta_time: f32,
    pub speech: SpeechState,
    pub pose: Option<&'a PoseSnapshot>,
}

/// 单根骨骼的程序化变换；None 表示该通道没有意见
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoneOutput {
    pub rotation: Option<Quat>,
    pub translation: Option<Vec3>,
    pub scale: Option<Vec3>,
}

impl BoneOutput {
    pub fn rotation(rotation: Quat) -> Self {
        Self {
            rotation: Some(rotation),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rotation.is_none() && self.translation.is_none() && self.scale.is_none()
    }
}

/// 层输出
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerOutput {
    pub bones: HashMap<HumanoidBone, BoneOutput>,
    /// 非人形节点（按节点索引）
    pub nodes: HashMap<usize, BoneOutput>,
    /// 表情 / Morph 名称 → 权重
    pub morph_weights: HashMap<String, f32>,
    /// 本帧根运动位移
    pub root_motion_delta: Vec3,
}

impl LayerOutput {
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
            && self.nodes.is_empty()
            && self.morph_weights.is_empty()
            && self.root_motion_delta == Vec3::ZERO
    }

    pub fn clear(&mut self) {
        self.bones.clear();
        self.nodes.clear();
        self.morph_weights.clear();
        self.root_motion_delta = Vec3::ZERO;
    }
}

// ============================================================================
// 层
// ============================================================================

/// 与下层结果的合成方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    /// 替换（按层权重插值）
    Replace,
    /// 叠加在下层结果之上
    Additive,
    /// 加权混合（IK）
    Blend,
}

/// 层的具体类型
#[derive(Clone, Debug)]
pub enum LayerKind {
    Clip(ClipLayer),
    Additive(AdditiveLayer),
    Expression(ExpressionLayer),
    LipSync(LipSyncLayer),
    Ik(IkLayer),
}

/// 动画层
#[derive(Clone, Debug)]
pub struct AnimationLayer {
    pub id: String,
    pub priority: i32,
    pub enabled: bool,
    /// 层权重 [0, 1]
    pub weight: f32,
    pub kind: LayerKind,
}

impl AnimationLayer {
    pub fn new(id: impl Into<String>, priority: i32, kind: LayerKind) -> Self {
        Self {
            id: id.into(),
            priority,
            enabled: true,
            weight: 1.0,
            kind,
        }
    }

    pub fn clip(id: impl Into<String>, layer: ClipLayer) -> Self {
        Self::new(id, PRIORITY_BASE, LayerKind::Clip(layer))
    }

    pub fn additive(id: impl Into<String>, layer: AdditiveLayer) -> Self {
        Self::new(id, PRIORITY_ADDITIVE, LayerKind::Additive(layer))
    }

    pub fn expression(id: impl Into<String>, layer: ExpressionLayer) -> Self {
        Self::new(id, PRIORITY_EXPRESSION, LayerKind::Expression(layer))
    }

    pub fn lip_sync(id: impl Into<String>, layer: LipSyncLayer) -> Self {
        Self::new(id, PRIORITY_LIP_SYNC, LayerKind::LipSync(layer))
    }

    pub fn ik(id: impl Into<String>, layer: IkLayer) -> Self {
        Self::new(id, PRIORITY_IK, LayerKind::Ik(layer))
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    /// 有效权重：禁用时为 0
    pub fn effective_weight(&self) -> f32 {
        if !self.enabled || !self.weight.is_finite() {
            return 0.0;
        }
        self.weight.clamp(0.0, 1.0)
    }

    pub fn blend_mode(&self) -> BlendMode {
        match self.kind {
            LayerKind::Clip(_) | LayerKind::Expression(_) | LayerKind::LipSync(_) => BlendMode::Replace,
            LayerKind::Additive(_) => BlendMode::Additive,
            LayerKind::Ik(_) => BlendMode::Blend,
        }
    }

    /// 声明影响的人形骨骼
    pub fn affected_bones(&self) -> Vec<HumanoidBone> {
        match &self.kind {
            LayerKind::Clip(l) => l.affected_bones(),
            LayerKind::Additive(l) => l.affected_bones(),
            LayerKind::Expression(_) | LayerKind::LipSync(_) => Vec::new(),
            LayerKind::Ik(l) => l.affected_bones(),
        }
    }

    /// 推进内部状态
    pub fn update(&mut self, ctx: &AnimationContext) {
        match &mut self.kind {
            LayerKind::Clip(l) => l.update(ctx),
            LayerKind::Additive(l) => l.update(ctx),
            LayerKind::Expression(l) => l.update(ctx),
            LayerKind::LipSync(l) => l.update(ctx),
            LayerKind::Ik(l) => l.update(ctx),
        }
    }

    /// 计算本帧输出；禁用或零权重时返回空输出
    pub fn evaluate(&self, ctx: &AnimationContext) -> LayerOutput {
        if self.effective_weight() <= 0.0 {
            return LayerOutput::default();
        }
        match &self.kind {
            LayerKind::Clip(l) => l.evaluate(ctx),
            LayerKind::Additive(l) => l.evaluate(ctx),
            LayerKind::Expression(l) => l.evaluate(ctx),
            LayerKind::LipSync(l) => l.evaluate(ctx),
            LayerKind::Ik(l) => l.evaluate(ctx),
        }
    }

    pub fn as_lip_sync_mut(&mut self) -> Option<&mut LipSyncLayer> {
        match &mut self.kind {
            LayerKind::LipSync(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_expression_mut(&mut self) -> Option<&mut ExpressionLayer> {
        match &mut self.kind {
            LayerKind::Expression(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_clip_mut(&mut self) -> Option<&mut ClipLayer> {
        match &mut self.kind {
            LayerKind::Clip(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_ik_mut(&mut self) -> Option<&mut IkLayer> {
        match &mut self.kind {
            LayerKind::Ik(l) => Some(l),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::Viseme;

    #[test]
    fn test_disabled_layer_empty_output() {
        let mut lip = LipSyncLayer::new(18.0);
        lip.set_viseme(Viseme::Aa, 1.0);
        let mut layer = AnimationLayer::lip_sync("lips", lip);
        let ctx = AnimationContext::default();
        assert!(!layer.evaluate(&ctx).is_empty());

        layer.enabled = false;
        assert!(layer.evaluate(&ctx).is_empty());

        layer.enabled = true;
        layer.weight = 0.0;
        assert!(layer.evaluate(&ctx).is_empty());
    }

    #[test]
    fn test_evaluate_idempotent() {
        let mut additive = AnimationLayer::additive("breath", AdditiveLayer::default());
        let ctx = AnimationContext {
            time: 0.3,
            delta_time: 1.0 / 60.0,
            ..Default::default()
        };
        additive.update(&ctx);
        let a = additive.evaluate(&ctx);
        let b = additive.evaluate(&ctx);
        assert_eq!(a, b);
    }
}
