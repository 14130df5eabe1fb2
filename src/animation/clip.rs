//! 动画片段
//!
//! 构建期通过 ClipBuilder 逐条添加轨道，build 之后不可变。

use std::collections::HashMap;

use super::{ExpressionKey, JointTrack, NodeTrack, Sampler, TrackSample};
use crate::retarget::AnimationConvention;
use crate::skeleton::HumanoidBone;

/// 动画片段
#[derive(Clone, Debug, Default)]
pub struct AnimationClip {
    name: String,
    duration: f32,
    convention: AnimationConvention,
    joints: HashMap<HumanoidBone, JointTrack>,
    nodes: Vec<NodeTrack>,
    morphs: HashMap<String, Sampler<f32>>,
    expressions: HashMap<ExpressionKey, Sampler<f32>>,
}

impl AnimationClip {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 总时长（秒）
    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn convention(&self) -> AnimationConvention {
        self.convention
    }

    pub fn joint(&self, bone: HumanoidBone) -> Option<&JointTrack> {
        self.joints.get(&bone)
    }

    pub fn joints(&self) -> impl Iterator<Item = (HumanoidBone, &JointTrack)> {
        self.joints.iter().map(|(&b, t)| (b, t))
    }

    pub fn node_tracks(&self) -> &[NodeTrack] {
        &self.nodes
    }

    pub fn morph_tracks(&self) -> impl Iterator<Item = (&str, &Sampler<f32>)> {
        self.morphs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn expression_tracks(&self) -> impl Iterator<Item = (&ExpressionKey, &Sampler<f32>)> {
        self.expressions.iter()
    }

    /// 采样人形骨骼；片段中没有该骨骼时返回 None
    pub fn sample_joint(&self, bone: HumanoidBone, t: f32) -> Option<TrackSample> {
        self.joints.get(&bone).map(|track| track.sample(t))
    }

    /// 采样 Morph 权重，钳制到 [0, 1]
    pub fn sample_morph(&self, name: &str, t: f32) -> Option<f32> {
        self.morphs.get(name).map(|s| clamp_weight(s.sample(t)))
    }

    /// 采样表情权重，钳制到 [0, 1]
    pub fn sample_expression(&self, key: &ExpressionKey, t: f32) -> Option<f32> {
        self.expressions.get(key).map(|s| clamp_weight(s.sample(t)))
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
            && self.nodes.is_empty()
            && self.morphs.is_empty()
            && self.expressions.is_empty()
    }
}

#[inline]
fn clamp_weight(w: f32) -> f32 {
    if w.is_finite() {
        w.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// ============================================================================
// 构建器
// ============================================================================

/// 片段构建器
#[derive(Debug, Default)]
pub struct ClipBuilder {
    clip: AnimationClip,
    explicit_duration: Option<f32>,
}

impl ClipBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            clip: AnimationClip {
                name: name.into(),
                ..Default::default()
            },
            explicit_duration: None,
        }
    }

    pub fn convention(mut self, convention: AnimationConvention) -> Self {
        self.clip.convention = convention;
        self
    }

    /// 显式时长；不设置时取所有轨道的最后关键帧时间
    pub fn duration(mut self, duration: f32) -> Self {
        self.explicit_duration = Some(duration.max(0.0));
        self
    }

    pub fn add_joint_track(&mut self, bone: HumanoidBone, track: JointTrack) -> &mut Self {
        self.clip.joints.insert(bone, track);
        self
    }

    pub fn add_node_track(&mut self, track: NodeTrack) -> &mut Self {
        self.clip.nodes.push(track);
        self
    }

    pub fn add_morph_track(&mut self, name: impl Into<String>, sampler: Sampler<f32>) -> &mut Self {
        self.clip.morphs.insert(name.into(), sampler);
        self
    }

    pub fn add_expression_track(&mut self, key: ExpressionKey, sampler: Sampler<f32>) -> &mut Self {
        self.clip.expressions.insert(key, sampler);
        self
    }

    pub fn build(self) -> AnimationClip {
        let mut clip = self.clip;
        let track_end = clip
            .joints
            .values()
            .map(|t| t.tracks.end_time())
            .chain(clip.nodes.iter().map(|t| t.tracks.end_time()))
            .chain(clip.morphs.values().map(|s| s.end_time()))
            .chain(clip.expressions.values().map(|s| s.end_time()))
            .fold(0.0f32, f32::max);
        clip.duration = self.explicit_duration.unwrap_or(track_end);
        log::debug!(
            "动画片段 '{}': {:.2}s, {} 骨骼轨道, {} 节点轨道, {} Morph, {} 表情",
            clip.name,
            clip.duration,
            clip.joints.len(),
            clip.nodes.len(),
            clip.morphs.len(),
            clip.expressions.len()
        );
        clip
    }
}
