//! 动画系统
//!
//! - sampler / track / clip: 关键帧采样与动画片段
//! - layer: 层的公共类型（上下文、输出、优先级）
//! - clip_layer / additive_layer / expression_layer / lip_sync / ik_layer: 五种层
//! - compositor: 按优先级合成
//! - foot_contact: 脚部接地检测

mod additive_layer;
mod clip;
mod clip_layer;
mod compositor;
mod expression;
mod expression_layer;
mod foot_contact;
mod ik_layer;
mod layer;
mod lip_sync;
mod sampler;
mod track;

pub use additive_layer::AdditiveLayer;
pub use clip::{AnimationClip, ClipBuilder};
pub use clip_layer::{retargeted_rotation, ClipLayer};
pub use compositor::AnimationCompositor;
pub use expression::{ExpressionKey, ExpressionPreset};
pub use expression_layer::{AutoBlink, ExpressionLayer};
pub use foot_contact::{FootContactConfig, FootContactDetector};
pub use ik_layer::{IkLayer, IkTarget, LimbChain};
pub use layer::{
    AnimationContext, AnimationLayer, BlendMode, BoneOutput, BonePose, LayerKind, LayerOutput, PoseSnapshot,
    RestPose, SpeechState, PRIORITY_ADDITIVE, PRIORITY_BASE, PRIORITY_EXPRESSION, PRIORITY_IK, PRIORITY_LIP_SYNC,
};
pub use lip_sync::{LipSyncLayer, Viseme};
pub use sampler::{hermite_basis, CubicKey, Interpolation, Keyframe, Sampler};
pub use track::{normalize_node_name, JointTrack, NodeTrack, TrackSample, TransformTracks};
