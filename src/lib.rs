//! VRM Runtime Engine
//!
//! VRM 人形模型运行时：动画重定向、约束求解、动画层合成、
//! 弹簧骨骼物理以及 GPU 蒙皮调色板准备。
//!
//! 单帧更新顺序（见 [`model::VrmRuntime::update`]）：
//! 动画层合成 → 重定向写回节点 → 节点约束 → 世界变换传播 →
//! 弹簧骨骼子步 → 蒙皮调色板 / Morph 权重。

pub mod animation;
pub mod config;
pub mod constraint;
pub mod math;
pub mod model;
pub mod morph;
pub mod physics;
pub mod retarget;
pub mod skeleton;
pub mod skinning;

pub use config::{RuntimeConfig, ValidationLevel};
pub use math::DualQuaternion;
pub use model::{ModelDescriptor, SharedRuntime, VrmRuntime, VrmVersion};
pub use skeleton::{HumanoidBone, HumanoidBoneMap, NodeSet, NodeTransform};

use thiserror::Error;

/// 加载期结构错误
///
/// 逐帧路径（采样、合成、物理、调色板）不返回错误，只做跳过或钳制。
#[derive(Error, Debug)]
pub enum VrmError {
    #[error("Missing required humanoid bone: {0}")]
    MissingRequiredBone(&'static str),

    #[error("Node index {index} out of range (node count {count})")]
    NodeIndexOutOfRange { index: usize, count: usize },

    #[error("Node hierarchy contains a cycle at node {0}")]
    HierarchyCycle(usize),

    #[error("Skin {skin}: {joints} joints but {inverse_binds} inverse bind matrices")]
    SkinMismatch {
        skin: usize,
        joints: usize,
        inverse_binds: usize,
    },

    #[error("Spring bone error: {0}")]
    SpringBone(String),

    #[error("Constraint error: {0}")]
    Constraint(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, VrmError>;
