//! 弹簧骨骼物理
//!
//! - config: 全局物理配置
//! - collider: 球 / 胶囊 / 平面碰撞体
//! - spring_chain: 弹簧声明与链展开
//! - spring_bone: 固定子步模拟器
//! - gpu_buffers: 计算着色器缓冲区布局

pub mod config;
mod collider;
mod gpu_buffers;
mod spring_bone;
mod spring_chain;

pub use collider::{ColliderGroup, ColliderShape, SpringCollider, WorldCollider};
pub use config::SpringBoneConfig;
pub use gpu_buffers::{
    GpuCapsuleCollider, GpuGlobalParams, GpuPlaneCollider, GpuSphereCollider, GpuSpringParams, SpringBoneGpuBuffers,
};
pub use spring_bone::SpringBoneSimulator;
pub use spring_chain::{
    build_chains, SpringBoneDeclaration, SpringChain, SpringDesc, SpringJointDesc, SpringJointParams, SpringSource,
};
