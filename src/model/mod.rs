//! 模型：加载器输出的数据模型与运行时
//!
//! - descriptor: 加载器填写的纯数据结构
//! - runtime: 单个模型的逐帧更新
//! - shared: 跨线程共享（单写多读）

mod descriptor;
pub(crate) mod runtime;
mod shared;

pub use descriptor::{MeshDescriptor, ModelDescriptor, NodeDescriptor, SkinDescriptor, VrmVersion};
pub use runtime::VrmRuntime;
pub use shared::SharedRuntime;
