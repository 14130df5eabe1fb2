//! 跨线程共享的运行时
//!
//! 一次完整更新持有写锁，一次完整读取（调色板、绘制编码）持有读锁，
//! 读方不会看到传播到一半的世界变换。

use std::sync::{Arc, RwLock};

use super::VrmRuntime;
use crate::animation::SpeechState;

/// `Arc<RwLock<VrmRuntime>>` 的薄包装
#[derive(Clone)]
pub struct SharedRuntime {
    inner: Arc<RwLock<VrmRuntime>>,
}

impl SharedRuntime {
    pub fn new(runtime: VrmRuntime) -> Self {
        Self {
            inner: Arc::new(RwLock::new(runtime)),
        }
    }

    /// 在写锁内完成一整帧更新
    pub fn update(&self, delta_time: f32, speech: SpeechState) {
        let mut runtime = self.inner.write().unwrap_or_else(|e| e.into_inner());
        runtime.update(delta_time, speech);
    }

    /// 在读锁内执行一次完整读取
    pub fn read<R>(&self, f: impl FnOnce(&VrmRuntime) -> R) -> R {
        let runtime = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f(&runtime)
    }

    /// 在写锁内修改（添加动画层、调整物理等）
    pub fn write<R>(&self, f: impl FnOnce(&mut VrmRuntime) -> R) -> R {
        let mut runtime = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut runtime)
    }
}
