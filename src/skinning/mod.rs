//! GPU 蒙皮数据准备
//!
//! - palette: 每关节调色板（矩阵或对偶四元数）
//! - cpu: 参考实现的顶点蒙皮（rayon 并行），用于校验与回退

mod cpu;
mod palette;

pub use cpu::{skin_vertices, SkinVertex, SkinnedVertex};
pub use palette::{validate_skin, SkinPalette};

/// 调色板形式
///
/// 线性混合在多影响混合时会丢失体积（糖纸扭曲），
/// 对偶四元数在同样输入下保持长度。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SkinningMode {
    #[default]
    Linear,
    DualQuaternion,
}
