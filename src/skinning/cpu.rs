//! CPU 参考蒙皮
//!
//! 与 GPU 着色器使用同一调色板，rayon 按顶点并行。

use glam::{Mat4, Vec3};
use rayon::prelude::*;

use super::{SkinPalette, SkinningMode};
use crate::math::DualQuaternion;

/// 蒙皮输入顶点（最多 4 个影响）
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SkinVertex {
    pub position: Vec3,
    pub normal: Vec3,
    /// 调色板中的关节槽位
    pub joints: [u16; 4],
    pub weights: [f32; 4],
}

/// 蒙皮输出
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SkinnedVertex {
    pub position: Vec3,
    pub normal: Vec3,
}

/// 按调色板模式蒙皮所有顶点
pub fn skin_vertices(palette: &SkinPalette, vertices: &[SkinVertex]) -> Vec<SkinnedVertex> {
    match palette.mode() {
        SkinningMode::Linear => {
            let matrices = palette.matrices();
            vertices.par_iter().map(|v| skin_linear(v, matrices)).collect()
        }
        SkinningMode::DualQuaternion => {
            let dqs = palette.dual_quaternions();
            vertices.par_iter().map(|v| skin_dual_quat(v, dqs)).collect()
        }
    }
}

fn skin_linear(vertex: &SkinVertex, matrices: &[Mat4]) -> SkinnedVertex {
    let mut position = Vec3::ZERO;
    let mut normal = Vec3::ZERO;
    let mut total = 0.0;
    for (&joint, &w) in vertex.joints.iter().zip(&vertex.weights) {
        if w <= 0.0 {
            continue;
        }
        let m = matrices.get(joint as usize).copied().unwrap_or(Mat4::IDENTITY);
        position += m.transform_point3(vertex.position) * w;
        normal += m.transform_vector3(vertex.normal) * w;
        total += w;
    }
    if total <= 0.0 {
        return SkinnedVertex {
            position: vertex.position,
            normal: vertex.normal,
        };
    }
    SkinnedVertex {
        position: position / total,
        normal: normal.normalize_or_zero(),
    }
}

fn skin_dual_quat(vertex: &SkinVertex, dqs: &[DualQuaternion]) -> SkinnedVertex {
    let mut inputs = [(DualQuaternion::IDENTITY, 0.0); 4];
    for (slot, (&joint, &w)) in vertex.joints.iter().zip(&vertex.weights).enumerate() {
        let dq = dqs.get(joint as usize).copied().unwrap_or(DualQuaternion::IDENTITY);
        inputs[slot] = (dq, w.max(0.0));
    }
    // 全零权重时 blend 返回单位变换
    let blended = DualQuaternion::blend(&inputs);
    SkinnedVertex {
        position: blended.transform_point(vertex.position),
        normal: blended.transform_normal(vertex.normal).normalize_or_zero(),
    }
}
