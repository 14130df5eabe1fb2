//! 弹簧骨骼 GPU 缓冲区布局
//!
//! 与计算着色器中的结构逐字节对应，布局由 static_assertions 固定。
//! 本模块只负责写入，渲染端只读。

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

/// 每根骨骼的物理参数（32 字节）
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuSpringParams {
    pub stiffness: f32,
    pub drag_force: f32,
    pub gravity_power: f32,
    pub hit_radius: f32,
    pub gravity_dir: [f32; 3],
    /// 同一缓冲区内父骨骼的下标，-1 表示链首
    pub parent_index: i32,
}

/// 球碰撞体（16 字节）
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuSphereCollider {
    pub center: [f32; 3],
    pub radius: f32,
}

/// 胶囊碰撞体（32 字节）
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuCapsuleCollider {
    pub start: [f32; 3],
    pub radius: f32,
    pub end: [f32; 3],
    pub _pad: f32,
}

/// 平面碰撞体（32 字节）
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuPlaneCollider {
    pub point: [f32; 3],
    pub _pad0: f32,
    pub normal: [f32; 3],
    pub _pad1: f32,
}

/// 全局参数块（64 字节）
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuGlobalParams {
    pub gravity: [f32; 3],
    pub substep_dt: f32,
    pub wind_direction: [f32; 3],
    pub wind_amplitude: f32,
    pub wind_frequency: f32,
    pub wind_phase: f32,
    pub time: f32,
    pub substep_count: u32,
    pub bone_count: u32,
    pub sphere_count: u32,
    pub capsule_count: u32,
    pub plane_count: u32,
}

const_assert_eq!(std::mem::size_of::<GpuSpringParams>(), 32);
const_assert_eq!(std::mem::size_of::<GpuSphereCollider>(), 16);
const_assert_eq!(std::mem::size_of::<GpuCapsuleCollider>(), 32);
const_assert_eq!(std::mem::size_of::<GpuPlaneCollider>(), 32);
const_assert_eq!(std::mem::size_of::<GpuGlobalParams>(), 64);

/// 一帧的全部弹簧骨骼缓冲区
#[derive(Clone, Debug, Default)]
pub struct SpringBoneGpuBuffers {
    /// 当前尾端位置（xyz + 1）
    pub current_positions: Vec<[f32; 4]>,
    /// 上一子步尾端位置（xyz + 1）
    pub previous_positions: Vec<[f32; 4]>,
    pub params: Vec<GpuSpringParams>,
    pub rest_lengths: Vec<f32>,
    pub spheres: Vec<GpuSphereCollider>,
    pub capsules: Vec<GpuCapsuleCollider>,
    pub planes: Vec<GpuPlaneCollider>,
    pub globals: GpuGlobalParams,
}

impl SpringBoneGpuBuffers {
    pub fn clear(&mut self) {
        self.current_positions.clear();
        self.previous_positions.clear();
        self.params.clear();
        self.rest_lengths.clear();
        self.spheres.clear();
        self.capsules.clear();
        self.planes.clear();
        self.globals = GpuGlobalParams::default();
    }

    pub fn globals_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.globals)
    }

    pub fn params_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.params)
    }

    pub fn positions_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.current_positions)
    }

    pub fn previous_positions_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.previous_positions)
    }

    pub fn rest_lengths_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.rest_lengths)
    }

    pub fn spheres_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.spheres)
    }

    pub fn capsules_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.capsules)
    }

    pub fn planes_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.planes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_block_field_offsets() {
        let globals = GpuGlobalParams {
            substep_dt: 0.5,
            plane_count: 7,
            ..Default::default()
        };
        let bytes = bytemuck::bytes_of(&globals);
        assert_eq!(bytes.len(), 64);
        assert_eq!(&bytes[12..16], &0.5f32.to_ne_bytes());
        assert_eq!(&bytes[60..64], &7u32.to_ne_bytes());
    }

    #[test]
    fn test_clear_zeroes_counts() {
        let mut buffers = SpringBoneGpuBuffers::default();
        buffers.planes.push(GpuPlaneCollider::default());
        buffers.globals.plane_count = 1;
        buffers.clear();
        assert!(buffers.planes_bytes().is_empty());
        assert_eq!(buffers.globals.plane_count, 0);
    }
}
