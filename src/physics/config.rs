//! 弹簧骨骼物理配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use glam::Vec3;
use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 弹簧骨骼配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct SpringBoneConfig {
    // ========== 子步 ==========
    /// 固定子步频率（Hz），默认 120.0
    pub substep_hz: f32,
    /// 每帧最大子步数，默认 10
    /// 超出部分的时间直接丢弃，以短暂失步换取有界的单帧开销
    pub max_substeps_per_frame: u32,

    // ========== 重力 ==========
    /// 全局重力方向，默认 (0, -1, 0)
    pub gravity_dir: Vec3,
    /// 重力缩放（乘以每个关节的 gravity_power），默认 1.0
    pub gravity_scale: f32,

    // ========== 风 ==========
    /// 风向（自动归一化），默认 +X
    pub wind_direction: Vec3,
    /// 风力幅度，默认 0.0（无风）
    pub wind_amplitude: f32,
    /// 风力频率（Hz），默认 0.5
    pub wind_frequency: f32,
    /// 风力相位（弧度），默认 0.0
    pub wind_phase: f32,

    // ========== 稳定 ==========
    /// (重新)初始化后抑制惯性的帧数，默认 30
    pub settling_frames: u32,
    /// 惯性效果强度，默认 1.0
    /// 0.0 = 角色移动时尾端完全跟随，1.0 = 正常拖拽
    pub inertia_strength: f32,
    /// 碰撞求解迭代次数，默认 3
    pub collision_passes: u32,
    /// 根节点单帧位移超过该距离（米）视为瞬移并重置，默认 1.0
    pub teleport_distance: f32,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for SpringBoneConfig {
    fn default() -> Self {
        Self {
            // ====== 子步 ======
            // 120Hz × 10 步，单帧最坏约 83ms 的模拟量
            // 60FPS 下可容忍 2~3 个掉帧再开始落后
            substep_hz: 120.0,
            max_substeps_per_frame: 10,

            // ====== 重力 ======
            gravity_dir: Vec3::NEG_Y,
            gravity_scale: 1.0,

            // ====== 风 ======
            wind_direction: Vec3::X,
            wind_amplitude: 0.0,
            wind_frequency: 0.5,
            wind_phase: 0.0,

            // ====== 稳定 ======
            settling_frames: 30,
            inertia_strength: 1.0,
            collision_passes: 3,
            teleport_distance: 1.0,

            // ====== 调试 ======
            debug_log: false,
        }
    }
}

impl SpringBoneConfig {
    /// 子步时长（秒）
    #[inline]
    pub fn substep_dt(&self) -> f32 {
        1.0 / self.substep_hz.max(1.0)
    }
}

/// 全局配置实例
static SPRING_BONE_CONFIG: Lazy<RwLock<SpringBoneConfig>> = Lazy::new(|| RwLock::new(SpringBoneConfig::default()));

/// 获取当前配置（只读）
pub fn get_config() -> SpringBoneConfig {
    SPRING_BONE_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: SpringBoneConfig) {
    *SPRING_BONE_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *SPRING_BONE_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = SpringBoneConfig::default();
}
