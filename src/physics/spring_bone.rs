//! 弹簧骨骼模拟器
//!
//! 固定子步 + 累加器：每帧累加经过的时间，按整子步消耗，余数留到下一帧。
//! 单帧子步数有硬上限，卡顿帧超出的时间直接丢弃，不会补算。
//! 流程：每帧 [瞬移检测 → 惯性补偿 → N × substep → 写回节点旋转]

use std::f32::consts::TAU;

use glam::{Mat4, Quat, Vec3};

use super::collider::{SpringCollider, WorldCollider};
use super::config::{get_config, SpringBoneConfig};
use super::gpu_buffers::{GpuCapsuleCollider, GpuPlaneCollider, GpuSphereCollider, GpuSpringParams, SpringBoneGpuBuffers};
use super::spring_chain::{SpringChain, SpringJointParams};
use crate::math::normalize_or_identity;
use crate::skeleton::NodeSet;

/// 末端关节没有子节点时合成的尾端长度（米）
const SYNTHETIC_TAIL_LENGTH: f32 = 0.07;
/// 骨长下限
const MIN_BONE_LENGTH: f32 = 1e-5;

/// 单个关节的运行时状态
#[derive(Clone, Debug)]
struct JointState {
    node: usize,
    /// 尾端位置（模拟空间：有 center 时为 center 局部空间，否则世界空间）
    prev_tail: Vec3,
    current_tail: Vec3,
    bone_length: f32,
    /// 节点局部空间的骨骼方向
    bone_axis: Vec3,
    /// 初始局部旋转（刚度的目标方向）
    rest_rotation: Quat,
    params: SpringJointParams,
}

#[derive(Clone, Debug)]
struct ChainState {
    name: String,
    joints: Vec<JointState>,
    colliders: Vec<usize>,
    center: Option<usize>,
}

/// 弹簧骨骼模拟器
#[derive(Clone, Debug)]
pub struct SpringBoneSimulator {
    chains: Vec<ChainState>,
    colliders: Vec<SpringCollider>,
    /// 地面（便捷平面碰撞体）
    floor: Option<WorldCollider>,
    config: SpringBoneConfig,

    // ========== 时间 ==========
    accumulator: f32,
    /// 已模拟时间（风的相位用）
    time: f32,
    last_substeps: u32,

    // ========== 稳定 ==========
    settle_remaining: u32,
    last_root_position: Option<Vec3>,
}

impl SpringBoneSimulator {
    /// 以当前节点姿态为静止姿态创建
    ///
    /// 调用前节点世界矩阵必须已传播。
    pub fn new(chains: Vec<SpringChain>, colliders: Vec<SpringCollider>, nodes: &NodeSet) -> Self {
        let config = get_config();
        let chains: Vec<ChainState> = chains
            .into_iter()
            .map(|chain| build_chain_state(chain, nodes))
            .filter(|chain| !chain.joints.is_empty())
            .collect();

        if config.debug_log {
            log::info!(
                "[SpringBone] 模拟器创建: {} 链, {} 碰撞体, {}Hz × 最多 {} 子步",
                chains.len(),
                colliders.len(),
                config.substep_hz,
                config.max_substeps_per_frame
            );
        }

        Self {
            chains,
            colliders,
            floor: None,
            settle_remaining: config.settling_frames,
            config,
            accumulator: 0.0,
            time: 0.0,
            last_substeps: 0,
            last_root_position: None,
        }
    }

    pub fn set_config(&mut self, config: SpringBoneConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &SpringBoneConfig {
        &self.config
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn joint_count(&self) -> usize {
        self.chains.iter().map(|c| c.joints.len()).sum()
    }

    pub fn chain_names(&self) -> impl Iterator<Item = &str> {
        self.chains.iter().map(|c| c.name.as_str())
    }

    /// 上一帧实际执行的子步数
    pub fn last_substeps(&self) -> u32 {
        self.last_substeps
    }

    /// 剩余的稳定帧数
    pub fn settling_remaining(&self) -> u32 {
        self.settle_remaining
    }

    // ========================================================================
    // 地面
    // ========================================================================

    /// 在世界 Y = height 处安装水平地面
    pub fn set_floor(&mut self, height: f32) {
        if height.is_finite() {
            self.floor = Some(WorldCollider::floor(height));
        }
    }

    /// 由检测到的地面变换安装地面：过平移点，法线为其局部 +Y
    pub fn set_floor_from_transform(&mut self, transform: Mat4) {
        let point = transform.w_axis.truncate();
        let normal = transform.transform_vector3(Vec3::Y).try_normalize().unwrap_or(Vec3::Y);
        if point.is_finite() {
            self.floor = Some(WorldCollider::Plane { point, normal });
        }
    }

    pub fn remove_floor(&mut self) {
        self.floor = None;
    }

    pub fn floor(&self) -> Option<WorldCollider> {
        self.floor
    }

    /// 当前生效的平面碰撞体数（声明的平面 + 地面）
    pub fn plane_count(&self) -> u32 {
        let declared = self
            .colliders
            .iter()
            .filter(|c| matches!(c.shape, super::ColliderShape::Plane { .. }))
            .count() as u32;
        declared + u32::from(self.floor.is_some())
    }

    // ========================================================================
    // 重置
    // ========================================================================

    /// 按当前姿态重置所有尾端并重新进入稳定期
    pub fn reset(&mut self, nodes: &NodeSet) {
        for chain in &mut self.chains {
            reset_chain_tails(chain, nodes);
        }
        self.accumulator = 0.0;
        self.settle_remaining = self.config.settling_frames;
        self.last_root_position = None;
    }

    // ========================================================================
    // 每帧
    // ========================================================================

    /// 推进一帧，返回本帧执行的子步数
    ///
    /// 节点世界矩阵必须已包含本帧动画结果；模拟结果写回关节节点的局部旋转。
    pub fn update(&mut self, nodes: &mut NodeSet, delta_time: f32) -> u32 {
        self.last_substeps = 0;
        if self.chains.is_empty() {
            return 0;
        }

        self.handle_root_motion(nodes);

        if delta_time.is_finite() && delta_time > 0.0 {
            self.accumulator += delta_time;
        }
        let h = self.config.substep_dt();
        let max = self.config.max_substeps_per_frame;
        let mut steps = (self.accumulator / h).floor() as u32;
        if steps > max {
            if self.config.debug_log {
                log::debug!(
                    "[SpringBone] 子步数 {} 超过上限 {}，丢弃 {:.3}s",
                    steps,
                    max,
                    self.accumulator - max as f32 * h
                );
            }
            steps = max;
            self.accumulator = 0.0;
        } else {
            self.accumulator -= steps as f32 * h;
        }

        let settle_factor = if self.config.settling_frames > 0 && self.settle_remaining > 0 {
            (1.0 - self.settle_remaining as f32 / self.config.settling_frames as f32).clamp(0.0, 1.0)
        } else {
            1.0
        };

        for _ in 0..steps {
            self.time += h;
            let wind = self.wind_force();
            let gravity_scale = self.config.gravity_scale;
            let passes = self.config.collision_passes;
            for chain in &mut self.chains {
                let world_colliders = resolve_colliders(chain, &self.colliders, self.floor, nodes);
                simulate_chain(
                    chain,
                    nodes,
                    &world_colliders,
                    SubstepParams {
                        h,
                        wind,
                        gravity_scale,
                        settle_factor,
                        passes,
                    },
                );
            }
        }

        self.settle_remaining = self.settle_remaining.saturating_sub(1);
        self.last_substeps = steps;
        steps
    }

    /// 瞬移检测与惯性补偿
    ///
    /// 根节点移动时尾端按 (1 - inertia_strength) 跟随；稳定期内完全跟随。
    fn handle_root_motion(&mut self, nodes: &NodeSet) {
        let Some(root_pos) = nodes.roots().first().map(|&r| nodes.world_position(r)) else {
            return;
        };
        let Some(last) = self.last_root_position.replace(root_pos) else {
            return;
        };
        let moved = root_pos - last;
        if !moved.is_finite() {
            return;
        }
        if moved.length() > self.config.teleport_distance {
            log::debug!("[SpringBone] 检测到瞬移 {:.2}m，重置", moved.length());
            self.reset(nodes);
            self.last_root_position = Some(root_pos);
            return;
        }

        let inertia = if self.settle_remaining > 0 {
            0.0
        } else {
            self.config.inertia_strength.clamp(0.0, 2.0)
        };
        let follow = moved * (1.0 - inertia);
        if follow == Vec3::ZERO {
            return;
        }
        // 有 center 的链本来就随 center 移动
        for chain in self.chains.iter_mut().filter(|c| c.center.is_none()) {
            for joint in &mut chain.joints {
                joint.current_tail += follow;
                joint.prev_tail += follow;
            }
        }
    }

    fn wind_force(&self) -> Vec3 {
        let c = &self.config;
        if c.wind_amplitude == 0.0 {
            return Vec3::ZERO;
        }
        let dir = c.wind_direction.try_normalize().unwrap_or(Vec3::ZERO);
        dir * c.wind_amplitude * (TAU * c.wind_frequency * self.time + c.wind_phase).sin()
    }

    /// 各关节尾端的世界位置（链顺序展平）
    pub fn tail_positions(&self, nodes: &NodeSet) -> Vec<Vec3> {
        let mut out = Vec::with_capacity(self.joint_count());
        for chain in &self.chains {
            let to_world = sim_to_world(chain, nodes);
            out.extend(chain.joints.iter().map(|j| to_world.transform_point3(j.current_tail)));
        }
        out
    }

    // ========================================================================
    // GPU 缓冲区
    // ========================================================================

    /// 写入本帧的 GPU 缓冲区
    pub fn write_gpu_buffers(&self, nodes: &NodeSet, out: &mut SpringBoneGpuBuffers) {
        out.clear();
        for chain in &self.chains {
            let to_world = sim_to_world(chain, nodes);
            let base = out.params.len();
            for (i, joint) in chain.joints.iter().enumerate() {
                let current = to_world.transform_point3(joint.current_tail);
                let previous = to_world.transform_point3(joint.prev_tail);
                out.current_positions.push(current.extend(1.0).to_array());
                out.previous_positions.push(previous.extend(1.0).to_array());
                out.rest_lengths.push(joint.bone_length);

                // 父关节：同链中前面最近的、是该节点祖先的关节
                let parent = nodes.get(joint.node).and_then(|n| n.parent);
                let parent_index = chain.joints[..i]
                    .iter()
                    .rposition(|j| Some(j.node) == parent)
                    .map(|p| (base + p) as i32)
                    .unwrap_or(-1);
                let p = &joint.params;
                out.params.push(GpuSpringParams {
                    stiffness: p.stiffness,
                    drag_force: p.drag_force,
                    gravity_power: p.gravity_power,
                    hit_radius: p.hit_radius,
                    gravity_dir: p.gravity_dir.to_array(),
                    parent_index,
                });
            }
        }

        for collider in &self.colliders {
            match collider.to_world(nodes.world_matrix(collider.node)) {
                WorldCollider::Sphere { center, radius } => out.spheres.push(GpuSphereCollider {
                    center: center.to_array(),
                    radius,
                }),
                WorldCollider::Capsule { start, end, radius } => out.capsules.push(GpuCapsuleCollider {
                    start: start.to_array(),
                    radius,
                    end: end.to_array(),
                    _pad: 0.0,
                }),
                WorldCollider::Plane { point, normal } => out.planes.push(plane(point, normal)),
            }
        }
        if let Some(WorldCollider::Plane { point, normal }) = self.floor {
            out.planes.push(plane(point, normal));
        }

        let c = &self.config;
        out.globals.gravity = (c.gravity_dir * c.gravity_scale).to_array();
        out.globals.substep_dt = c.substep_dt();
        out.globals.wind_direction = c.wind_direction.try_normalize().unwrap_or(Vec3::ZERO).to_array();
        out.globals.wind_amplitude = c.wind_amplitude;
        out.globals.wind_frequency = c.wind_frequency;
        out.globals.wind_phase = c.wind_phase;
        out.globals.time = self.time;
        out.globals.substep_count = self.last_substeps;
        out.globals.bone_count = out.params.len() as u32;
        out.globals.sphere_count = out.spheres.len() as u32;
        out.globals.capsule_count = out.capsules.len() as u32;
        out.globals.plane_count = out.planes.len() as u32;
    }
}

fn plane(point: Vec3, normal: Vec3) -> GpuPlaneCollider {
    GpuPlaneCollider {
        point: point.to_array(),
        _pad0: 0.0,
        normal: normal.to_array(),
        _pad1: 0.0,
    }
}

// ============================================================================
// 构建
// ============================================================================

fn build_chain_state(chain: SpringChain, nodes: &NodeSet) -> ChainState {
    let mut joints = Vec::with_capacity(chain.joints.len());
    for (i, joint) in chain.joints.iter().enumerate() {
        let next = chain.joints.get(i + 1).map(|j| j.node);
        let Some((bone_length, bone_axis)) = bone_geometry(nodes, joint.node, next) else {
            log::debug!("弹簧链 '{}': 节点 {} 无法确定骨骼方向，跳过", chain.name, joint.node);
            continue;
        };
        let rest_rotation = nodes
            .get(joint.node)
            .map(|n| n.transform.rotation)
            .unwrap_or(Quat::IDENTITY);
        joints.push(JointState {
            node: joint.node,
            prev_tail: Vec3::ZERO,
            current_tail: Vec3::ZERO,
            bone_length,
            bone_axis,
            rest_rotation,
            params: joint.params,
        });
    }

    let mut state = ChainState {
        name: chain.name,
        joints,
        colliders: chain.colliders,
        center: chain.center,
    };
    reset_chain_tails(&mut state, nodes);
    state
}

/// (骨长, 局部骨骼方向)
///
/// 优先用链中下一个关节（须是直接子节点），其次第一个子节点，
/// 都没有时沿父 → 自身方向合成一段短尾端。
fn bone_geometry(nodes: &NodeSet, node: usize, next: Option<usize>) -> Option<(f32, Vec3)> {
    let scene = nodes.get(node)?;
    let pos = scene.world_position();
    let rot = scene.world_rotation();

    let child = next
        .filter(|&n| nodes.get(n).and_then(|c| c.parent) == Some(node))
        .into_iter()
        .chain(scene.children.iter().copied())
        .find(|&c| (nodes.world_position(c) - pos).length() > MIN_BONE_LENGTH);

    let (length, world_dir) = match child {
        Some(c) => {
            let d = nodes.world_position(c) - pos;
            (d.length(), d.normalize())
        }
        None => {
            let parent = scene.parent?;
            let dir = (pos - nodes.world_position(parent)).try_normalize()?;
            (SYNTHETIC_TAIL_LENGTH, dir)
        }
    };
    Some((length, (rot.inverse() * world_dir).normalize_or_zero()))
}

fn sim_to_world(chain: &ChainState, nodes: &NodeSet) -> Mat4 {
    chain.center.map(|c| nodes.world_matrix(c)).unwrap_or(Mat4::IDENTITY)
}

fn world_to_sim(chain: &ChainState, nodes: &NodeSet) -> Mat4 {
    let inv = sim_to_world(chain, nodes).inverse();
    if inv.is_finite() {
        inv
    } else {
        Mat4::IDENTITY
    }
}

fn reset_chain_tails(chain: &mut ChainState, nodes: &NodeSet) {
    let to_sim = world_to_sim(chain, nodes);
    for joint in &mut chain.joints {
        let pos = nodes.world_position(joint.node);
        let rot = nodes.world_rotation(joint.node);
        let tail = to_sim.transform_point3(pos + rot * joint.bone_axis * joint.bone_length);
        joint.current_tail = tail;
        joint.prev_tail = tail;
    }
}

// ============================================================================
// 子步
// ============================================================================

#[derive(Clone, Copy)]
struct SubstepParams {
    h: f32,
    wind: Vec3,
    gravity_scale: f32,
    /// 稳定期内惯性项的缩放 [0, 1]
    settle_factor: f32,
    passes: u32,
}

fn resolve_colliders(
    chain: &ChainState,
    colliders: &[SpringCollider],
    floor: Option<WorldCollider>,
    nodes: &NodeSet,
) -> Vec<WorldCollider> {
    chain
        .colliders
        .iter()
        .filter_map(|&i| colliders.get(i))
        .map(|c| c.to_world(nodes.world_matrix(c.node)))
        .chain(floor)
        .collect()
}

fn simulate_chain(chain: &mut ChainState, nodes: &mut NodeSet, colliders: &[WorldCollider], p: SubstepParams) {
    let to_world = sim_to_world(chain, nodes);
    let to_sim = world_to_sim(chain, nodes);

    for joint in &mut chain.joints {
        let world_pos = nodes.world_position(joint.node);
        let parent_rot = nodes.parent_world_rotation(joint.node);
        let current = to_world.transform_point3(joint.current_tail);
        let prev = to_world.transform_point3(joint.prev_tail);
        let params = &joint.params;

        let rest_dir = (parent_rot * joint.rest_rotation * joint.bone_axis).normalize_or_zero();

        // Verlet：惯性 + 刚度 + 重力 + 风
        let inertia = (current - prev) * (1.0 - params.drag_force) * p.settle_factor;
        let stiffness = rest_dir * params.stiffness * p.h;
        let external = (params.gravity_dir * params.gravity_power * p.gravity_scale + p.wind) * p.h;
        let mut next = current + inertia + stiffness + external;

        next = constrain_length(next, world_pos, joint.bone_length, rest_dir);

        for _ in 0..p.passes {
            let mut moved = false;
            for collider in colliders {
                if let Some(pushed) = collider.push_out(next, params.hit_radius) {
                    next = constrain_length(pushed, world_pos, joint.bone_length, rest_dir);
                    moved = true;
                }
            }
            if !moved {
                break;
            }
        }

        if !next.is_finite() {
            next = world_pos + rest_dir * joint.bone_length;
        }

        joint.prev_tail = to_sim.transform_point3(current);
        joint.current_tail = to_sim.transform_point3(next);

        // 静止方向 → 模拟方向，写回局部旋转
        let dir = (next - world_pos).normalize_or_zero();
        if dir == Vec3::ZERO || rest_dir == Vec3::ZERO {
            continue;
        }
        let delta = Quat::from_rotation_arc(rest_dir, dir);
        let local = normalize_or_identity(parent_rot.inverse() * delta * parent_rot * joint.rest_rotation);
        let written = nodes.get_mut(joint.node).is_some_and(|n| n.set_rotation(local));
        if written {
            nodes.update_subtree(joint.node);
        }
    }
}

/// 把尾端约束到距关节 `length` 处
fn constrain_length(tail: Vec3, origin: Vec3, length: f32, fallback_dir: Vec3) -> Vec3 {
    let to_tail = tail - origin;
    let distance = to_tail.length();
    if distance > 1e-6 && distance.is_finite() {
        origin + to_tail / distance * length
    } else {
        origin + fallback_dir * length
    }
}
