//! 弹簧链声明与构建
//!
//! VRM 1.0 直接列出每条链的所有关节；VRM 0.x 只声明链根，
//! 由节点层次深度优先展开（父先子后），后代继承根的物理参数。

use glam::Vec3;

use super::collider::{ColliderGroup, SpringCollider};
use crate::config::ValidationReport;
use crate::skeleton::{NodeFlags, NodeSet};
use crate::{Result, VrmError};

/// 关节物理参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringJointParams {
    /// 回到静止方向的刚度
    pub stiffness: f32,
    pub gravity_power: f32,
    pub gravity_dir: Vec3,
    /// 速度阻尼 [0, 1]
    pub drag_force: f32,
    /// 关节碰撞半径
    pub hit_radius: f32,
}

impl Default for SpringJointParams {
    fn default() -> Self {
        Self {
            stiffness: 1.0,
            gravity_power: 0.0,
            gravity_dir: Vec3::NEG_Y,
            drag_force: 0.4,
            hit_radius: 0.02,
        }
    }
}

impl SpringJointParams {
    /// 钳制到合法范围
    pub fn sanitized(self) -> Self {
        let finite_or = |v: f32, d: f32| if v.is_finite() { v } else { d };
        let d = Self::default();
        Self {
            stiffness: finite_or(self.stiffness, d.stiffness).max(0.0),
            gravity_power: finite_or(self.gravity_power, d.gravity_power).max(0.0),
            gravity_dir: self.gravity_dir.try_normalize().unwrap_or(Vec3::NEG_Y),
            drag_force: finite_or(self.drag_force, d.drag_force).clamp(0.0, 1.0),
            hit_radius: finite_or(self.hit_radius, d.hit_radius).max(0.0),
        }
    }
}

/// 单个关节声明
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringJointDesc {
    pub node: usize,
    pub params: SpringJointParams,
}

/// 链的关节来源
#[derive(Clone, Debug, PartialEq)]
pub enum SpringSource {
    /// 完整关节列表（VRM 1.0）
    Joints(Vec<SpringJointDesc>),
    /// 仅链根（VRM 0.x），展开为所有后代
    Roots {
        roots: Vec<usize>,
        params: SpringJointParams,
    },
}

/// 一条弹簧声明
#[derive(Clone, Debug, PartialEq)]
pub struct SpringDesc {
    pub name: String,
    pub source: SpringSource,
    /// 碰撞体组索引
    pub collider_groups: Vec<usize>,
    /// 在该节点空间中模拟
    pub center: Option<usize>,
}

/// 弹簧骨骼声明
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpringBoneDeclaration {
    pub colliders: Vec<SpringCollider>,
    pub collider_groups: Vec<ColliderGroup>,
    pub springs: Vec<SpringDesc>,
}

impl SpringBoneDeclaration {
    pub fn is_empty(&self) -> bool {
        self.springs.is_empty()
    }
}

/// 构建后的弹簧链
#[derive(Clone, Debug, PartialEq)]
pub struct SpringChain {
    pub name: String,
    /// 父先子后
    pub joints: Vec<SpringJointDesc>,
    /// 展平后的碰撞体索引
    pub colliders: Vec<usize>,
    pub center: Option<usize>,
}

/// 校验并展开所有弹簧声明
///
/// 引用不存在的节点、碰撞体或碰撞体组是结构错误。
/// 同一节点出现在多条链中按校验级别处理（保留首次出现）。
pub fn build_chains(
    decl: &SpringBoneDeclaration,
    nodes: &mut NodeSet,
    report: &mut ValidationReport,
) -> Result<Vec<SpringChain>> {
    let node_count = nodes.len();
    let check_node = |index: usize| -> Result<()> {
        if index >= node_count {
            Err(VrmError::NodeIndexOutOfRange { index, count: node_count })
        } else {
            Ok(())
        }
    };

    for (i, collider) in decl.colliders.iter().enumerate() {
        check_node(collider.node).map_err(|_| {
            VrmError::SpringBone(format!("collider {} references missing node {}", i, collider.node))
        })?;
    }
    for group in &decl.collider_groups {
        if let Some(&bad) = group.colliders.iter().find(|&&c| c >= decl.colliders.len()) {
            return Err(VrmError::SpringBone(format!(
                "collider group '{}' references missing collider {}",
                group.name, bad
            )));
        }
    }

    let mut claimed = vec![false; node_count];
    let mut chains = Vec::with_capacity(decl.springs.len());

    for spring in &decl.springs {
        if let Some(center) = spring.center {
            check_node(center)?;
        }

        let mut colliders = Vec::new();
        for &group_index in &spring.collider_groups {
            let group = decl.collider_groups.get(group_index).ok_or_else(|| {
                VrmError::SpringBone(format!(
                    "spring '{}' references missing collider group {}",
                    spring.name, group_index
                ))
            })?;
            for &c in &group.colliders {
                if !colliders.contains(&c) {
                    colliders.push(c);
                }
            }
        }

        let expanded: Vec<SpringJointDesc> = match &spring.source {
            SpringSource::Joints(joints) => {
                for joint in joints {
                    check_node(joint.node)?;
                }
                joints.clone()
            }
            SpringSource::Roots { roots, params } => {
                let mut joints = Vec::new();
                for &root in roots {
                    check_node(root)?;
                    joints.extend(
                        nodes
                            .descendants_depth_first(root)
                            .into_iter()
                            .map(|node| SpringJointDesc { node, params: *params }),
                    );
                }
                joints
            }
        };

        let mut joints = Vec::with_capacity(expanded.len());
        for mut joint in expanded {
            if claimed[joint.node] {
                report.report(format!(
                    "节点 {} 已属于其他弹簧链，'{}' 中忽略",
                    joint.node, spring.name
                ))?;
                continue;
            }
            claimed[joint.node] = true;
            joint.params = joint.params.sanitized();
            joints.push(joint);
        }

        if joints.is_empty() {
            log::debug!("弹簧链 '{}' 没有有效关节，跳过", spring.name);
            continue;
        }
        for joint in &joints {
            if let Some(node) = nodes.get_mut(joint.node) {
                node.flags.insert(NodeFlags::SPRING_JOINT);
            }
        }
        chains.push(SpringChain {
            name: spring.name.clone(),
            joints,
            colliders,
            center: spring.center,
        });
    }

    log::info!(
        "弹簧骨骼构建完成: {} 链, {} 关节, {} 碰撞体",
        chains.len(),
        chains.iter().map(|c| c.joints.len()).sum::<usize>(),
        decl.colliders.len()
    );
    Ok(chains)
}
