//! 约束求解
//!
//! 源节点的旋转都以“相对静止姿态的增量”参与计算，
//! 结果叠加在目标节点的静止旋转上。

use glam::{Quat, Vec3};

use super::{AimAxis, ConstraintKind, NodeConstraint, RollAxis};
use crate::math::{normalize_or_identity, slerp_shortest, twist_angle};
use crate::skeleton::{NodeFlags, NodeSet};
use crate::{Result, VrmError};

/// 滚转：只取绕轴扭转，按权重缩放角度
pub fn roll_rotation(source_delta: Quat, axis: RollAxis, weight: f32) -> Quat {
    let axis = axis.to_vec3();
    let angle = twist_angle(normalize_or_identity(source_delta), axis);
    Quat::from_axis_angle(axis, angle * weight.clamp(0.0, 1.0))
}

/// 旋转复制：单位旋转与源增量之间按权重插值
pub fn rotation_copy(source_delta: Quat, weight: f32) -> Quat {
    slerp_shortest(Quat::IDENTITY, normalize_or_identity(source_delta), weight.clamp(0.0, 1.0))
}

/// 瞄准：返回目标的新局部旋转
///
/// - `parent_world`：目标父节点的世界旋转
/// - `rest_local`：目标的静止局部旋转
/// - `target_pos` / `source_pos`：世界空间位置
pub fn aim_rotation(
    parent_world: Quat,
    rest_local: Quat,
    target_pos: Vec3,
    source_pos: Vec3,
    aim_axis: AimAxis,
    weight: f32,
) -> Quat {
    let to_source = (source_pos - target_pos).normalize_or_zero();
    if to_source == Vec3::ZERO {
        return rest_local;
    }
    let rest_world = parent_world * rest_local;
    let current = (rest_world * aim_axis.to_vec3()).normalize_or_zero();
    if current == Vec3::ZERO {
        return rest_local;
    }
    let delta = Quat::from_rotation_arc(current, to_source);
    let aimed_local = normalize_or_identity(parent_world.inverse() * delta * rest_world);
    slerp_shortest(rest_local, aimed_local, weight.clamp(0.0, 1.0))
}

// ============================================================================
// 约束求解器
// ============================================================================

/// 约束求解器，按声明顺序依次求解
#[derive(Clone, Debug, Default)]
pub struct ConstraintSolver {
    constraints: Vec<NodeConstraint>,
}

impl ConstraintSolver {
    /// 校验索引并标记目标节点
    pub fn new(constraints: Vec<NodeConstraint>, nodes: &mut NodeSet) -> Result<Self> {
        let count = nodes.len();
        for c in &constraints {
            for index in [c.target, c.kind.source()] {
                if index >= count {
                    return Err(VrmError::NodeIndexOutOfRange { index, count });
                }
            }
            if c.target == c.kind.source() {
                return Err(VrmError::Constraint(format!("节点 {} 约束到自身", c.target)));
            }
        }
        for c in &constraints {
            if let Some(node) = nodes.get_mut(c.target) {
                node.flags.insert(NodeFlags::CONSTRAINED);
            }
        }
        Ok(Self { constraints })
    }

    pub fn constraints(&self) -> &[NodeConstraint] {
        &self.constraints
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// 求解所有约束，只写目标节点的局部旋转
    ///
    /// 瞄准约束读取的是调用前最近一次传播得到的世界位置。
    pub fn solve(&self, nodes: &mut NodeSet) {
        for constraint in &self.constraints {
            let (source_rest, source_rot) = match nodes.get(constraint.kind.source()) {
                Some(n) => (n.rest.rotation, n.transform.rotation),
                None => continue,
            };
            let target_rest = match nodes.get(constraint.target) {
                Some(n) => n.rest.rotation,
                None => continue,
            };
            let source_delta = normalize_or_identity(source_rest.inverse() * source_rot);

            let rotation = match constraint.kind {
                ConstraintKind::Roll { axis, weight, .. } => {
                    target_rest * roll_rotation(source_delta, axis, weight)
                }
                ConstraintKind::Rotation { weight, .. } => {
                    target_rest * rotation_copy(source_delta, weight)
                }
                ConstraintKind::Aim { source, aim_axis, weight } => aim_rotation(
                    nodes.parent_world_rotation(constraint.target),
                    target_rest,
                    nodes.world_position(constraint.target),
                    nodes.world_position(source),
                    aim_axis,
                    weight,
                ),
            };

            if let Some(node) = nodes.get_mut(constraint.target) {
                node.set_rotation(normalize_or_identity(rotation));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::NodeTransform;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_roll_identity_source() {
        let r = roll_rotation(Quat::IDENTITY, RollAxis::X, 0.5);
        assert!(r.dot(Quat::IDENTITY).abs() > 0.9999);
    }

    #[test]
    fn test_roll_transfers_weighted_twist() {
        let theta = 1.2;
        let r = roll_rotation(Quat::from_rotation_x(theta), RollAxis::X, 0.5);
        let expected = Quat::from_rotation_x(theta * 0.5);
        assert!(r.dot(expected).abs() > 0.9999);
    }

    #[test]
    fn test_roll_ignores_swing() {
        let r = roll_rotation(Quat::from_rotation_y(FRAC_PI_2), RollAxis::X, 1.0);
        assert!(r.dot(Quat::IDENTITY).abs() > 0.9999);
        let r = roll_rotation(Quat::from_rotation_z(0.7), RollAxis::X, 0.5);
        assert!(r.dot(Quat::IDENTITY).abs() > 0.9999);
    }

    #[test]
    fn test_rotation_copy_weight() {
        let src = Quat::from_rotation_z(1.0);
        assert!(rotation_copy(src, 1.0).dot(src).abs() > 0.9999);
        assert!(rotation_copy(src, 0.5).dot(Quat::from_rotation_z(0.5)).abs() > 0.9999);
        assert!(rotation_copy(src, 0.0).dot(Quat::IDENTITY).abs() > 0.9999);
    }

    #[test]
    fn test_aim_points_axis_at_source() {
        let target_pos = Vec3::ZERO;
        let source_pos = Vec3::new(0.0, 0.0, 2.0);
        let r = aim_rotation(
            Quat::IDENTITY,
            Quat::IDENTITY,
            target_pos,
            source_pos,
            AimAxis::PositiveX,
            1.0,
        );
        assert!((r * Vec3::X - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_solver_roll_on_nodes() {
        let mut nodes = NodeSet::new();
        let arm = nodes.add_node(Some("upperArm".into()), NodeTransform::default());
        let twist = nodes.add_node(Some("upperArmTwist".into()), NodeTransform::default());
        nodes.set_parent(twist, arm).unwrap();
        nodes.finalize();

        let solver = ConstraintSolver::new(
            vec![NodeConstraint::roll(twist, arm, RollAxis::X, 0.5)],
            &mut nodes,
        )
        .unwrap();
        assert!(nodes.get(twist).unwrap().flags.contains(NodeFlags::CONSTRAINED));

        nodes.get_mut(arm).unwrap().set_rotation(Quat::from_rotation_x(0.8));
        solver.solve(&mut nodes);
        let got = nodes.get(twist).unwrap().transform.rotation;
        assert!(got.dot(Quat::from_rotation_x(0.4)).abs() > 0.9999);
    }

    #[test]
    fn test_solver_rejects_bad_index() {
        let mut nodes = NodeSet::new();
        nodes.add_node(None, NodeTransform::default());
        nodes.finalize();
        let result = ConstraintSolver::new(vec![NodeConstraint::rotation(0, 5, 1.0)], &mut nodes);
        assert!(result.is_err());
    }
}
