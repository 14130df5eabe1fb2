//! 弹簧骨骼碰撞体
//!
//! 碰撞体挂在节点上，每帧按节点世界矩阵变换到世界空间。
//! 求解时把关节尾端沿最小分离方向推出，再由调用方恢复骨长。

use glam::{Mat4, Vec3};

/// 碰撞体形状（节点局部空间）
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColliderShape {
    Sphere { offset: Vec3, radius: f32 },
    Capsule { offset: Vec3, tail: Vec3, radius: f32 },
    Plane { offset: Vec3, normal: Vec3 },
}

/// 挂在节点上的碰撞体
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringCollider {
    pub node: usize,
    pub shape: ColliderShape,
}

/// 碰撞体组：碰撞体索引列表
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColliderGroup {
    pub name: String,
    pub colliders: Vec<usize>,
}

/// 世界空间碰撞体
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WorldCollider {
    Sphere { center: Vec3, radius: f32 },
    Capsule { start: Vec3, end: Vec3, radius: f32 },
    Plane { point: Vec3, normal: Vec3 },
}

impl SpringCollider {
    /// 按节点世界矩阵变换到世界空间
    pub fn to_world(&self, node_world: Mat4) -> WorldCollider {
        match self.shape {
            ColliderShape::Sphere { offset, radius } => WorldCollider::Sphere {
                center: node_world.transform_point3(offset),
                radius,
            },
            ColliderShape::Capsule { offset, tail, radius } => WorldCollider::Capsule {
                start: node_world.transform_point3(offset),
                end: node_world.transform_point3(tail),
                radius,
            },
            ColliderShape::Plane { offset, normal } => WorldCollider::Plane {
                point: node_world.transform_point3(offset),
                normal: node_world.transform_vector3(normal).try_normalize().unwrap_or(Vec3::Y),
            },
        }
    }
}

impl WorldCollider {
    /// 水平地面
    pub fn floor(height: f32) -> Self {
        WorldCollider::Plane {
            point: Vec3::new(0.0, height, 0.0),
            normal: Vec3::Y,
        }
    }

    /// 把半径为 `hit_radius` 的尾端推出碰撞体；未穿透返回 None
    pub fn push_out(&self, tail: Vec3, hit_radius: f32) -> Option<Vec3> {
        match *self {
            WorldCollider::Sphere { center, radius } => push_from_point(tail, center, radius + hit_radius),
            WorldCollider::Capsule { start, end, radius } => {
                let closest = closest_on_segment(tail, start, end);
                push_from_point(tail, closest, radius + hit_radius)
            }
            WorldCollider::Plane { point, normal } => {
                let distance = (tail - point).dot(normal);
                (distance < hit_radius).then(|| tail + normal * (hit_radius - distance))
            }
        }
    }
}

fn push_from_point(tail: Vec3, center: Vec3, min_distance: f32) -> Option<Vec3> {
    let diff = tail - center;
    let distance = diff.length();
    if distance >= min_distance {
        return None;
    }
    // 尾端正好落在中心时没有分离方向
    let dir = if distance > 1e-6 { diff / distance } else { Vec3::Y };
    Some(center + dir * min_distance)
}

fn closest_on_segment(p: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    let seg = b - a;
    let len_sq = seg.length_squared();
    if len_sq < 1e-10 {
        return a;
    }
    let t = ((p - a).dot(seg) / len_sq).clamp(0.0, 1.0);
    a + seg * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_push_out() {
        let c = WorldCollider::Sphere {
            center: Vec3::ZERO,
            radius: 0.1,
        };
        let pushed = c.push_out(Vec3::new(0.05, 0.0, 0.0), 0.02).unwrap();
        assert!((pushed - Vec3::new(0.12, 0.0, 0.0)).length() < 1e-6);
        assert!(c.push_out(Vec3::new(0.5, 0.0, 0.0), 0.02).is_none());
    }

    #[test]
    fn test_capsule_push_out_along_axis_normal() {
        let c = WorldCollider::Capsule {
            start: Vec3::new(0.0, -0.5, 0.0),
            end: Vec3::new(0.0, 0.5, 0.0),
            radius: 0.1,
        };
        let pushed = c.push_out(Vec3::new(0.0, 0.2, 0.05), 0.0).unwrap();
        assert!((pushed - Vec3::new(0.0, 0.2, 0.1)).length() < 1e-6);
    }

    #[test]
    fn test_plane_push_out() {
        let floor = WorldCollider::floor(0.0);
        let pushed = floor.push_out(Vec3::new(1.0, -0.3, 2.0), 0.05).unwrap();
        assert!((pushed - Vec3::new(1.0, 0.05, 2.0)).length() < 1e-6);
        assert!(floor.push_out(Vec3::new(0.0, 0.3, 0.0), 0.05).is_none());
    }

    #[test]
    fn test_collider_follows_node() {
        let collider = SpringCollider {
            node: 0,
            shape: ColliderShape::Sphere {
                offset: Vec3::new(0.0, 0.1, 0.0),
                radius: 0.2,
            },
        };
        let world = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        match collider.to_world(world) {
            WorldCollider::Sphere { center, radius } => {
                assert!((center - Vec3::new(1.0, 2.1, 3.0)).length() < 1e-6);
                assert_eq!(radius, 0.2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
