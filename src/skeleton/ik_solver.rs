//! 两骨骼 IK 求解器
//!
//! 解析解（余弦定理），极向量决定膝盖 / 手肘的弯曲平面。
//! 输入输出都在世界空间。

use glam::{Quat, Vec3};

use crate::math::{normalize_or_identity, quat_is_finite};

/// 骨骼长度下限
const MIN_BONE_LENGTH: f32 = 1e-5;
/// 目标距离下限（避免除零）
const MIN_REACH: f32 = 1e-4;

/// 求解结果
#[derive(Clone, Copy, Debug)]
pub struct TwoBoneIkSolution {
    /// 作用在根关节世界旋转上的增量
    pub root_rotation: Quat,
    /// 在 root_rotation 之后作用在中间关节世界旋转上的增量
    pub mid_rotation: Quat,
    /// 目标在可达范围内（未被钳制）
    pub reached: bool,
}

impl TwoBoneIkSolution {
    /// 换算为根 / 中间关节的新局部旋转
    ///
    /// - `parent_world`：根关节父节点的世界旋转
    /// - `root_world` / `mid_world`：求解前两个关节的世界旋转
    pub fn to_local(&self, parent_world: Quat, root_world: Quat, mid_world: Quat) -> (Quat, Quat) {
        let new_root_world = self.root_rotation * root_world;
        let new_mid_world = self.mid_rotation * self.root_rotation * mid_world;
        let root_local = normalize_or_identity(parent_world.inverse() * new_root_world);
        let mid_local = normalize_or_identity(new_root_world.inverse() * new_mid_world);
        (root_local, mid_local)
    }
}

/// 求解两骨骼 IK
///
/// 骨骼长度为零（关节重合）时返回 None；目标超出范围时钳制为完全伸直。
pub fn solve_two_bone(
    root: Vec3,
    mid: Vec3,
    end: Vec3,
    target: Vec3,
    pole: Vec3,
) -> Option<TwoBoneIkSolution> {
    if !(root.is_finite() && mid.is_finite() && end.is_finite() && target.is_finite()) {
        return None;
    }

    let upper = mid - root;
    let lower = end - mid;
    let a = upper.length();
    let b = lower.length();
    if a < MIN_BONE_LENGTH || b < MIN_BONE_LENGTH {
        return None;
    }

    let to_target = target - root;
    let distance = to_target.length();
    let dir = if distance > MIN_REACH {
        to_target / distance
    } else {
        (end - root).normalize_or_zero()
    };
    if dir == Vec3::ZERO {
        return None;
    }

    let max_reach = a + b;
    let min_reach = (a - b).abs().max(MIN_REACH);
    let reached = distance <= max_reach && distance >= min_reach;
    let d = distance.clamp(min_reach, max_reach);

    // 余弦定理：根关节处目标方向与上段骨骼的夹角
    let cos_root = ((a * a + d * d - b * b) / (2.0 * a * d)).clamp(-1.0, 1.0);
    let sin_root = (1.0 - cos_root * cos_root).max(0.0).sqrt();

    let bend = bend_direction(dir, pole, upper);
    let new_mid = root + dir * (a * cos_root) + bend * (a * sin_root);
    let new_end = root + dir * d;

    let root_rotation = rotation_between(upper / a, (new_mid - root).normalize_or_zero());
    let rotated_lower = root_rotation * lower;
    let mid_rotation = rotation_between(
        rotated_lower.normalize_or_zero(),
        (new_end - new_mid).normalize_or_zero(),
    );

    if !quat_is_finite(root_rotation) || !quat_is_finite(mid_rotation) {
        return None;
    }

    Some(TwoBoneIkSolution {
        root_rotation,
        mid_rotation,
        reached,
    })
}

/// 弯曲方向：极向量在目标方向上的垂直分量
///
/// 极向量与目标方向平行时退回当前弯曲方向，再退回任意正交方向。
fn bend_direction(dir: Vec3, pole: Vec3, upper: Vec3) -> Vec3 {
    let from_pole = pole - dir * pole.dot(dir);
    if from_pole.length_squared() > 1e-8 {
        return from_pole.normalize();
    }
    let from_current = upper - dir * upper.dot(dir);
    if from_current.length_squared() > 1e-8 {
        return from_current.normalize();
    }
    dir.any_orthonormal_vector()
}

fn rotation_between(from: Vec3, to: Vec3) -> Quat {
    if from == Vec3::ZERO || to == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    normalize_or_identity(Quat::from_rotation_arc(from, to))
}
