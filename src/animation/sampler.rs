//! 关键帧采样器
//!
//! 按 glTF 动画约定求值：LINEAR / STEP / CUBICSPLINE。
//! 采样时间在首尾关键帧之外时钳制到端点，不外推。

use glam::{Quat, Vec3};

use crate::math::{normalize_or_identity, slerp_shortest};

// ============================================================================
// 关键帧值
// ============================================================================

/// 可插值的关键帧值
pub trait Keyframe: Copy {
    /// 没有关键帧时的值
    fn neutral() -> Self;
    /// 线性插值（四元数走最短路径）
    fn interpolate(a: Self, b: Self, t: f32) -> Self;
    /// Hermite 组合 `h00·p0 + h10·m0 + h01·p1 + h11·m1`
    fn hermite(p0: Self, m0: Self, p1: Self, m1: Self, basis: [f32; 4]) -> Self;
    /// 切线按区间长度缩放
    fn scale(self, s: f32) -> Self;
}

impl Keyframe for f32 {
    fn neutral() -> Self {
        0.0
    }

    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a + (b - a) * t
    }

    fn hermite(p0: Self, m0: Self, p1: Self, m1: Self, h: [f32; 4]) -> Self {
        h[0] * p0 + h[1] * m0 + h[2] * p1 + h[3] * m1
    }

    fn scale(self, s: f32) -> Self {
        self * s
    }
}

impl Keyframe for Vec3 {
    fn neutral() -> Self {
        Vec3::ZERO
    }

    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }

    fn hermite(p0: Self, m0: Self, p1: Self, m1: Self, h: [f32; 4]) -> Self {
        p0 * h[0] + m0 * h[1] + p1 * h[2] + m1 * h[3]
    }

    fn scale(self, s: f32) -> Self {
        self * s
    }
}

impl Keyframe for Quat {
    fn neutral() -> Self {
        Quat::IDENTITY
    }

    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        slerp_shortest(a, b, t)
    }

    /// 按分量求值后重新归一化
    fn hermite(p0: Self, m0: Self, p1: Self, m1: Self, h: [f32; 4]) -> Self {
        normalize_or_identity(p0 * h[0] + m0 * h[1] + p1 * h[2] + m1 * h[3])
    }

    fn scale(self, s: f32) -> Self {
        self * s
    }
}

// ============================================================================
// 采样器
// ============================================================================

/// 插值方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
    CubicSpline,
}

/// 三次样条关键帧：入切线、值、出切线
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubicKey<T> {
    pub in_tangent: T,
    pub value: T,
    pub out_tangent: T,
}

/// 采样器
#[derive(Clone, Debug, PartialEq)]
pub enum Sampler<T> {
    Constant(T),
    Linear { times: Vec<f32>, values: Vec<T> },
    Step { times: Vec<f32>, values: Vec<T> },
    CubicSpline { times: Vec<f32>, keys: Vec<CubicKey<T>> },
}

impl<T: Keyframe> Sampler<T> {
    /// 由 glTF 风格的输入 / 输出数组构建
    ///
    /// CUBICSPLINE 的输出按 (入切线, 值, 出切线) 三个一组排列。
    /// 长度不匹配返回 None；零个或一个关键帧退化为常量。
    pub fn new(interpolation: Interpolation, times: Vec<f32>, values: Vec<T>) -> Option<Self> {
        let stride = match interpolation {
            Interpolation::CubicSpline => 3,
            _ => 1,
        };
        if values.len() != times.len() * stride {
            return None;
        }
        if times.windows(2).any(|w| !(w[0] <= w[1])) {
            return None;
        }

        match times.len() {
            0 => return Some(Sampler::Constant(T::neutral())),
            1 => {
                let value = if stride == 3 { values[1] } else { values[0] };
                return Some(Sampler::Constant(value));
            }
            _ => {}
        }

        Some(match interpolation {
            Interpolation::Linear => Sampler::Linear { times, values },
            Interpolation::Step => Sampler::Step { times, values },
            Interpolation::CubicSpline => {
                let keys = values
                    .chunks_exact(3)
                    .map(|c| CubicKey {
                        in_tangent: c[0],
                        value: c[1],
                        out_tangent: c[2],
                    })
                    .collect();
                Sampler::CubicSpline { times, keys }
            }
        })
    }

    pub fn constant(value: T) -> Self {
        Sampler::Constant(value)
    }

    pub fn linear(times: Vec<f32>, values: Vec<T>) -> Option<Self> {
        Self::new(Interpolation::Linear, times, values)
    }

    pub fn step(times: Vec<f32>, values: Vec<T>) -> Option<Self> {
        Self::new(Interpolation::Step, times, values)
    }

    fn times(&self) -> &[f32] {
        match self {
            Sampler::Constant(_) => &[],
            Sampler::Linear { times, .. }
            | Sampler::Step { times, .. }
            | Sampler::CubicSpline { times, .. } => times,
        }
    }

    /// 最后一个关键帧的时间
    pub fn end_time(&self) -> f32 {
        self.times().last().copied().unwrap_or(0.0)
    }

    pub fn start_time(&self) -> f32 {
        self.times().first().copied().unwrap_or(0.0)
    }

    /// 在时间 t 求值
    pub fn sample(&self, t: f32) -> T {
        match self {
            Sampler::Constant(v) => *v,
            Sampler::Linear { times, values } => match locate(times, t) {
                Segment::Before => values[0],
                Segment::After => values[values.len() - 1],
                Segment::Between(i, s) => T::interpolate(values[i], values[i + 1], s),
            },
            Sampler::Step { times, values } => match locate(times, t) {
                Segment::Before => values[0],
                Segment::After => values[values.len() - 1],
                Segment::Between(i, _) => values[i],
            },
            Sampler::CubicSpline { times, keys } => match locate(times, t) {
                Segment::Before => keys[0].value,
                Segment::After => keys[keys.len() - 1].value,
                Segment::Between(i, s) => {
                    let dt = times[i + 1] - times[i];
                    let k0 = &keys[i];
                    let k1 = &keys[i + 1];
                    T::hermite(
                        k0.value,
                        k0.out_tangent.scale(dt),
                        k1.value,
                        k1.in_tangent.scale(dt),
                        hermite_basis(s),
                    )
                }
            },
        }
    }
}

/// 标准 Hermite 基函数 `[h00, h10, h01, h11]`
#[inline]
pub fn hermite_basis(s: f32) -> [f32; 4] {
    let s2 = s * s;
    let s3 = s2 * s;
    [
        2.0 * s3 - 3.0 * s2 + 1.0,
        s3 - 2.0 * s2 + s,
        -2.0 * s3 + 3.0 * s2,
        s3 - s2,
    ]
}

enum Segment {
    Before,
    After,
    /// 区间起点索引与归一化参数
    Between(usize, f32),
}

fn locate(times: &[f32], t: f32) -> Segment {
    if !(t > times[0]) {
        return Segment::Before;
    }
    let last = times.len() - 1;
    if t >= times[last] {
        return Segment::After;
    }
    // 第一个大于 t 的关键帧
    let upper = times.partition_point(|&k| k <= t);
    let i = upper - 1;
    let span = times[upper] - times[i];
    let s = if span > 0.0 { (t - times[i]) / span } else { 0.0 };
    Segment::Between(i, s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::angle_between_deg;

    #[test]
    fn test_linear_midpoint() {
        let s = Sampler::linear(vec![0.0, 1.0], vec![0.0f32, 10.0]).unwrap();
        assert!((s.sample(0.5) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_step_holds_then_jumps() {
        let s = Sampler::step(vec![0.0, 1.0, 2.0], vec![1.0f32, 2.0, 3.0]).unwrap();
        assert_eq!(s.sample(0.0), 1.0);
        assert_eq!(s.sample(0.5), 1.0);
        assert_eq!(s.sample(0.999), 1.0);
        // 恰好在下一个关键帧时跳变
        assert_eq!(s.sample(1.0), 2.0);
        assert_eq!(s.sample(1.5), 2.0);
        assert_eq!(s.sample(2.0), 3.0);
    }

    #[test]
    fn test_cubic_zero_tangents() {
        let values = vec![0.0f32, 0.0, 0.0, 0.0, 10.0, 0.0];
        let s = Sampler::new(Interpolation::CubicSpline, vec![0.0, 1.0], values).unwrap();
        assert_eq!(s.sample(0.0), 0.0);
        assert_eq!(s.sample(1.0), 10.0);
        assert!((s.sample(0.5) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_cubic_endpoints_exact_with_large_tangents() {
        let values = vec![0.0f32, 2.0, 50.0, -40.0, 7.0, 0.0];
        let s = Sampler::new(Interpolation::CubicSpline, vec![0.0, 1.0], values).unwrap();
        assert!((s.sample(0.0) - 2.0).abs() < 1e-6);
        assert!((s.sample(1.0) - 7.0).abs() < 1e-6);
        // 大切线允许超出关键帧范围
        let peak = (1..10).map(|i| s.sample(i as f32 / 10.0)).fold(f32::MIN, f32::max);
        assert!(peak > 7.0);
    }

    #[test]
    fn test_single_keyframe_constant() {
        let s = Sampler::linear(vec![0.5], vec![3.0f32]).unwrap();
        for t in [-1.0, 0.0, 0.5, 1.0, 2.0] {
            assert_eq!(s.sample(t), 3.0);
        }
        let empty = Sampler::<f32>::linear(vec![], vec![]).unwrap();
        assert_eq!(empty.sample(1.0), 0.0);
    }

    #[test]
    fn test_clamps_outside_range() {
        let s = Sampler::linear(vec![1.0, 2.0], vec![Vec3::X, Vec3::Y]).unwrap();
        assert_eq!(s.sample(-5.0), Vec3::X);
        assert_eq!(s.sample(9.0), Vec3::Y);
    }

    #[test]
    fn test_quat_linear_shortest_path() {
        let a = Quat::IDENTITY;
        let b = Quat::from_rotation_y(150f32.to_radians());
        let direct = Sampler::linear(vec![0.0, 1.0], vec![a, b]).unwrap();
        let negated = Sampler::linear(vec![0.0, 1.0], vec![a, -b]).unwrap();

        let mut prev = a;
        for i in 1..=20 {
            let t = i as f32 / 20.0;
            let q1 = direct.sample(t);
            let q2 = negated.sample(t);
            assert!(q1.dot(q2).abs() > 0.9999);
            // 路径连续：相邻采样间的角度变化保持在 7.5° 附近
            let step = angle_between_deg(prev, q1);
            assert!(step < 8.0, "t={} step={}", t, step);
            prev = q1;
        }
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        assert!(Sampler::linear(vec![0.0, 1.0], vec![1.0f32]).is_none());
        assert!(Sampler::new(Interpolation::CubicSpline, vec![0.0, 1.0], vec![1.0f32; 4]).is_none());
    }
}
