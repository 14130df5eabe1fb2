//! 根运动
//!
//! 重定向后的髋部平移代表整个角色的位移。
//! 提取模式下水平位移移交给角色，并在循环接缝处按整圈位移累计，保证连续。

use glam::Vec3;

/// 根运动模式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RootMotionMode {
    /// 平移保留在髋骨上
    #[default]
    Apply,
    /// 水平位移移交给角色，髋骨只保留高度
    Extract,
    /// 丢弃水平位移（原地播放）
    Suppress,
}

/// 单帧根运动结果
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RootMotionFrame {
    /// 写回髋骨的平移
    pub bone_translation: Vec3,
    /// 本帧角色位移增量
    pub character_delta: Vec3,
}

/// 根运动累计器
#[derive(Clone, Debug)]
pub struct RootMotion {
    pub mode: RootMotionMode,
    /// 片段起点的髋部平移
    start: Vec3,
    /// 一整圈的水平位移（终点 - 起点）
    cycle: Vec3,
    /// 上一帧的累计位移
    last_displacement: Option<Vec3>,
    /// 角色总位移
    accumulated: Vec3,
}

impl RootMotion {
    pub fn new(mode: RootMotionMode, start: Vec3, end: Vec3) -> Self {
        Self {
            mode,
            start,
            cycle: horizontal(end - start),
            last_displacement: Some(Vec3::ZERO),
            accumulated: Vec3::ZERO,
        }
    }

    /// 跳转后清除基准，下一帧重新建立（总位移保留）
    pub fn reset(&mut self) {
        self.last_displacement = None;
    }

    pub fn accumulated(&self) -> Vec3 {
        self.accumulated
    }

    /// 处理一帧
    ///
    /// `loop_count` 为已完成的循环圈数，`sampled` 为本圈内采样到的髋部平移。
    pub fn process(&mut self, sampled: Vec3, loop_count: u32) -> RootMotionFrame {
        if !sampled.is_finite() {
            return RootMotionFrame {
                bone_translation: self.start,
                character_delta: Vec3::ZERO,
            };
        }

        let in_place = Vec3::new(self.start.x, sampled.y, self.start.z);
        match self.mode {
            RootMotionMode::Apply => RootMotionFrame {
                bone_translation: sampled,
                character_delta: Vec3::ZERO,
            },
            RootMotionMode::Suppress => RootMotionFrame {
                bone_translation: in_place,
                character_delta: Vec3::ZERO,
            },
            RootMotionMode::Extract => {
                let displacement = horizontal(sampled - self.start) + self.cycle * loop_count as f32;
                let delta = match self.last_displacement {
                    Some(last) => displacement - last,
                    None => Vec3::ZERO,
                };
                self.last_displacement = Some(displacement);
                self.accumulated += delta;
                RootMotionFrame {
                    bone_translation: in_place,
                    character_delta: delta,
                }
            }
        }
    }
}

#[inline]
fn horizontal(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1 秒内从 (0,1,0) 线性走到 (2,1,0) 的循环片段
    fn sample(time: f32) -> (Vec3, u32) {
        let loops = time.floor() as u32;
        let local = time - loops as f32;
        (Vec3::new(2.0 * local, 1.0, 0.0), loops)
    }

    #[test]
    fn test_extract_continuous_across_seam() {
        let mut rm = RootMotion::new(RootMotionMode::Extract, Vec3::new(0.0, 1.0, 0.0), Vec3::new(2.0, 1.0, 0.0));
        let dt = 0.1;
        let mut t = 0.0;
        let (p, l) = sample(t);
        rm.process(p, l);
        for _ in 0..25 {
            t += dt;
            let (p, l) = sample(t);
            let frame = rm.process(p, l);
            // 每帧位移恒定，接缝处无回跳
            assert!((frame.character_delta.x - 0.2).abs() < 1e-3, "t={} delta={:?}", t, frame.character_delta);
            assert_eq!(frame.bone_translation.x, 0.0);
            assert_eq!(frame.bone_translation.y, 1.0);
        }
        assert!((rm.accumulated().x - 5.0).abs() < 1e-2);
    }

    #[test]
    fn test_suppress_keeps_character_in_place() {
        let mut rm = RootMotion::new(RootMotionMode::Suppress, Vec3::new(0.0, 1.0, 0.0), Vec3::new(2.0, 1.0, 0.0));
        let frame = rm.process(Vec3::new(1.5, 0.9, 0.3), 0);
        assert_eq!(frame.bone_translation, Vec3::new(0.0, 0.9, 0.0));
        assert_eq!(frame.character_delta, Vec3::ZERO);
        assert_eq!(rm.accumulated(), Vec3::ZERO);
    }

    #[test]
    fn test_apply_passthrough() {
        let mut rm = RootMotion::new(RootMotionMode::Apply, Vec3::ZERO, Vec3::X);
        let p = Vec3::new(0.3, 0.9, 0.1);
        assert_eq!(rm.process(p, 3).bone_translation, p);
    }

    #[test]
    fn test_nan_sample_ignored() {
        let mut rm = RootMotion::new(RootMotionMode::Extract, Vec3::Y, Vec3::Y);
        let frame = rm.process(Vec3::new(f32::NAN, 0.0, 0.0), 0);
        assert!(frame.bone_translation.is_finite());
        assert_eq!(frame.character_delta, Vec3::ZERO);
    }
}
