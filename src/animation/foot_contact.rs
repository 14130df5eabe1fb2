//! 脚部接地检测
//!
//! 每只脚一个两态状态机（着地 / 离地）。速度与离地高度都低于阈值
//! 且连续保持 `min_frames_in_state` 帧才切换为着地；离地同理，
//! 单帧越过阈值不会立即翻转。

use glam::Vec3;

/// 检测参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FootContactConfig {
    /// 速度阈值（米/秒），默认 0.15
    pub velocity_threshold: f32,
    /// 离地高度阈值（米），默认 0.05
    pub height_threshold: f32,
    /// 状态切换所需的连续帧数，默认 3
    pub min_frames_in_state: u32,
    /// 地面高度（世界 Y），默认 0.0
    pub ground_height: f32,
}

impl Default for FootContactConfig {
    fn default() -> Self {
        Self {
            velocity_threshold: 0.15,
            height_threshold: 0.05,
            min_frames_in_state: 3,
            ground_height: 0.0,
        }
    }
}

/// 单只脚的检测器
#[derive(Clone, Debug, Default)]
pub struct FootContactDetector {
    pub config: FootContactConfig,
    planted: bool,
    /// 与当前状态相反的条件已连续成立的帧数
    pending_frames: u32,
    locked_position: Option<Vec3>,
    last_position: Option<Vec3>,
}

impl FootContactDetector {
    pub fn new(config: FootContactConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    #[inline]
    pub fn is_planted(&self) -> bool {
        self.planted
    }

    /// 着地时锁定的世界位置
    #[inline]
    pub fn locked_position(&self) -> Option<Vec3> {
        self.locked_position
    }

    /// 无条件清除状态与锁定位置
    pub fn reset(&mut self) {
        self.planted = false;
        self.pending_frames = 0;
        self.locked_position = None;
        self.last_position = None;
    }

    /// 输入本帧脚部世界位置，返回是否着地
    pub fn update(&mut self, position: Vec3, dt: f32) -> bool {
        if !position.is_finite() {
            return self.planted;
        }

        let velocity = match self.last_position {
            Some(last) if dt > 0.0 && dt.is_finite() => (position - last).length() / dt,
            _ => 0.0,
        };
        self.last_position = Some(position);

        let height = position.y - self.config.ground_height;
        let grounded = velocity < self.config.velocity_threshold && height < self.config.height_threshold;

        if grounded == self.planted {
            self.pending_frames = 0;
            return self.planted;
        }

        self.pending_frames += 1;
        if self.pending_frames >= self.config.min_frames_in_state.max(1) {
            self.planted = grounded;
            self.pending_frames = 0;
            self.locked_position = if grounded {
                Some(Vec3::new(position.x, self.config.ground_height.max(position.y), position.z))
            } else {
                None
            };
            log::trace!("脚部接地状态切换: planted={}", self.planted);
        }
        self.planted
    }
}
