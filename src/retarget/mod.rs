//! 动画重定向
//!
//! - retargeter: 静止姿态增量重定向（含 180° 附近的安全绕过）
//! - coordinate: 手性 / 中线与肢体修正 / 容器级竖直轴转换
//! - root_motion: 髋部平移的根运动提取与循环接缝累计

mod coordinate;
mod retargeter;
mod root_motion;

pub use coordinate::{
    convert_rotation_handedness, convert_translation_handedness, correct_for_axis_class,
    stand_up_rotation, AnimationConvention, CoordinateConverter, UpAxis,
};
pub use retargeter::{should_use_delta_retargeting, RotationRetargeter};
pub use root_motion::{RootMotion, RootMotionFrame, RootMotionMode};
