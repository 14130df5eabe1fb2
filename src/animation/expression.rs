//! 表情预设
//!
//! VRM 1.0 预设名称；同时接受 VRM 0.x 的旧名称。

/// 表情预设
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExpressionPreset {
    Happy,
    Angry,
    Sad,
    Relaxed,
    Surprised,
    Aa,
    Ih,
    Ou,
    Ee,
    Oh,
    Blink,
    BlinkLeft,
    BlinkRight,
    LookUp,
    LookDown,
    LookLeft,
    LookRight,
    Neutral,
}

impl ExpressionPreset {
    pub const ALL: &'static [ExpressionPreset] = &[
        ExpressionPreset::Happy,
        ExpressionPreset::Angry,
        ExpressionPreset::Sad,
        ExpressionPreset::Relaxed,
        ExpressionPreset::Surprised,
        ExpressionPreset::Aa,
        ExpressionPreset::Ih,
        ExpressionPreset::Ou,
        ExpressionPreset::Ee,
        ExpressionPreset::Oh,
        ExpressionPreset::Blink,
        ExpressionPreset::BlinkLeft,
        ExpressionPreset::BlinkRight,
        ExpressionPreset::LookUp,
        ExpressionPreset::LookDown,
        ExpressionPreset::LookLeft,
        ExpressionPreset::LookRight,
        ExpressionPreset::Neutral,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExpressionPreset::Happy => "happy",
            ExpressionPreset::Angry => "angry",
            ExpressionPreset::Sad => "sad",
            ExpressionPreset::Relaxed => "relaxed",
            ExpressionPreset::Surprised => "surprised",
            ExpressionPreset::Aa => "aa",
            ExpressionPreset::Ih => "ih",
            ExpressionPreset::Ou => "ou",
            ExpressionPreset::Ee => "ee",
            ExpressionPreset::Oh => "oh",
            ExpressionPreset::Blink => "blink",
            ExpressionPreset::BlinkLeft => "blinkLeft",
            ExpressionPreset::BlinkRight => "blinkRight",
            ExpressionPreset::LookUp => "lookUp",
            ExpressionPreset::LookDown => "lookDown",
            ExpressionPreset::LookLeft => "lookLeft",
            ExpressionPreset::LookRight => "lookRight",
            ExpressionPreset::Neutral => "neutral",
        }
    }

    /// 解析名称，兼容 VRM 0.x
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let preset = match lower.as_str() {
            "happy" | "joy" => ExpressionPreset::Happy,
            "angry" => ExpressionPreset::Angry,
            "sad" | "sorrow" => ExpressionPreset::Sad,
            "relaxed" | "fun" => ExpressionPreset::Relaxed,
            "surprised" => ExpressionPreset::Surprised,
            "aa" | "a" => ExpressionPreset::Aa,
            "ih" | "i" => ExpressionPreset::Ih,
            "ou" | "u" => ExpressionPreset::Ou,
            "ee" | "e" => ExpressionPreset::Ee,
            "oh" | "o" => ExpressionPreset::Oh,
            "blink" => ExpressionPreset::Blink,
            "blinkleft" | "blink_l" => ExpressionPreset::BlinkLeft,
            "blinkright" | "blink_r" => ExpressionPreset::BlinkRight,
            "lookup" => ExpressionPreset::LookUp,
            "lookdown" => ExpressionPreset::LookDown,
            "lookleft" => ExpressionPreset::LookLeft,
            "lookright" => ExpressionPreset::LookRight,
            "neutral" => ExpressionPreset::Neutral,
            _ => return None,
        };
        Some(preset)
    }

    /// 口型组
    pub fn is_mouth(self) -> bool {
        matches!(
            self,
            ExpressionPreset::Aa
                | ExpressionPreset::Ih
                | ExpressionPreset::Ou
                | ExpressionPreset::Ee
                | ExpressionPreset::Oh
        )
    }

    /// 眨眼组
    pub fn is_blink(self) -> bool {
        matches!(
            self,
            ExpressionPreset::Blink | ExpressionPreset::BlinkLeft | ExpressionPreset::BlinkRight
        )
    }

    /// 视线组
    pub fn is_look_at(self) -> bool {
        matches!(
            self,
            ExpressionPreset::LookUp
                | ExpressionPreset::LookDown
                | ExpressionPreset::LookLeft
                | ExpressionPreset::LookRight
        )
    }
}

/// 表情键：预设或自定义名称
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExpressionKey {
    Preset(ExpressionPreset),
    Custom(String),
}

impl ExpressionKey {
    /// 预设名优先，其余视为自定义
    pub fn parse(name: &str) -> Self {
        match ExpressionPreset::from_name(name) {
            Some(preset) => ExpressionKey::Preset(preset),
            None => ExpressionKey::Custom(name.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ExpressionKey::Preset(p) => p.name(),
            ExpressionKey::Custom(name) => name,
        }
    }

    pub fn preset(&self) -> Option<ExpressionPreset> {
        match self {
            ExpressionKey::Preset(p) => Some(*p),
            ExpressionKey::Custom(_) => None,
        }
    }
}

impl From<ExpressionPreset> for ExpressionKey {
    fn from(preset: ExpressionPreset) -> Self {
        ExpressionKey::Preset(preset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_names_roundtrip() {
        for &p in ExpressionPreset::ALL {
            assert_eq!(ExpressionPreset::from_name(p.name()), Some(p));
        }
    }

    #[test]
    fn test_v0_aliases() {
        assert_eq!(ExpressionPreset::from_name("Joy"), Some(ExpressionPreset::Happy));
        assert_eq!(ExpressionPreset::from_name("A"), Some(ExpressionPreset::Aa));
        assert_eq!(ExpressionPreset::from_name("Blink_L"), Some(ExpressionPreset::BlinkLeft));
    }

    #[test]
    fn test_key_parse() {
        assert_eq!(ExpressionKey::parse("sorrow"), ExpressionKey::Preset(ExpressionPreset::Sad));
        assert_eq!(ExpressionKey::parse("smug").name(), "smug");
    }

    #[test]
    fn test_groups() {
        assert!(ExpressionPreset::Oh.is_mouth());
        assert!(ExpressionPreset::BlinkRight.is_blink());
        assert!(ExpressionPreset::LookUp.is_look_at());
        assert!(!ExpressionPreset::Happy.is_mouth());
    }
}
