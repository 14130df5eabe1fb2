//! 人形骨骼角色
//!
//! VRM 1.0 的 55 个标准角色，外加 8 个可选扭转骨。

/// 重定向修正分类
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoneAxisClass {
    /// 矢状面上的中线骨骼（无左右对应）
    Centerline,
    /// 成对的肢体骨骼
    Limb,
}

macro_rules! humanoid_bones {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// 人形骨骼角色
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum HumanoidBone {
            $($variant),*
        }

        impl HumanoidBone {
            /// 全部角色（声明顺序）
            pub const ALL: &'static [HumanoidBone] = &[$(HumanoidBone::$variant),*];

            /// VRM 1.0 名称
            pub fn name(self) -> &'static str {
                match self {
                    $(HumanoidBone::$variant => $name),*
                }
            }

            /// 按 VRM 1.0 名称查找（大小写不敏感）
            pub fn from_name(name: &str) -> Option<Self> {
                $(
                    if name.eq_ignore_ascii_case($name) {
                        return Some(HumanoidBone::$variant);
                    }
                )*
                None
            }
        }
    };
}

humanoid_bones! {
    // 躯干
    Hips => "hips",
    Spine => "spine",
    Chest => "chest",
    UpperChest => "upperChest",
    Neck => "neck",
    Head => "head",
    LeftEye => "leftEye",
    RightEye => "rightEye",
    Jaw => "jaw",
    // 腿
    LeftUpperLeg => "leftUpperLeg",
    LeftLowerLeg => "leftLowerLeg",
    LeftFoot => "leftFoot",
    LeftToes => "leftToes",
    RightUpperLeg => "rightUpperLeg",
    RightLowerLeg => "rightLowerLeg",
    RightFoot => "rightFoot",
    RightToes => "rightToes",
    // 手臂
    LeftShoulder => "leftShoulder",
    LeftUpperArm => "leftUpperArm",
    LeftLowerArm => "leftLowerArm",
    LeftHand => "leftHand",
    RightShoulder => "rightShoulder",
    RightUpperArm => "rightUpperArm",
    RightLowerArm => "rightLowerArm",
    RightHand => "rightHand",
    // 左手指
    LeftThumbMetacarpal => "leftThumbMetacarpal",
    LeftThumbProximal => "leftThumbProximal",
    LeftThumbDistal => "leftThumbDistal",
    LeftIndexProximal => "leftIndexProximal",
    LeftIndexIntermediate => "leftIndexIntermediate",
    LeftIndexDistal => "leftIndexDistal",
    LeftMiddleProximal => "leftMiddleProximal",
    LeftMiddleIntermediate => "leftMiddleIntermediate",
    LeftMiddleDistal => "leftMiddleDistal",
    LeftRingProximal => "leftRingProximal",
    LeftRingIntermediate => "leftRingIntermediate",
    LeftRingDistal => "leftRingDistal",
    LeftLittleProximal => "leftLittleProximal",
    LeftLittleIntermediate => "leftLittleIntermediate",
    LeftLittleDistal => "leftLittleDistal",
    // 右手指
    RightThumbMetacarpal => "rightThumbMetacarpal",
    RightThumbProximal => "rightThumbProximal",
    RightThumbDistal => "rightThumbDistal",
    RightIndexProximal => "rightIndexProximal",
    RightIndexIntermediate => "rightIndexIntermediate",
    RightIndexDistal => "rightIndexDistal",
    RightMiddleProximal => "rightMiddleProximal",
    RightMiddleIntermediate => "rightMiddleIntermediate",
    RightMiddleDistal => "rightMiddleDistal",
    RightRingProximal => "rightRingProximal",
    RightRingIntermediate => "rightRingIntermediate",
    RightRingDistal => "rightRingDistal",
    RightLittleProximal => "rightLittleProximal",
    RightLittleIntermediate => "rightLittleIntermediate",
    RightLittleDistal => "rightLittleDistal",
    // 扭转骨（可选）
    LeftUpperArmTwist => "leftUpperArmTwist",
    LeftLowerArmTwist => "leftLowerArmTwist",
    RightUpperArmTwist => "rightUpperArmTwist",
    RightLowerArmTwist => "rightLowerArmTwist",
    LeftUpperLegTwist => "leftUpperLegTwist",
    LeftLowerLegTwist => "leftLowerLegTwist",
    RightUpperLegTwist => "rightUpperLegTwist",
    RightLowerLegTwist => "rightLowerLegTwist",
}

impl HumanoidBone {
    /// 模型必须具备的角色
    pub const REQUIRED: &'static [HumanoidBone] = &[
        HumanoidBone::Hips,
        HumanoidBone::Spine,
        HumanoidBone::Head,
        HumanoidBone::LeftUpperArm,
        HumanoidBone::LeftLowerArm,
        HumanoidBone::LeftHand,
        HumanoidBone::RightUpperArm,
        HumanoidBone::RightLowerArm,
        HumanoidBone::RightHand,
        HumanoidBone::LeftUpperLeg,
        HumanoidBone::LeftLowerLeg,
        HumanoidBone::LeftFoot,
        HumanoidBone::RightUpperLeg,
        HumanoidBone::RightLowerLeg,
        HumanoidBone::RightFoot,
    ];

    pub fn is_required(self) -> bool {
        Self::REQUIRED.contains(&self)
    }

    /// 中线 / 肢体分类（下颌归入中线，眼睛归入肢体）
    pub fn axis_class(self) -> BoneAxisClass {
        use HumanoidBone::*;
        match self {
            Hips | Spine | Chest | UpperChest | Neck | Head | Jaw => BoneAxisClass::Centerline,
            _ => BoneAxisClass::Limb,
        }
    }

    pub fn is_twist(self) -> bool {
        self.twist_base().is_some()
    }

    /// 扭转骨对应的主骨骼
    pub fn twist_base(self) -> Option<HumanoidBone> {
        use HumanoidBone::*;
        match self {
            LeftUpperArmTwist => Some(LeftUpperArm),
            LeftLowerArmTwist => Some(LeftLowerArm),
            RightUpperArmTwist => Some(RightUpperArm),
            RightLowerArmTwist => Some(RightLowerArm),
            LeftUpperLegTwist => Some(LeftUpperLeg),
            LeftLowerLegTwist => Some(LeftLowerLeg),
            RightUpperLegTwist => Some(RightUpperLeg),
            RightLowerLegTwist => Some(RightLowerLeg),
            _ => None,
        }
    }

    /// 按 VRM 0.x 名称查找
    ///
    /// 0.x 的拇指命名整体偏移一节：
    /// `thumbProximal/Intermediate/Distal` 对应 1.0 的 `thumbMetacarpal/Proximal/Distal`。
    pub fn from_v0_name(name: &str) -> Option<Self> {
        use HumanoidBone::*;
        let lower = name.to_ascii_lowercase();
        let remapped = match lower.as_str() {
            "leftthumbproximal" => Some(LeftThumbMetacarpal),
            "leftthumbintermediate" => Some(LeftThumbProximal),
            "leftthumbdistal" => Some(LeftThumbDistal),
            "rightthumbproximal" => Some(RightThumbMetacarpal),
            "rightthumbintermediate" => Some(RightThumbProximal),
            "rightthumbdistal" => Some(RightThumbDistal),
            _ => None,
        };
        remapped.or_else(|| Self::from_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_count() {
        assert_eq!(HumanoidBone::ALL.len(), 63);
        assert_eq!(HumanoidBone::ALL.iter().filter(|b| !b.is_twist()).count(), 55);
    }

    #[test]
    fn test_name_roundtrip() {
        for &bone in HumanoidBone::ALL {
            assert_eq!(HumanoidBone::from_name(bone.name()), Some(bone));
        }
        assert_eq!(HumanoidBone::from_name("UPPERCHEST"), Some(HumanoidBone::UpperChest));
        assert_eq!(HumanoidBone::from_name("tail"), None);
    }

    #[test]
    fn test_v0_thumb_remap() {
        assert_eq!(
            HumanoidBone::from_v0_name("leftThumbProximal"),
            Some(HumanoidBone::LeftThumbMetacarpal)
        );
        assert_eq!(
            HumanoidBone::from_v0_name("rightThumbIntermediate"),
            Some(HumanoidBone::RightThumbProximal)
        );
        assert_eq!(HumanoidBone::from_v0_name("hips"), Some(HumanoidBone::Hips));
    }

    #[test]
    fn test_axis_class_table() {
        for bone in [
            HumanoidBone::Hips,
            HumanoidBone::Spine,
            HumanoidBone::Chest,
            HumanoidBone::UpperChest,
            HumanoidBone::Neck,
            HumanoidBone::Head,
        ] {
            assert_eq!(bone.axis_class(), BoneAxisClass::Centerline);
        }
        assert_eq!(HumanoidBone::LeftUpperArm.axis_class(), BoneAxisClass::Limb);
        assert_eq!(HumanoidBone::RightLowerLeg.axis_class(), BoneAxisClass::Limb);
    }

    #[test]
    fn test_twist_base() {
        assert_eq!(
            HumanoidBone::LeftUpperArmTwist.twist_base(),
            Some(HumanoidBone::LeftUpperArm)
        );
        assert!(!HumanoidBone::LeftUpperArm.is_twist());
    }
}
