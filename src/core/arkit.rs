use strum::{EnumCount, EnumIter, EnumString, IntoStaticStr, IntoEnumIterator};

/// The 52 ARKit facial channels. Both the capture peripheral and perfect-sync
/// VMC streams speak this vocabulary.
#[repr(usize)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "camelCase")]
pub enum ArkitChannel {
    EyeBlinkLeft,
    EyeLookDownLeft,
    EyeLookInLeft,
    EyeLookOutLeft,
    EyeLookUpLeft,
    EyeSquintLeft,
    EyeWideLeft,
    EyeBlinkRight,
    EyeLookDownRight,
    EyeLookInRight,
    EyeLookOutRight,
    EyeLookUpRight,
    EyeSquintRight,
    EyeWideRight,

    JawForward,
    JawLeft,
    JawRight,
    JawOpen,

    MouthClose,
    MouthFunnel,
    MouthPucker,
    MouthLeft,
    MouthRight,
    MouthSmileLeft,
    MouthSmileRight,
    MouthFrownLeft,
    MouthFrownRight,
    MouthDimpleLeft,
    MouthDimpleRight,
    MouthStretchLeft,
    MouthStretchRight,
    MouthRollLower,
    MouthRollUpper,
    MouthShrugLower,
    MouthShrugUpper,
    MouthPressLeft,
    MouthPressRight,
    MouthLowerDownLeft,
    MouthLowerDownRight,
    MouthUpperUpLeft,
    MouthUpperUpRight,

    BrowDownLeft,
    BrowDownRight,
    BrowInnerUp,
    BrowOuterUpLeft,
    BrowOuterUpRight,

    CheekPuff,
    CheekSquintLeft,
    CheekSquintRight,

    NoseSneerLeft,
    NoseSneerRight,

    TongueOut,
}

impl ArkitChannel {
    #[inline(always)]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Exact-match lookup that also accepts the peripheral's short side suffix
    /// (`eyeBlink_L` for `eyeBlinkLeft`). Scans the static table; never allocates.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        if let Some(prefix) = name.strip_suffix("_L") {
            return Self::iter().find(|c| c.as_str().strip_suffix("Left") == Some(prefix));
        }
        if let Some(prefix) = name.strip_suffix("_R") {
            return Self::iter().find(|c| c.as_str().strip_suffix("Right") == Some(prefix));
        }
        Self::iter().find(|c| c.as_str() == name)
    }

    /// Short-suffix spelling, if this channel has a side.
    pub fn legacy_name(self) -> Option<String> {
        let name = self.as_str();
        if let Some(prefix) = name.strip_suffix("Left") {
            Some(format!("{}_L", prefix))
        } else {
            name.strip_suffix("Right")
                .map(|prefix| format!("{}_R", prefix))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_channel_count() {
        assert_eq!(ArkitChannel::COUNT, 52);
    }

    #[test]
    fn test_camel_case_names() {
        assert_eq!(ArkitChannel::EyeBlinkLeft.as_str(), "eyeBlinkLeft");
        assert_eq!(ArkitChannel::TongueOut.as_str(), "tongueOut");
        assert_eq!(
            ArkitChannel::from_str("mouthSmileRight").ok(),
            Some(ArkitChannel::MouthSmileRight)
        );
    }

    #[test]
    fn test_wire_name_suffixes() {
        assert_eq!(
            ArkitChannel::from_wire_name("eyeBlink_L"),
            Some(ArkitChannel::EyeBlinkLeft)
        );
        assert_eq!(
            ArkitChannel::from_wire_name("browOuterUp_R"),
            Some(ArkitChannel::BrowOuterUpRight)
        );
        assert_eq!(
            ArkitChannel::from_wire_name("jawOpen"),
            Some(ArkitChannel::JawOpen)
        );
        assert_eq!(ArkitChannel::from_wire_name("hapihapi"), None);
        assert_eq!(ArkitChannel::from_wire_name("cheekPuff_L"), None);
    }

    #[test]
    fn test_legacy_name() {
        assert_eq!(
            ArkitChannel::MouthUpperUpLeft.legacy_name().as_deref(),
            Some("mouthUpperUp_L")
        );
        assert_eq!(ArkitChannel::CheekPuff.legacy_name(), None);
    }
}
