use strum::{EnumCount, EnumIter, EnumString, IntoStaticStr};

use super::source::DataCategory;

/// Humanoid bones as named on the VMC wire.
#[repr(usize)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, EnumString, IntoStaticStr,
)]
pub enum Bone {
    Hips,
    LeftUpperLeg,
    RightUpperLeg,
    LeftLowerLeg,
    RightLowerLeg,
    LeftFoot,
    RightFoot,
    Spine,
    Chest,
    UpperChest,
    Neck,
    Head,
    LeftShoulder,
    RightShoulder,
    LeftUpperArm,
    RightUpperArm,
    LeftLowerArm,
    RightLowerArm,
    LeftHand,
    RightHand,
    LeftToes,
    RightToes,
    LeftEye,
    RightEye,
    Jaw,

    LeftThumbProximal,
    LeftThumbIntermediate,
    LeftThumbDistal,
    LeftIndexProximal,
    LeftIndexIntermediate,
    LeftIndexDistal,
    LeftMiddleProximal,
    LeftMiddleIntermediate,
    LeftMiddleDistal,
    LeftRingProximal,
    LeftRingIntermediate,
    LeftRingDistal,
    LeftLittleProximal,
    LeftLittleIntermediate,
    LeftLittleDistal,

    RightThumbProximal,
    RightThumbIntermediate,
    RightThumbDistal,
    RightIndexProximal,
    RightIndexIntermediate,
    RightIndexDistal,
    RightMiddleProximal,
    RightMiddleIntermediate,
    RightMiddleDistal,
    RightRingProximal,
    RightRingIntermediate,
    RightRingDistal,
    RightLittleProximal,
    RightLittleIntermediate,
    RightLittleDistal,
}

/// Bones never placed in the reconstructed tree.
pub const EXCLUDED_BONES: [Bone; 3] = [Bone::LeftEye, Bone::RightEye, Bone::Jaw];

/// (child, parent) pairs. Hips has no entry: it hangs off the synthetic root.
pub static BONE_PARENTS: [(Bone, Bone); Bone::COUNT - 1] = [
    (Bone::LeftUpperLeg, Bone::Hips),
    (Bone::RightUpperLeg, Bone::Hips),
    (Bone::LeftLowerLeg, Bone::LeftUpperLeg),
    (Bone::RightLowerLeg, Bone::RightUpperLeg),
    (Bone::LeftFoot, Bone::LeftLowerLeg),
    (Bone::RightFoot, Bone::RightLowerLeg),
    (Bone::Spine, Bone::Hips),
    (Bone::Chest, Bone::Spine),
    (Bone::UpperChest, Bone::Chest),
    (Bone::Neck, Bone::UpperChest),
    (Bone::Head, Bone::Neck),
    (Bone::LeftShoulder, Bone::UpperChest),
    (Bone::RightShoulder, Bone::UpperChest),
    (Bone::LeftUpperArm, Bone::LeftShoulder),
    (Bone::RightUpperArm, Bone::RightShoulder),
    (Bone::LeftLowerArm, Bone::LeftUpperArm),
    (Bone::RightLowerArm, Bone::RightUpperArm),
    (Bone::LeftHand, Bone::LeftLowerArm),
    (Bone::RightHand, Bone::RightLowerArm),
    (Bone::LeftToes, Bone::LeftFoot),
    (Bone::RightToes, Bone::RightFoot),
    (Bone::LeftEye, Bone::Head),
    (Bone::RightEye, Bone::Head),
    (Bone::Jaw, Bone::Head),
    (Bone::LeftThumbProximal, Bone::LeftHand),
    (Bone::LeftThumbIntermediate, Bone::LeftThumbProximal),
    (Bone::LeftThumbDistal, Bone::LeftThumbIntermediate),
    (Bone::LeftIndexProximal, Bone::LeftHand),
    (Bone::LeftIndexIntermediate, Bone::LeftIndexProximal),
    (Bone::LeftIndexDistal, Bone::LeftIndexIntermediate),
    (Bone::LeftMiddleProximal, Bone::LeftHand),
    (Bone::LeftMiddleIntermediate, Bone::LeftMiddleProximal),
    (Bone::LeftMiddleDistal, Bone::LeftMiddleIntermediate),
    (Bone::LeftRingProximal, Bone::LeftHand),
    (Bone::LeftRingIntermediate, Bone::LeftRingProximal),
    (Bone::LeftRingDistal, Bone::LeftRingIntermediate),
    (Bone::LeftLittleProximal, Bone::LeftHand),
    (Bone::LeftLittleIntermediate, Bone::LeftLittleProximal),
    (Bone::LeftLittleDistal, Bone::LeftLittleIntermediate),
    (Bone::RightThumbProximal, Bone::RightHand),
    (Bone::RightThumbIntermediate, Bone::RightThumbProximal),
    (Bone::RightThumbDistal, Bone::RightThumbIntermediate),
    (Bone::RightIndexProximal, Bone::RightHand),
    (Bone::RightIndexIntermediate, Bone::RightIndexProximal),
    (Bone::RightIndexDistal, Bone::RightIndexIntermediate),
    (Bone::RightMiddleProximal, Bone::RightHand),
    (Bone::RightMiddleIntermediate, Bone::RightMiddleProximal),
    (Bone::RightMiddleDistal, Bone::RightMiddleIntermediate),
    (Bone::RightRingProximal, Bone::RightHand),
    (Bone::RightRingIntermediate, Bone::RightRingProximal),
    (Bone::RightRingDistal, Bone::RightRingIntermediate),
    (Bone::RightLittleProximal, Bone::RightHand),
    (Bone::RightLittleIntermediate, Bone::RightLittleProximal),
    (Bone::RightLittleDistal, Bone::RightLittleIntermediate),
];

impl Bone {
    #[inline(always)]
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn parent(self) -> Option<Bone> {
        BONE_PARENTS
            .iter()
            .find(|(child, _)| *child == self)
            .map(|(_, parent)| *parent)
    }

    pub fn is_excluded(self) -> bool {
        EXCLUDED_BONES.contains(&self)
    }

    /// Which arbitrated category carries this bone.
    pub fn category(self) -> DataCategory {
        match self {
            Bone::Hips
            | Bone::LeftUpperLeg
            | Bone::RightUpperLeg
            | Bone::LeftLowerLeg
            | Bone::RightLowerLeg
            | Bone::LeftFoot
            | Bone::RightFoot
            | Bone::LeftToes
            | Bone::RightToes => DataCategory::LowerBodyPose,
            Bone::Spine
            | Bone::Chest
            | Bone::UpperChest
            | Bone::Neck
            | Bone::Head
            | Bone::LeftEye
            | Bone::RightEye
            | Bone::Jaw => DataCategory::HeadPose,
            _ => DataCategory::HandPose,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_every_bone_but_hips_has_parent() {
        for bone in Bone::iter() {
            assert_eq!(bone.parent().is_none(), bone == Bone::Hips, "{:?}", bone);
        }
    }

    #[test]
    fn test_parent_chain_reaches_hips() {
        for bone in Bone::iter() {
            let mut cursor = bone;
            let mut depth = 0;
            while let Some(parent) = cursor.parent() {
                cursor = parent;
                depth += 1;
                assert!(depth < Bone::COUNT);
            }
            assert_eq!(cursor, Bone::Hips);
        }
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(Bone::from_str("RightUpperArm").ok(), Some(Bone::RightUpperArm));
        assert_eq!(Bone::LeftLittleDistal.as_str(), "LeftLittleDistal");
        assert!(Bone::from_str("Tail").is_err());
    }

    #[test]
    fn test_categories() {
        assert_eq!(Bone::Head.category(), DataCategory::HeadPose);
        assert_eq!(Bone::LeftIndexDistal.category(), DataCategory::HandPose);
        assert_eq!(Bone::RightShoulder.category(), DataCategory::HandPose);
        assert_eq!(Bone::RightToes.category(), DataCategory::LowerBodyPose);
    }
}
