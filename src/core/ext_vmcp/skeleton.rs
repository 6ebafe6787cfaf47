use std::sync::Arc;

use glam::{Affine3A, Quat, Vec3};
use strum::{EnumCount, IntoEnumIterator};

use crate::core::avatar::AvatarRig;

use super::bones::Bone;

const ROOT: usize = 0;

#[derive(Debug, Clone)]
struct BoneNode {
    bone: Option<Bone>,
    parent: Option<usize>,
    local_position: Vec3,
    local_rotation: Quat,
}

impl BoneNode {
    fn local(&self) -> Affine3A {
        Affine3A::from_rotation_translation(self.local_rotation, self.local_position)
    }
}

/// Humanoid bone tree driven by per-bone local rotations from a VMC sender.
/// Hips translation and rotation are kept outside the tree.
pub struct SkeletonReconstructor {
    nodes: Vec<BoneNode>,
    index: [Option<usize>; Bone::COUNT],
    avatar: Option<Arc<AvatarRig>>,
    hips_local_position: Vec3,
    hips_local_rotation: Quat,
    root_position: Vec3,
    root_rotation: Quat,
}

impl Default for SkeletonReconstructor {
    fn default() -> Self {
        Self::new()
    }
}

impl SkeletonReconstructor {
    pub fn new() -> Self {
        Self {
            nodes: Vec::with_capacity(Bone::COUNT + 1),
            index: [None; Bone::COUNT],
            avatar: None,
            hips_local_position: Vec3::ZERO,
            hips_local_rotation: Quat::IDENTITY,
            root_position: Vec3::ZERO,
            root_rotation: Quat::IDENTITY,
        }
    }

    pub fn is_built(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn set_avatar(&mut self, avatar: Option<Arc<AvatarRig>>) {
        self.clear();
        self.avatar = avatar;
    }

    pub fn generate_hierarchy(&mut self) {
        if self.is_built() {
            return;
        }
        let Some(avatar) = self.avatar.clone() else {
            return;
        };

        self.nodes.push(BoneNode {
            bone: None,
            parent: None,
            local_position: Vec3::ZERO,
            local_rotation: Quat::IDENTITY,
        });

        // BONE_PARENTS is not topologically sorted, so place nodes first and link after.
        for bone in Bone::iter().filter(|b| !b.is_excluded()) {
            self.index[bone as usize] = Some(self.nodes.len());
            self.nodes.push(BoneNode {
                bone: Some(bone),
                parent: None,
                local_position: avatar.rest_position(bone).unwrap_or(Vec3::ZERO),
                local_rotation: Quat::IDENTITY,
            });
        }
        for node in self.nodes.iter_mut().skip(1) {
            node.parent = match node.bone.and_then(Bone::parent) {
                Some(parent) => self.index[parent as usize],
                None => Some(ROOT),
            };
        }

        log::debug!(
            "VMCP: built skeleton for {} ({} bones)",
            avatar.name,
            self.nodes.len() - 1
        );
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index = [None; Bone::COUNT];
        self.hips_local_position = Vec3::ZERO;
        self.hips_local_rotation = Quat::IDENTITY;
        self.root_position = Vec3::ZERO;
        self.root_rotation = Quat::IDENTITY;
    }

    pub fn set_local_pose(&mut self, bone: Bone, position: Vec3, rotation: Quat) {
        if bone.is_excluded() {
            return;
        }
        self.generate_hierarchy();

        if bone == Bone::Hips {
            self.hips_local_position = position;
            self.hips_local_rotation = rotation;
            return;
        }

        let has_rest_pose = self
            .avatar
            .as_ref()
            .is_some_and(|a| a.rest_pose.is_some());
        let Some(node) = self.index[bone as usize].and_then(|i| self.nodes.get_mut(i)) else {
            return;
        };
        node.local_rotation = rotation;
        if !has_rest_pose {
            node.local_position = position;
        }
    }

    pub fn set_root_pose(&mut self, position: Vec3, rotation: Quat) {
        self.root_position = position;
        self.root_rotation = rotation;
    }

    pub fn root_pose(&self) -> (Vec3, Quat) {
        (self.root_position, self.root_rotation)
    }

    #[allow(unused)]
    pub fn hips_local_position(&self) -> Vec3 {
        self.hips_local_position
    }

    pub fn hips_local_rotation(&self) -> Quat {
        self.hips_local_rotation
    }

    fn world(&self, mut idx: usize) -> Affine3A {
        let mut acc = Affine3A::IDENTITY;
        loop {
            let node = &self.nodes[idx];
            acc = node.local() * acc;
            match node.parent {
                Some(parent) => idx = parent,
                None => return acc,
            }
        }
    }

    fn node_of(&self, bone: Bone) -> Option<usize> {
        self.index[bone as usize]
    }

    /// Tree-space rotation of `bone`; identity when unbuilt or excluded.
    #[allow(unused)]
    pub fn rotation(&self, bone: Bone) -> Quat {
        let Some(idx) = self.node_of(bone) else {
            return Quat::IDENTITY;
        };
        let (_, rotation, _) = self.world(idx).to_scale_rotation_translation();
        rotation
    }

    #[allow(unused)]
    pub fn local_rotation(&self, bone: Bone) -> Quat {
        self.node_of(bone)
            .map(|i| self.nodes[i].local_rotation)
            .unwrap_or(Quat::IDENTITY)
    }

    #[allow(unused)]
    pub fn local_position(&self, bone: Bone) -> Vec3 {
        self.node_of(bone)
            .map(|i| self.nodes[i].local_position)
            .unwrap_or(Vec3::ZERO)
    }

    pub fn head_pose_relative_to_hips(&self) -> (Vec3, Quat) {
        let (Some(hips), Some(head)) = (self.node_of(Bone::Hips), self.node_of(Bone::Head)) else {
            return (Vec3::ZERO, Quat::IDENTITY);
        };
        let relative = self.world(hips).inverse() * self.world(head);
        let (_, rotation, translation) = relative.to_scale_rotation_translation();
        (translation, rotation)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, f32::consts::FRAC_PI_2};

    use super::*;

    fn avatar_with_rest_pose() -> Arc<AvatarRig> {
        let rest_pose: HashMap<Bone, Vec3> = [
            (Bone::Spine, Vec3::new(0., 0.1, 0.)),
            (Bone::Chest, Vec3::new(0., 0.1, 0.)),
            (Bone::UpperChest, Vec3::new(0., 0.1, 0.)),
            (Bone::Neck, Vec3::new(0., 0.1, 0.)),
            (Bone::Head, Vec3::new(0., 0.1, 0.)),
            (Bone::LeftUpperArm, Vec3::new(0.1, 0., 0.)),
            (Bone::RightUpperArm, Vec3::new(-0.1, 0., 0.)),
        ]
        .into_iter()
        .collect();
        Arc::new(AvatarRig {
            name: "test".into(),
            rest_pose: Some(rest_pose),
            blendshape_keys: vec![],
        })
    }

    #[test]
    fn test_unbuilt_returns_identity() {
        let mut skel = SkeletonReconstructor::new();
        skel.set_local_pose(Bone::Head, Vec3::ONE, Quat::from_rotation_y(1.0));
        assert!(!skel.is_built());
        assert_eq!(skel.rotation(Bone::Head), Quat::IDENTITY);
        assert_eq!(skel.head_pose_relative_to_hips(), (Vec3::ZERO, Quat::IDENTITY));
    }

    #[test]
    fn test_built_lazily_without_eyes_or_jaw() {
        let mut skel = SkeletonReconstructor::new();
        skel.set_avatar(Some(avatar_with_rest_pose()));
        assert!(!skel.is_built());
        skel.set_local_pose(Bone::Neck, Vec3::ZERO, Quat::IDENTITY);
        assert!(skel.is_built());
        assert_eq!(skel.nodes.len(), 1 + Bone::COUNT - 3);
        assert!(skel.node_of(Bone::Jaw).is_none());
    }

    fn descends_from(bone: Bone, ancestor: Bone) -> bool {
        let mut current = Some(bone);
        while let Some(b) = current {
            if b == ancestor {
                return true;
            }
            current = b.parent();
        }
        false
    }

    #[test]
    fn test_bone_isolation() {
        let mut skel = SkeletonReconstructor::new();
        skel.set_avatar(Some(avatar_with_rest_pose()));
        let q = Quat::from_rotation_z(FRAC_PI_2);
        skel.set_local_pose(Bone::RightUpperArm, Vec3::ZERO, q);

        for bone in Bone::iter() {
            let expected_local = if bone == Bone::RightUpperArm {
                q
            } else {
                Quat::IDENTITY
            };
            assert!(
                skel.local_rotation(bone).abs_diff_eq(expected_local, 1e-6),
                "{:?} local rotation changed",
                bone
            );

            let expected_world = if !bone.is_excluded() && descends_from(bone, Bone::RightUpperArm) {
                q
            } else {
                Quat::IDENTITY
            };
            assert!(
                skel.rotation(bone).abs_diff_eq(expected_world, 1e-6),
                "{:?} world rotation {:?}",
                bone,
                skel.rotation(bone)
            );
        }
    }

    #[test]
    fn test_hips_pose_kept_outside_tree() {
        let mut skel = SkeletonReconstructor::new();
        skel.set_avatar(Some(avatar_with_rest_pose()));
        skel.generate_hierarchy();
        let before: Vec<Vec3> = Bone::iter().map(|b| skel.local_position(b)).collect();

        let hips = Vec3::new(0.1, 0.9, -0.2);
        let turn = Quat::from_rotation_y(0.5);
        skel.set_local_pose(Bone::Hips, hips, turn);

        assert_eq!(skel.hips_local_position(), hips);
        assert_eq!(skel.hips_local_rotation(), turn);
        for (bone, rest) in Bone::iter().zip(before) {
            assert_eq!(skel.local_position(bone), rest, "{:?} moved", bone);
            assert_eq!(skel.local_rotation(bone), Quat::IDENTITY, "{:?} turned", bone);
            assert!(skel.rotation(bone).abs_diff_eq(Quat::IDENTITY, 1e-6));
        }
        assert_eq!(skel.local_position(Bone::Spine), Vec3::new(0., 0.1, 0.));
    }

    #[test]
    fn test_rest_pose_overrides_wire_position() {
        let mut skel = SkeletonReconstructor::new();
        skel.set_avatar(Some(avatar_with_rest_pose()));
        skel.set_local_pose(Bone::Neck, Vec3::new(5., 5., 5.), Quat::IDENTITY);
        assert_eq!(skel.local_position(Bone::Neck), Vec3::new(0., 0.1, 0.));

        skel.set_avatar(Some(Arc::new(AvatarRig::default())));
        skel.set_local_pose(Bone::Neck, Vec3::new(5., 5., 5.), Quat::IDENTITY);
        assert_eq!(skel.local_position(Bone::Neck), Vec3::new(5., 5., 5.));
    }

    #[test]
    fn test_head_relative_to_hips() {
        let mut skel = SkeletonReconstructor::new();
        skel.set_avatar(Some(avatar_with_rest_pose()));
        let tilt = Quat::from_rotation_x(FRAC_PI_2);
        skel.set_local_pose(Bone::Neck, Vec3::ZERO, tilt);

        let (position, rotation) = skel.head_pose_relative_to_hips();
        // spine, chest and upper chest stack 0.3 up; the neck turns its 0.1 head offset onto +z
        assert!(position.abs_diff_eq(Vec3::new(0., 0.4, 0.1), 1e-5));
        assert!(rotation.abs_diff_eq(tilt, 1e-5));
    }

    #[test]
    fn test_clear_on_unload() {
        let mut skel = SkeletonReconstructor::new();
        skel.set_avatar(Some(avatar_with_rest_pose()));
        skel.set_local_pose(Bone::Head, Vec3::ZERO, Quat::from_rotation_y(1.0));
        skel.set_avatar(None);
        assert!(!skel.is_built());
        skel.set_local_pose(Bone::Head, Vec3::ZERO, Quat::from_rotation_y(1.0));
        assert!(!skel.is_built());
        assert_eq!(skel.rotation(Bone::Head), Quat::IDENTITY);
    }
}
