use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::ext_vmcp::bones::Bone;

pub type RestPose = HashMap<Bone, Vec3>;

/// What the avatar loader hands us when a model becomes available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarRig {
    pub name: String,
    /// Local bone positions in the model's neutral pose, if the loader supplies them.
    #[serde(skip)]
    pub rest_pose: Option<RestPose>,
    /// Blendshape clip names defined by the model beyond the standard presets.
    pub blendshape_keys: Vec<String>,
}

impl AvatarRig {
    pub fn rest_position(&self, bone: Bone) -> Option<Vec3> {
        self.rest_pose.as_ref()?.get(&bone).copied()
    }
}
