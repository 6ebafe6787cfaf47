use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::decoder::euler_degrees_to_quat;

const TRANSITION_SECS: f32 = 0.5;

/// The user's neutral head pose in sensor space.
/// Persisted as six floats: rotation (Euler degrees) then position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 6]", into = "[f32; 6]")]
pub struct CalibrationOffset {
    pub rotation: Vec3,
    pub position: Vec3,
}

impl CalibrationOffset {
    pub const IDENTITY: Self = Self {
        rotation: Vec3::ZERO,
        position: Vec3::ZERO,
    };

    pub fn rotation_quat(&self) -> Quat {
        euler_degrees_to_quat(self.rotation)
    }
}

impl Default for CalibrationOffset {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<[f32; 6]> for CalibrationOffset {
    fn from(v: [f32; 6]) -> Self {
        Self {
            rotation: Vec3::new(v[0], v[1], v[2]),
            position: Vec3::new(v[3], v[4], v[5]),
        }
    }
}

impl From<CalibrationOffset> for [f32; 6] {
    fn from(o: CalibrationOffset) -> Self {
        [
            o.rotation.x,
            o.rotation.y,
            o.rotation.z,
            o.position.x,
            o.position.y,
            o.position.z,
        ]
    }
}

/// Raw offset plus a copy that eases toward it whenever the raw one changes.
#[derive(Debug, Clone)]
pub struct SmoothedCalibration {
    target: CalibrationOffset,
    from_rotation: Quat,
    from_position: Vec3,
    rotation: Quat,
    position: Vec3,
    elapsed: f32,
}

impl SmoothedCalibration {
    pub fn new(offset: CalibrationOffset) -> Self {
        let rotation = offset.rotation_quat();
        Self {
            target: offset,
            from_rotation: rotation,
            from_position: offset.position,
            rotation,
            position: offset.position,
            elapsed: TRANSITION_SECS,
        }
    }

    /// Starts a transition from the current smoothed pose toward `offset`.
    pub fn set_target(&mut self, offset: CalibrationOffset) {
        self.from_rotation = self.rotation;
        self.from_position = self.position;
        self.target = offset;
        self.elapsed = 0.;
    }

    pub fn set_immediate(&mut self, offset: CalibrationOffset) {
        *self = Self::new(offset);
    }

    pub fn update(&mut self, delta_t: f32) {
        if self.is_settled() {
            return;
        }
        self.elapsed = (self.elapsed + delta_t).min(TRANSITION_SECS);
        let t = ease_out_cubic(self.elapsed / TRANSITION_SECS);
        self.rotation = self.from_rotation.slerp(self.target.rotation_quat(), t);
        self.position = self.from_position.lerp(self.target.position, t);
    }

    pub fn is_settled(&self) -> bool {
        self.elapsed >= TRANSITION_SECS
    }

    pub fn target(&self) -> CalibrationOffset {
        self.target
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }
}

#[inline(always)]
fn ease_out_cubic(t: f32) -> f32 {
    let inv = 1. - t.clamp(0., 1.);
    1. - inv * inv * inv
}
