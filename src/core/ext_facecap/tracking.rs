use glam::{Quat, Vec3};
use strum::EnumCount;

use crate::core::arkit::ArkitChannel;

use super::{
    calibration::{CalibrationOffset, SmoothedCalibration},
    decoder::{decode_capture_payload, euler_degrees_to_quat, CaptureChannelSet},
};

/// No fresh data for this long means the peripheral paused or lost the face.
const SIGNAL_LOSS_SECS: f32 = 1.0;
/// Rate at which published values relax back to neutral after signal loss.
const RELAX_SPEED: f32 = 3.0;

pub const SIGNAL_LOST_MESSAGE: &str = "capture device paused / signal lost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStatus {
    NoNewPayload,
    /// Same bytes as the previous payload: sender alive, tracking not updating.
    Stalled,
    Malformed,
    Updated,
}

#[allow(unused)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceSnapshot {
    pub channels: [f32; ArkitChannel::COUNT],
    /// Relative to the smoothed calibration offset.
    pub head_rotation: Quat,
    /// Relative to the smoothed calibration offset.
    pub head_position: Vec3,
    pub has_valid_position: bool,
    pub left_eye: Quat,
    pub right_eye: Quat,
}

impl FaceSnapshot {
    #[inline(always)]
    pub fn channel(&self, channel: ArkitChannel) -> f32 {
        self.channels[channel as usize]
    }
}

pub struct FaceCaptureState {
    raw: CaptureChannelSet,
    last_payload: Option<String>,
    apply_rate: f32,

    channels: [f32; ArkitChannel::COUNT],
    head_rotation: Quat,
    head_position: Vec3,
    eyes: [Quat; 2],

    calibration: SmoothedCalibration,
    since_update: f32,
    connected: bool,
    signal_lost: bool,
}

impl FaceCaptureState {
    pub fn new(apply_rate: f32) -> Self {
        Self {
            raw: CaptureChannelSet::default(),
            last_payload: None,
            apply_rate: apply_rate.clamp(0.01, 1.0),
            channels: [0.0; ArkitChannel::COUNT],
            head_rotation: Quat::IDENTITY,
            head_position: Vec3::ZERO,
            eyes: [Quat::IDENTITY; 2],
            calibration: SmoothedCalibration::new(CalibrationOffset::IDENTITY),
            since_update: 0.,
            connected: false,
            signal_lost: false,
        }
    }

    /// One consumer tick. `payload` is whatever the receiver handed over since the last tick.
    pub fn update(&mut self, payload: Option<String>, delta_t: f32) -> PayloadStatus {
        self.calibration.update(delta_t);

        let status = match payload {
            None => PayloadStatus::NoNewPayload,
            Some(payload) if self.last_payload.as_deref() == Some(payload.as_str()) => {
                PayloadStatus::Stalled
            }
            Some(payload) => {
                let applied = decode_capture_payload(&payload, &mut self.raw);
                self.last_payload = Some(payload);
                if applied {
                    PayloadStatus::Updated
                } else {
                    PayloadStatus::Malformed
                }
            }
        };

        if status == PayloadStatus::Updated {
            if self.signal_lost {
                log::info!("Face capture signal restored");
            }
            self.since_update = 0.;
            self.connected = true;
            self.signal_lost = false;
            self.apply(self.apply_rate);
        } else {
            self.since_update += delta_t;
            if self.connected && self.since_update > SIGNAL_LOSS_SECS {
                if !self.signal_lost {
                    log::warn!("Face capture: {}", SIGNAL_LOST_MESSAGE);
                    self.signal_lost = true;
                }
                self.relax(delta_t);
            }
        }

        status
    }

    fn apply(&mut self, t: f32) {
        for (value, target) in self.channels.iter_mut().zip(self.raw.values()) {
            *value += (target - *value) * t;
        }
        self.head_rotation = self
            .head_rotation
            .slerp(euler_degrees_to_quat(self.raw.head_rotation), t);
        if self.raw.has_valid_position {
            self.head_position = self.head_position.lerp(self.raw.head_position, t);
        }
        self.eyes[0] = self.eyes[0].slerp(euler_degrees_to_quat(self.raw.left_eye), t);
        self.eyes[1] = self.eyes[1].slerp(euler_degrees_to_quat(self.raw.right_eye), t);
    }

    /// Eases published values toward neutral: channels to 0, head to the calibrated pose.
    fn relax(&mut self, delta_t: f32) {
        let t = 1. - (-RELAX_SPEED * delta_t).exp();
        for value in self.channels.iter_mut() {
            *value -= *value * t;
        }
        self.head_rotation = self.head_rotation.slerp(self.calibration.rotation(), t);
        self.head_position = self.head_position.lerp(self.calibration.position(), t);
        self.eyes[0] = self.eyes[0].slerp(Quat::IDENTITY, t);
        self.eyes[1] = self.eyes[1].slerp(Quat::IDENTITY, t);
    }

    /// Takes the current raw head pose as the new neutral.
    pub fn calibrate(&mut self) -> CalibrationOffset {
        let offset = CalibrationOffset {
            rotation: self.raw.head_rotation,
            position: if self.raw.has_valid_position {
                self.raw.head_position
            } else {
                Vec3::ZERO
            },
        };
        log::info!(
            "Face capture calibrated: rot {:?} pos {:?}",
            offset.rotation,
            offset.position
        );
        self.calibration.set_target(offset);
        offset
    }

    /// Restores a persisted offset without animating.
    pub fn set_calibration(&mut self, offset: CalibrationOffset) {
        self.calibration.set_immediate(offset);
    }

    #[allow(unused)]
    pub fn calibration(&self) -> CalibrationOffset {
        self.calibration.target()
    }

    pub fn head_rotation(&self) -> Quat {
        (self.calibration.rotation().inverse() * self.head_rotation).normalize()
    }

    pub fn head_position(&self) -> Vec3 {
        self.head_position - self.calibration.position()
    }

    pub fn snapshot(&self) -> FaceSnapshot {
        FaceSnapshot {
            channels: self.channels,
            head_rotation: self.head_rotation(),
            head_position: self.head_position(),
            has_valid_position: self.raw.has_valid_position,
            left_eye: self.eyes[0],
            right_eye: self.eyes[1],
        }
    }

    #[allow(unused)]
    pub fn is_connected(&self) -> bool {
        self.connected && !self.signal_lost
    }

    pub fn is_signal_lost(&self) -> bool {
        self.signal_lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: f32 = 1. / 60.;

    #[test]
    fn test_stall_distinct_from_no_payload() {
        let mut state = FaceCaptureState::new(1.0);
        assert_eq!(state.update(None, FRAME), PayloadStatus::NoNewPayload);

        let payload = "jawOpen-50|=head#0,10,0|".to_string();
        assert_eq!(
            state.update(Some(payload.clone()), FRAME),
            PayloadStatus::Updated
        );
        assert_eq!(state.update(Some(payload), FRAME), PayloadStatus::Stalled);
        assert_eq!(state.update(None, FRAME), PayloadStatus::NoNewPayload);
        assert_eq!(
            state.update(Some("jawOpen-60|=head#0,10,0|".into()), FRAME),
            PayloadStatus::Updated
        );
    }

    #[test]
    fn test_malformed_payload() {
        let mut state = FaceCaptureState::new(1.0);
        assert_eq!(
            state.update(Some("jawOpen-50|".into()), FRAME),
            PayloadStatus::Malformed
        );
        assert_eq!(state.snapshot().channel(ArkitChannel::JawOpen), 0.0);
        assert!(!state.is_connected());
    }

    #[test]
    fn test_apply_rate_one_is_immediate() {
        let mut state = FaceCaptureState::new(1.0);
        state.update(Some("jawOpen-80|=head#0,30,0|".into()), FRAME);
        let snap = state.snapshot();
        assert!((snap.channel(ArkitChannel::JawOpen) - 0.8).abs() < 1e-6);
        assert!(snap
            .head_rotation
            .abs_diff_eq(euler_degrees_to_quat(Vec3::new(0., 30., 0.)), 1e-5));
    }

    #[test]
    fn test_partial_apply_rate_interpolates() {
        let mut state = FaceCaptureState::new(0.5);
        state.update(Some("jawOpen-100|=".into()), FRAME);
        assert!((state.snapshot().channel(ArkitChannel::JawOpen) - 0.5).abs() < 1e-6);
        state.update(Some("jawOpen-100|=head#0,0,0|".into()), FRAME);
        assert!((state.snapshot().channel(ArkitChannel::JawOpen) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_signal_loss_relaxes_to_neutral() {
        let mut state = FaceCaptureState::new(1.0);
        let payload = "jawOpen-100|eyeBlink_L-100|=head#10,20,5,0.1,0.2,0.3|".to_string();
        state.update(Some(payload.clone()), FRAME);
        assert!(state.is_connected());

        // sender keeps repeating the same frame, then goes quiet
        for _ in 0..30 {
            state.update(Some(payload.clone()), FRAME);
        }
        for _ in 0..300 {
            state.update(None, FRAME);
        }

        assert!(state.is_signal_lost());
        assert!(!state.is_connected());
        let snap = state.snapshot();
        assert!(snap.channel(ArkitChannel::JawOpen) < 0.01);
        assert!(snap.channel(ArkitChannel::EyeBlinkLeft) < 0.01);
        assert!(snap.head_rotation.abs_diff_eq(Quat::IDENTITY, 1e-3));
        assert!(snap.head_position.length() < 1e-2);

        state.update(Some("jawOpen-40|=head#0,0,0|".into()), FRAME);
        assert!(state.is_connected());
        assert!((state.snapshot().channel(ArkitChannel::JawOpen) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_calibration_transitions_without_jump() {
        let mut state = FaceCaptureState::new(1.0);
        state.update(Some("=head#0,30,0,0,0,0.5|".into()), FRAME);
        let before = state.head_rotation();

        let offset = state.calibrate();
        assert_eq!(offset.rotation, Vec3::new(0., 30., 0.));
        assert_eq!(offset.position, Vec3::new(0., 0., 0.5));

        // nothing moves until the transition advances
        assert!(state.head_rotation().abs_diff_eq(before, 1e-6));

        for _ in 0..45 {
            state.update(None, FRAME);
        }
        assert!(state.head_rotation().abs_diff_eq(Quat::IDENTITY, 1e-4));
        assert!(state.head_position().length() < 1e-5);
        assert_eq!(state.calibration(), offset);
    }

    #[test]
    fn test_restored_calibration_is_immediate() {
        let mut state = FaceCaptureState::new(1.0);
        let offset = CalibrationOffset {
            rotation: Vec3::new(0., 30., 0.),
            position: Vec3::ZERO,
        };
        state.set_calibration(offset);
        state.update(Some("=head#0,30,0|".into()), FRAME);
        assert!(state.head_rotation().abs_diff_eq(Quat::IDENTITY, 1e-5));
    }
}
