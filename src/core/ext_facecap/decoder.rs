use std::borrow::Cow;

use glam::{EulerRot, Quat, Vec3};
use strum::EnumCount;

use crate::core::arkit::ArkitChannel;

const HEAD_LABEL: &str = "head";
const LEFT_EYE_LABEL: &str = "leftEye";
const RIGHT_EYE_LABEL: &str = "rightEye";

/// Every channel the peripheral can report, plus the head and eye transforms.
/// Rotations are Euler degrees as sent on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureChannelSet {
    values: [f32; ArkitChannel::COUNT],
    pub head_rotation: Vec3,
    pub head_position: Vec3,
    pub has_valid_position: bool,
    pub left_eye: Vec3,
    pub right_eye: Vec3,
}

impl Default for CaptureChannelSet {
    fn default() -> Self {
        Self {
            values: [0.0; ArkitChannel::COUNT],
            head_rotation: Vec3::ZERO,
            head_position: Vec3::ZERO,
            has_valid_position: false,
            left_eye: Vec3::ZERO,
            right_eye: Vec3::ZERO,
        }
    }
}

impl CaptureChannelSet {
    #[inline(always)]
    pub fn get(&self, channel: ArkitChannel) -> f32 {
        self.values[channel as usize]
    }

    #[inline(always)]
    pub fn set(&mut self, channel: ArkitChannel, value: f32) {
        self.values[channel as usize] = value;
    }

    pub fn values(&self) -> &[f32; ArkitChannel::COUNT] {
        &self.values
    }
}

/// Euler degrees as sent by the peripheral (pitch, yaw, roll) to a rotation.
pub fn euler_degrees_to_quat(euler: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        euler.y.to_radians(),
        euler.x.to_radians(),
        euler.z.to_radians(),
    )
}

/// Decodes one capture payload into `out`.
///
/// Returns false, leaving `out` untouched, unless the payload has exactly one
/// `=`. Fields that fail to parse keep their previous value.
pub fn decode_capture_payload(payload: &str, out: &mut CaptureChannelSet) -> bool {
    let payload: Cow<str> = if payload.contains(char::is_whitespace) {
        Cow::Owned(payload.chars().filter(|c| !c.is_whitespace()).collect())
    } else {
        Cow::Borrowed(payload)
    };

    let mut halves = payload.split('=');
    let (Some(channels), Some(transforms), None) = (halves.next(), halves.next(), halves.next())
    else {
        return false;
    };

    for field in channels.split('|') {
        decode_channel(field, out);
    }
    for section in transforms.split('|') {
        decode_transform(section, out);
    }
    true
}

fn decode_channel(field: &str, out: &mut CaptureChannelSet) {
    let Some((name, value)) = field.split_once('-') else {
        return;
    };
    let Some(channel) = ArkitChannel::from_wire_name(name) else {
        return;
    };
    let Ok(value) = value.parse::<i32>() else {
        return;
    };
    out.set(channel, (value as f32 / 100.).clamp(0., 1.));
}

fn decode_transform(section: &str, out: &mut CaptureChannelSet) {
    let Some((label, csv)) = section.split_once('#') else {
        return;
    };

    let mut floats = [0f32; 6];
    let Some(count) = parse_floats(csv, &mut floats) else {
        return;
    };

    match (label, count) {
        (HEAD_LABEL, 3) => {
            out.head_rotation = Vec3::new(floats[0], floats[1], floats[2]);
            out.has_valid_position = false;
        }
        (HEAD_LABEL, 6) => {
            out.head_rotation = Vec3::new(floats[0], floats[1], floats[2]);
            out.head_position = Vec3::new(floats[3], floats[4], floats[5]);
            out.has_valid_position = true;
        }
        (LEFT_EYE_LABEL, 3) => out.left_eye = Vec3::new(floats[0], floats[1], floats[2]),
        (RIGHT_EYE_LABEL, 3) => out.right_eye = Vec3::new(floats[0], floats[1], floats[2]),
        _ => {}
    }
}

fn parse_floats(csv: &str, out: &mut [f32; 6]) -> Option<usize> {
    let mut count = 0;
    for item in csv.split(',') {
        let slot = out.get_mut(count)?;
        *slot = item.parse::<f32>().ok().filter(|f| f.is_finite())?;
        count += 1;
    }
    Some(count)
}
