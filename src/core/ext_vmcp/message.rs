use std::str::FromStr;

use glam::{Quat, Vec3};
use rosc::{OscMessage, OscPacket, OscType};
use strum::{EnumCount, EnumIter, EnumString, IntoStaticStr};

use super::{bones::Bone, source::DataCategory};

const ROOT_POS: &str = "/VMC/Ext/Root/Pos";
const BONE_POS: &str = "/VMC/Ext/Bone/Pos";
const TRACKER_POS: &str = "/VMC/Ext/Tra/Pos";
const HMD_POS: &str = "/VMC/Ext/Hmd/Pos";
const CONTROLLER_POS: &str = "/VMC/Ext/Con/Pos";
const BLEND_VAL: &str = "/VMC/Ext/Blend/Val";
const BLEND_APPLY: &str = "/VMC/Ext/Blend/Apply";

#[repr(usize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumCount, EnumString, IntoStaticStr)]
pub enum Tracker {
    Head,
    LeftHand,
    RightHand,
}

impl Tracker {
    pub fn category(self) -> DataCategory {
        match self {
            Tracker::Head => DataCategory::HeadPose,
            Tracker::LeftHand | Tracker::RightHand => DataCategory::HandPose,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VmcpMessage {
    RootPose {
        position: Vec3,
        rotation: Quat,
    },
    BonePose {
        bone: Bone,
        position: Vec3,
        rotation: Quat,
    },
    TrackerPose {
        tracker: Tracker,
        position: Vec3,
        rotation: Quat,
    },
    BlendshapeValue {
        key: String,
        value: f32,
    },
    BlendshapeApply,
}

impl VmcpMessage {
    pub fn category(&self) -> DataCategory {
        match self {
            VmcpMessage::RootPose { .. } => DataCategory::LowerBodyPose,
            VmcpMessage::BonePose { bone, .. } => bone.category(),
            VmcpMessage::TrackerPose { tracker, .. } => tracker.category(),
            VmcpMessage::BlendshapeValue { .. } | VmcpMessage::BlendshapeApply => {
                DataCategory::Facial
            }
        }
    }

    /// Classifies one OSC message by address. Anything unrecognized or short is `None`.
    pub fn classify(message: OscMessage) -> Option<Self> {
        match message.addr.as_str() {
            ROOT_POS => {
                let (_, position, rotation) = parse_pose(&message.args)?;
                Some(VmcpMessage::RootPose { position, rotation })
            }
            BONE_POS => {
                let (name, position, rotation) = parse_pose(&message.args)?;
                Some(VmcpMessage::BonePose {
                    bone: Bone::from_str(name).ok()?,
                    position,
                    rotation,
                })
            }
            TRACKER_POS | HMD_POS | CONTROLLER_POS => {
                let (name, position, rotation) = parse_pose(&message.args)?;
                Some(VmcpMessage::TrackerPose {
                    tracker: Tracker::from_str(name).ok()?,
                    position,
                    rotation,
                })
            }
            BLEND_VAL => {
                let mut args = message.args.into_iter();
                match (args.next(), args.next()) {
                    (Some(OscType::String(key)), Some(OscType::Float(value))) => {
                        Some(VmcpMessage::BlendshapeValue { key, value })
                    }
                    _ => None,
                }
            }
            BLEND_APPLY => Some(VmcpMessage::BlendshapeApply),
            _ => None,
        }
    }
}

fn parse_pose(args: &[OscType]) -> Option<(&str, Vec3, Quat)> {
    let [OscType::String(name), OscType::Float(px), OscType::Float(py), OscType::Float(pz), OscType::Float(qx), OscType::Float(qy), OscType::Float(qz), OscType::Float(qw), ..] =
        args
    else {
        return None;
    };

    let rotation = Quat::from_xyzw(*qx, *qy, *qz, *qw);
    let rotation = if rotation.is_finite() && rotation.length_squared() > 1e-6 {
        rotation.normalize()
    } else {
        Quat::IDENTITY
    };
    Some((name.as_str(), Vec3::new(*px, *py, *pz), rotation))
}

/// Decodes a datagram and appends every recognized message, flattening bundles.
pub fn decode_datagram(buf: &[u8], out: &mut Vec<VmcpMessage>) {
    match rosc::decoder::decode_udp(buf) {
        Ok((_, packet)) => flatten_packet(packet, out),
        Err(e) => log::trace!("VMCP: undecodable datagram: {:?}", e),
    }
}

fn flatten_packet(packet: OscPacket, out: &mut Vec<VmcpMessage>) {
    match packet {
        OscPacket::Message(message) => out.extend(VmcpMessage::classify(message)),
        OscPacket::Bundle(bundle) => {
            for packet in bundle.content {
                flatten_packet(packet, out);
            }
        }
    }
}
