use std::{
    array,
    sync::{
        mpsc::{sync_channel, Receiver, SyncSender},
        Arc,
    },
    time::{Duration, Instant},
};

use colored::{Color, Colorize};
use glam::{EulerRot, Quat, Vec3};
use once_cell::sync::Lazy;
use strum::{EnumCount, IntoEnumIterator};

use self::{
    blendshape::BlendshapeAggregator,
    listener::{SlotMessage, VmcpListener},
    message::{Tracker, VmcpMessage},
    skeleton::SkeletonReconstructor,
    source::{DataPassSettings, VmcpConfig, SLOT_COUNT},
};

use super::{avatar::AvatarRig, AppState};

pub mod blendshape;
pub mod bones;
pub mod listener;
pub mod message;
pub mod skeleton;
pub mod source;

const CHANNEL_CAPACITY: usize = 1024;
const CONNECTED_WINDOW: Duration = Duration::from_secs(1);

static STA_ON: Lazy<[Arc<str>; SLOT_COUNT]> = Lazy::new(|| {
    array::from_fn(|i| format!("{}", format!("VMCP{}", i + 1).color(Color::Green)).into())
});
static STA_OFF: Lazy<[Arc<str>; SLOT_COUNT]> = Lazy::new(|| {
    array::from_fn(|i| format!("{}", format!("VMCP{}", i + 1).color(Color::Red)).into())
});
static STA_SYNC: Lazy<Arc<str>> =
    Lazy::new(|| format!("{}", "PERFECT-SYNC".color(Color::Cyan)).into());

/// Consumer-side state fed by every slot, gated by the arbitration result.
pub struct VmcpRouter {
    grants: [DataPassSettings; SLOT_COUNT],
    pub blendshapes: BlendshapeAggregator,
    pub skeleton: SkeletonReconstructor,
    trackers: [Option<(Vec3, Quat)>; Tracker::COUNT],
    last_received: [Option<Instant>; SLOT_COUNT],
}

impl Default for VmcpRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl VmcpRouter {
    pub fn new() -> Self {
        let mut me = Self {
            grants: [DataPassSettings::NONE; SLOT_COUNT],
            blendshapes: BlendshapeAggregator::new(),
            skeleton: SkeletonReconstructor::new(),
            trackers: [None; Tracker::COUNT],
            last_received: [None; SLOT_COUNT],
        };
        me.blendshapes.set_active(false);
        me
    }

    pub fn apply_grants(&mut self, grants: &[DataPassSettings]) {
        let previous_owner = self.facial_owner();
        for (slot, granted) in self.grants.iter_mut().enumerate() {
            *granted = grants.get(slot).copied().unwrap_or(DataPassSettings::NONE);
        }

        let owner = self.facial_owner();
        if owner != previous_owner {
            // a new owner starts from neutral, not from the old source's frame
            self.blendshapes.set_active(false);
        }
        self.blendshapes.set_active(owner.is_some());
    }

    fn facial_owner(&self) -> Option<usize> {
        self.grants.iter().position(|g| g.facial)
    }

    pub fn grants(&self, slot: usize) -> DataPassSettings {
        self.grants
            .get(slot)
            .copied()
            .unwrap_or(DataPassSettings::NONE)
    }

    /// Returns whether the message was routed.
    pub fn handle(&mut self, slot: usize, message: VmcpMessage) -> bool {
        let category = message.category();
        if !self.grants(slot).allows(category) {
            return false;
        }
        self.last_received[slot] = Some(Instant::now());

        match message {
            VmcpMessage::RootPose { position, rotation } => {
                self.skeleton.set_root_pose(position, rotation)
            }
            VmcpMessage::BonePose {
                bone,
                position,
                rotation,
            } => self.skeleton.set_local_pose(bone, position, rotation),
            VmcpMessage::TrackerPose {
                tracker,
                position,
                rotation,
            } => self.trackers[tracker as usize] = Some((position, rotation)),
            VmcpMessage::BlendshapeValue { key, value } => self.blendshapes.set_value(&key, value),
            VmcpMessage::BlendshapeApply => self.blendshapes.apply(),
        }
        true
    }

    pub fn update(&mut self, delta_t: f32) {
        self.blendshapes.update(delta_t);
    }

    pub fn set_avatar(&mut self, avatar: Option<Arc<AvatarRig>>) {
        let keys = avatar
            .as_ref()
            .map(|a| a.blendshape_keys.as_slice())
            .unwrap_or_default();
        self.blendshapes.set_avatar_keys(keys);
        self.skeleton.set_avatar(avatar);
    }

    pub fn tracker(&self, tracker: Tracker) -> Option<(Vec3, Quat)> {
        self.trackers[tracker as usize]
    }

    pub fn tracked_count(&self) -> usize {
        Tracker::iter().filter(|t| self.tracker(*t).is_some()).count()
    }

    /// Yaw in degrees of the hips in world space and of the head relative to the hips.
    pub fn body_yaw(&self) -> (f32, f32) {
        let (_, root) = self.skeleton.root_pose();
        let hips = root * self.skeleton.hips_local_rotation();
        let (_, head) = self.skeleton.head_pose_relative_to_hips();
        let yaw = |q: Quat| q.to_euler(EulerRot::YXZ).0.to_degrees();
        (yaw(hips), yaw(head))
    }

    pub fn is_connected(&self, slot: usize) -> bool {
        self.last_received
            .get(slot)
            .copied()
            .flatten()
            .is_some_and(|t| t.elapsed() < CONNECTED_WINDOW)
    }
}

/// VMC protocol intake: up to three listeners arbitrated over four data categories.
pub struct ExtVmcp {
    listeners: [Option<VmcpListener>; SLOT_COUNT],
    sender: SyncSender<SlotMessage>,
    receiver: Receiver<SlotMessage>,
    pub router: VmcpRouter,
}

impl ExtVmcp {
    pub fn new() -> Self {
        let (sender, receiver) = sync_channel(CHANNEL_CAPACITY);
        Self {
            listeners: array::from_fn(|_| None),
            sender,
            receiver,
            router: VmcpRouter::new(),
        }
    }

    /// Re-arbitrates and restarts only the slots whose listening port changed.
    pub fn apply_config(&mut self, config: VmcpConfig) {
        for slot in 0..SLOT_COUNT {
            let wanted = config.effective_source(slot).map(|s| s.port);
            let running = self.listeners[slot].as_ref().map(VmcpListener::port);
            if wanted == running {
                continue;
            }

            if let Some(mut listener) = self.listeners[slot].take() {
                listener.stop();
            }
            if let Some(port) = wanted {
                match VmcpListener::start(slot, port, self.sender.clone()) {
                    Ok(listener) => self.listeners[slot] = Some(listener),
                    Err(e) => log::warn!("{:#}", e),
                }
            }
        }

        let grants = config.arbitrate();
        for (slot, granted) in grants.iter().enumerate() {
            log::debug!("VMCP{}: granted {:?}", slot + 1, granted);
        }
        self.router.apply_grants(&grants);
    }

    pub fn set_avatar(&mut self, avatar: Option<Arc<AvatarRig>>) {
        self.router.set_avatar(avatar);
    }

    pub fn step(&mut self, state: &mut AppState) {
        for SlotMessage { slot, message } in self.receiver.try_iter() {
            if self.router.handle(slot, message) {
                state.status.trip_recv_counter();
            }
        }
        self.router.update(state.delta_t);

        for slot in 0..SLOT_COUNT {
            if self.listeners[slot].is_none() {
                continue;
            }
            if self.router.is_connected(slot) {
                state.status.add_item(STA_ON[slot].clone());
            } else {
                state.status.add_item(STA_OFF[slot].clone());
            }
        }
        if self.router.blendshapes.is_perfect_sync() {
            state.status.add_item(STA_SYNC.clone());
        }
        if self.router.skeleton.is_built() {
            let (hips, head) = self.router.body_yaw();
            state
                .status
                .add_item(format!("HIPS:{:.0}° HEAD:{:.0}°", hips, head).into());
        }
        let trackers = self.router.tracked_count();
        if trackers > 0 {
            state.status.add_item(format!("TRK:{}", trackers).into());
        }
    }

    pub fn stop(&mut self) {
        for listener in self.listeners.iter_mut() {
            if let Some(mut listener) = listener.take() {
                listener.stop();
            }
        }
    }
}

impl Default for ExtVmcp {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, net::UdpSocket, thread};

    use rosc::{OscMessage, OscPacket, OscType};

    use super::{bones::Bone, source::VmcpSource, *};
    use crate::core::arkit::ArkitChannel;

    fn facial_only() -> DataPassSettings {
        DataPassSettings {
            facial: true,
            ..DataPassSettings::NONE
        }
    }

    fn rigged_avatar() -> Arc<AvatarRig> {
        Arc::new(AvatarRig {
            name: "rig".into(),
            rest_pose: Some(HashMap::new()),
            blendshape_keys: vec![],
        })
    }

    #[test]
    fn test_message_needs_granted_category() {
        let mut router = VmcpRouter::new();
        router.set_avatar(Some(rigged_avatar()));
        router.apply_grants(&[facial_only(), DataPassSettings::NONE, DataPassSettings::NONE]);

        let bone = VmcpMessage::BonePose {
            bone: Bone::Head,
            position: Vec3::ZERO,
            rotation: Quat::from_rotation_y(1.0),
        };
        assert!(!router.handle(0, bone));
        assert!(!router.skeleton.is_built());
        assert!(!router.is_connected(0));

        let value = VmcpMessage::BlendshapeValue {
            key: "Joy".into(),
            value: 1.0,
        };
        assert!(!router.handle(1, value.clone()));
        assert!(router.handle(0, value));
        assert!(router.handle(0, VmcpMessage::BlendshapeApply));
        assert_eq!(router.blendshapes.value("happy"), 1.0);
        assert!(router.is_connected(0));
        assert!(!router.is_connected(1));
    }

    #[test]
    fn test_categories_split_across_slots() {
        let mut router = VmcpRouter::new();
        router.set_avatar(Some(rigged_avatar()));
        let head_and_hands = DataPassSettings {
            head_pose: true,
            hand_pose: true,
            ..DataPassSettings::NONE
        };
        let lower_body = DataPassSettings {
            lower_body_pose: true,
            ..DataPassSettings::NONE
        };
        router.apply_grants(&[head_and_hands, lower_body]);

        let arm = Quat::from_rotation_z(0.5);
        assert!(router.handle(
            0,
            VmcpMessage::BonePose {
                bone: Bone::RightUpperArm,
                position: Vec3::ZERO,
                rotation: arm,
            }
        ));
        assert!(!router.handle(
            0,
            VmcpMessage::BonePose {
                bone: Bone::Hips,
                position: Vec3::ONE,
                rotation: Quat::IDENTITY,
            }
        ));
        assert!(router.handle(
            1,
            VmcpMessage::RootPose {
                position: Vec3::X,
                rotation: Quat::IDENTITY,
            }
        ));
        assert!(router.handle(
            0,
            VmcpMessage::TrackerPose {
                tracker: Tracker::LeftHand,
                position: Vec3::Y,
                rotation: Quat::IDENTITY,
            }
        ));

        assert!(router
            .skeleton
            .local_rotation(Bone::RightUpperArm)
            .abs_diff_eq(arm, 1e-6));
        assert_eq!(router.skeleton.hips_local_position(), Vec3::ZERO);
        assert_eq!(router.skeleton.root_pose().0, Vec3::X);
        assert_eq!(router.tracker(Tracker::LeftHand).map(|t| t.0), Some(Vec3::Y));
        assert_eq!(router.tracker(Tracker::Head), None);
    }

    #[test]
    fn test_losing_facial_grant_resets_blendshapes() {
        let mut router = VmcpRouter::new();
        router.apply_grants(&[facial_only()]);
        router.handle(
            0,
            VmcpMessage::BlendshapeValue {
                key: "A".into(),
                value: 0.8,
            },
        );
        router.handle(0, VmcpMessage::BlendshapeApply);
        assert_eq!(router.blendshapes.value("aa"), 0.8);

        router.apply_grants(&[DataPassSettings::NONE]);
        assert_eq!(router.blendshapes.value("aa"), 0.0);
    }

    #[test]
    fn test_facial_handover_starts_from_neutral() {
        let mut router = VmcpRouter::new();
        router.apply_grants(&[facial_only(), DataPassSettings::NONE]);
        for channel in ArkitChannel::iter().take(30) {
            router.handle(
                0,
                VmcpMessage::BlendshapeValue {
                    key: channel.as_str().into(),
                    value: 0.9,
                },
            );
        }
        router.handle(0, VmcpMessage::BlendshapeApply);
        assert!(router.blendshapes.is_perfect_sync());

        router.apply_grants(&[DataPassSettings::NONE, facial_only()]);
        assert!(!router.handle(
            0,
            VmcpMessage::BlendshapeValue {
                key: "eyeBlinkLeft".into(),
                value: 0.9,
            }
        ));
        router.handle(
            1,
            VmcpMessage::BlendshapeValue {
                key: "A".into(),
                value: 0.5,
            },
        );
        router.handle(1, VmcpMessage::BlendshapeApply);

        assert!(!router.blendshapes.is_perfect_sync());
        assert_eq!(router.blendshapes.value("eyeBlinkLeft"), 0.0);
        assert_eq!(router.blendshapes.value("aa"), 0.5);

        // same owner re-applied keeps its state
        router.apply_grants(&[DataPassSettings::NONE, facial_only()]);
        assert_eq!(router.blendshapes.value("aa"), 0.5);
    }

    #[test]
    fn test_body_yaw_and_tracker_count() {
        let mut router = VmcpRouter::new();
        router.set_avatar(Some(rigged_avatar()));
        let everything = DataPassSettings {
            head_pose: true,
            hand_pose: true,
            lower_body_pose: true,
            facial: false,
        };
        router.apply_grants(&[everything]);
        assert_eq!(router.tracked_count(), 0);

        router.handle(
            0,
            VmcpMessage::RootPose {
                position: Vec3::ZERO,
                rotation: Quat::from_rotation_y(30f32.to_radians()),
            },
        );
        router.handle(
            0,
            VmcpMessage::BonePose {
                bone: Bone::Hips,
                position: Vec3::ZERO,
                rotation: Quat::from_rotation_y(15f32.to_radians()),
            },
        );
        router.handle(
            0,
            VmcpMessage::BonePose {
                bone: Bone::Neck,
                position: Vec3::ZERO,
                rotation: Quat::from_rotation_y(-20f32.to_radians()),
            },
        );
        router.handle(
            0,
            VmcpMessage::TrackerPose {
                tracker: Tracker::Head,
                position: Vec3::Y,
                rotation: Quat::IDENTITY,
            },
        );

        let (hips, head) = router.body_yaw();
        assert!((hips - 45.).abs() < 1e-3, "hips yaw {}", hips);
        assert!((head + 20.).abs() < 1e-3, "head yaw {}", head);
        assert_eq!(router.tracked_count(), 1);
    }

    #[test]
    fn test_config_starts_and_restarts_listeners() {
        let mut vmcp = ExtVmcp::new();
        let mut config = VmcpConfig {
            active: true,
            ..Default::default()
        };
        config.slots[1].enabled = true;
        config.slots[1].source = VmcpSource {
            name: "face".into(),
            port: 49_801,
            receive_facial: true,
            ..Default::default()
        };
        vmcp.apply_config(config.clone());
        assert!(vmcp.listeners[0].is_none());
        assert_eq!(vmcp.listeners[1].as_ref().map(|l| l.port()), Some(49_801));
        assert!(vmcp.router.grants(1).facial);

        config.slots[1].source.port = 49_802;
        vmcp.apply_config(config.clone());
        assert_eq!(vmcp.listeners[1].as_ref().map(|l| l.port()), Some(49_802));

        let packet = OscPacket::Message(OscMessage {
            addr: "/VMC/Ext/Blend/Val".into(),
            args: vec![OscType::String("JawOpen".into()), OscType::Float(0.4)],
        });
        let apply = OscPacket::Message(OscMessage {
            addr: "/VMC/Ext/Blend/Apply".into(),
            args: vec![],
        });
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        for packet in [packet, apply] {
            let buf = rosc::encoder::encode(&packet).unwrap();
            socket.send_to(&buf, ("127.0.0.1", 49_802)).unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(3);
        while vmcp.router.blendshapes.value("jawOpen") == 0. && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
            for SlotMessage { slot, message } in vmcp.receiver.try_iter() {
                vmcp.router.handle(slot, message);
            }
        }
        assert_eq!(vmcp.router.blendshapes.value("jawOpen"), 0.4);

        config.active = false;
        vmcp.apply_config(config);
        assert!(vmcp.listeners.iter().all(Option::is_none));
        assert!(!vmcp.router.grants(1).facial);
    }
}
