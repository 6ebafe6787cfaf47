use std::sync::Arc;

use colored::{Color, Colorize};
use glam::EulerRot;
use once_cell::sync::Lazy;

use self::{
    calibration::CalibrationOffset,
    receiver::{FaceCaptureReceiver, ReceiverState},
    tracking::{FaceCaptureState, FaceSnapshot, PayloadStatus, SIGNAL_LOST_MESSAGE},
};

use super::AppState;

pub mod calibration;
pub mod decoder;
pub mod receiver;
pub mod tracking;

static STA_ON: Lazy<Arc<str>> = Lazy::new(|| format!("{}", "FACE".color(Color::Green)).into());
static STA_PROBE: Lazy<Arc<str>> =
    Lazy::new(|| format!("{}", "FACE".color(Color::Yellow)).into());
static STA_OFF: Lazy<Arc<str>> = Lazy::new(|| format!("{}", "FACE".color(Color::Red)).into());
static STA_LOST: Lazy<Arc<str>> =
    Lazy::new(|| format!("{}", SIGNAL_LOST_MESSAGE.color(Color::BrightYellow)).into());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceCaptureStatus {
    Stopped,
    Probing,
    Connected,
    SignalLost,
}

/// Face-capture peripheral: UDP receive thread plus the tick-side pose state.
pub struct ExtFaceCapture {
    receiver: FaceCaptureReceiver,
    pub tracking: FaceCaptureState,
}

impl ExtFaceCapture {
    pub fn new(port: u16, apply_rate: f32, calibration: CalibrationOffset) -> Self {
        let mut tracking = FaceCaptureState::new(apply_rate);
        tracking.set_calibration(calibration);
        Self {
            receiver: FaceCaptureReceiver::new(port),
            tracking,
        }
    }

    pub fn start(&mut self) -> anyhow::Result<()> {
        self.receiver.start()
    }

    pub fn stop(&mut self) {
        self.receiver.stop();
    }

    pub fn tick(&mut self, delta_t: f32) -> PayloadStatus {
        self.tracking.update(self.receiver.take_latest(), delta_t)
    }

    pub fn step(&mut self, state: &mut AppState) {
        if self.tick(state.delta_t) == PayloadStatus::Updated {
            state.status.trip_recv_counter();
        }

        match self.status() {
            FaceCaptureStatus::Connected => {
                state.status.add_item(STA_ON.clone());
                let (yaw, pitch, _) = self.snapshot().head_rotation.to_euler(EulerRot::YXZ);
                state.status.add_item(
                    format!("YAW:{:.0}° PITCH:{:.0}°", yaw.to_degrees(), pitch.to_degrees())
                        .into(),
                );
            }
            FaceCaptureStatus::Probing => state.status.add_item(STA_PROBE.clone()),
            FaceCaptureStatus::Stopped => state.status.add_item(STA_OFF.clone()),
            FaceCaptureStatus::SignalLost => {
                state.status.add_item(STA_OFF.clone());
                state.status.add_item(STA_LOST.clone());
            }
        }
    }

    pub fn status(&self) -> FaceCaptureStatus {
        match self.receiver.state() {
            ReceiverState::Stopped => FaceCaptureStatus::Stopped,
            ReceiverState::Probing => FaceCaptureStatus::Probing,
            ReceiverState::Receiving if self.tracking.is_signal_lost() => {
                FaceCaptureStatus::SignalLost
            }
            ReceiverState::Receiving => FaceCaptureStatus::Connected,
        }
    }

    pub fn calibrate(&mut self) -> CalibrationOffset {
        self.tracking.calibrate()
    }

    pub fn snapshot(&self) -> FaceSnapshot {
        self.tracking.snapshot()
    }
}
