use std::{
    sync::{mpsc::Receiver, Arc},
    thread,
    time::{Duration, Instant},
};

use indicatif::MultiProgress;

use self::{
    avatar::AvatarRig, config::PoseMgrConfig, ext_facecap::ExtFaceCapture, ext_vmcp::ExtVmcp,
    status::StatusBar,
};

pub mod arkit;
pub mod avatar;
pub mod config;
pub mod ext_facecap;
pub mod ext_vmcp;
pub mod folders;
pub mod status;

const MAX_DELTA_T: f32 = 0.25;

pub struct AppState {
    pub status: StatusBar,
    pub delta_t: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Calibrate,
    Quit,
}

pub struct PoseMgr {
    config: PoseMgrConfig,
    state: AppState,
    pub face: ExtFaceCapture,
    pub vmcp: ExtVmcp,
}

impl PoseMgr {
    pub fn new(config: PoseMgrConfig, multi: &MultiProgress) -> Self {
        let face = ExtFaceCapture::new(
            config.face_port,
            config.face_apply_rate,
            config::load_calibration(),
        );
        Self {
            state: AppState {
                status: StatusBar::new(multi),
                delta_t: 0.,
            },
            face,
            vmcp: ExtVmcp::new(),
            config,
        }
    }

    pub fn set_avatar(&mut self, avatar: Option<Arc<AvatarRig>>) {
        match avatar.as_ref() {
            Some(avatar) => log::info!("Avatar loaded: {}", avatar.name),
            None => log::info!("Avatar unloaded"),
        }
        self.vmcp.set_avatar(avatar);
    }

    fn calibrate(&mut self) {
        let offset = self.face.calibrate();
        if let Err(e) = config::save_calibration(&offset) {
            log::warn!("{:#}", e);
        }
    }

    fn tick(&mut self) {
        self.state.status.trip_fps_counter();
        self.state.delta_t = self.state.status.last_frame_time.min(MAX_DELTA_T);

        self.face.step(&mut self.state);
        self.vmcp.step(&mut self.state);

        self.state.status.recv_summary();
        self.state.status.display();
    }

    /// Runs the fixed-rate tick loop until `Command::Quit` arrives.
    pub fn run(&mut self, commands: Receiver<Command>) -> anyhow::Result<()> {
        self.face.start()?;
        self.set_avatar(self.config.avatar.clone().map(Arc::new));
        self.vmcp.apply_config(self.config.vmcp.clone());

        let interval = Duration::from_secs_f32(1. / self.config.tick_hz as f32);
        log::info!("Ticking at {} Hz", self.config.tick_hz);

        let mut next_tick = Instant::now();
        'main: loop {
            for command in commands.try_iter() {
                match command {
                    Command::Calibrate => self.calibrate(),
                    Command::Quit => break 'main,
                }
            }

            self.tick();

            next_tick += interval;
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else {
                next_tick = now;
            }
        }

        log::info!("Shutting down");
        self.face.stop();
        self.vmcp.stop();
        Ok(())
    }
}
