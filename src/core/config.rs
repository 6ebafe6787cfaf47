use std::{
    env,
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::{
    avatar::AvatarRig,
    ext_facecap::{calibration::CalibrationOffset, receiver::DEFAULT_PORT},
    ext_vmcp::source::VmcpConfig,
    folders::CONFIG_DIR,
};

const CONFIG_FILE: &str = "posemgr.json";
const CALIBRATION_FILE: &str = "calibration.json";

macro_rules! env_parse {
    ($x:expr) => {
        env::var($x).ok().and_then(|s| s.parse().ok())
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseMgrConfig {
    pub face_port: u16,
    pub face_apply_rate: f32,
    pub tick_hz: u32,
    pub vmcp: VmcpConfig,
    /// Avatar to drive at startup; `null` leaves the skeleton unbuilt.
    pub avatar: Option<AvatarRig>,
}

impl Default for PoseMgrConfig {
    fn default() -> Self {
        Self {
            face_port: DEFAULT_PORT,
            face_apply_rate: 1.0,
            tick_hz: 60,
            vmcp: VmcpConfig::default(),
            avatar: Some(AvatarRig {
                name: "default".into(),
                ..Default::default()
            }),
        }
    }
}

fn config_path(file: &str) -> PathBuf {
    Path::new(CONFIG_DIR.as_ref()).join(file)
}

impl PoseMgrConfig {
    /// Reads the config file, falling back to defaults, then applies env overrides.
    pub fn load() -> Self {
        let path = config_path(CONFIG_FILE);
        let mut config = if path.exists() {
            Self::load_from(&path).unwrap_or_else(|e| {
                log::warn!("{:#}; using defaults", e);
                Self::default()
            })
        } else {
            log::info!("No config at {}, using defaults", path.display());
            Self::default()
        };

        if let Some(port) = env_parse!("FACE_PORT") {
            config.face_port = port;
        }
        if let Some(hz) = env_parse!("TICK_HZ") {
            config.tick_hz = hz;
        }
        config.tick_hz = config.tick_hz.max(1);
        config
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Could not open {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Could not parse {}", path.display()))
    }
}

pub fn load_calibration() -> CalibrationOffset {
    let path = config_path(CALIBRATION_FILE);
    if !path.exists() {
        return CalibrationOffset::IDENTITY;
    }
    load_calibration_from(&path).unwrap_or_else(|e| {
        log::warn!("{:#}", e);
        CalibrationOffset::IDENTITY
    })
}

pub fn load_calibration_from(path: &Path) -> anyhow::Result<CalibrationOffset> {
    let file = File::open(path).with_context(|| format!("Could not open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Could not parse {}", path.display()))
}

pub fn save_calibration(offset: &CalibrationOffset) -> anyhow::Result<()> {
    save_calibration_to(&config_path(CALIBRATION_FILE), offset)
}

pub fn save_calibration_to(path: &Path, offset: &CalibrationOffset) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = File::create(path).with_context(|| format!("Could not write {}", path.display()))?;
    serde_json::to_writer(file, offset)?;
    log::info!("Saved calibration to {}", path.display());
    Ok(())
}
