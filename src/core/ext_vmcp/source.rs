use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter, IntoEnumIterator};

pub const SLOT_COUNT: usize = 3;

const DEFAULT_PORTS: [u16; SLOT_COUNT] = [39539, 39540, 39541];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum DataCategory {
    HeadPose,
    HandPose,
    LowerBodyPose,
    Facial,
}

/// One configured sender. Rebuilt whenever the user edits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmcpSource {
    pub name: String,
    pub port: u16,
    pub receive_head_pose: bool,
    pub receive_hand_pose: bool,
    pub receive_lower_body_pose: bool,
    pub receive_facial: bool,
}

impl Default for VmcpSource {
    fn default() -> Self {
        Self {
            name: String::new(),
            port: DEFAULT_PORTS[0],
            receive_head_pose: false,
            receive_hand_pose: false,
            receive_lower_body_pose: false,
            receive_facial: false,
        }
    }
}

impl VmcpSource {
    pub fn wants(&self, category: DataCategory) -> bool {
        match category {
            DataCategory::HeadPose => self.receive_head_pose,
            DataCategory::HandPose => self.receive_hand_pose,
            DataCategory::LowerBodyPose => self.receive_lower_body_pose,
            DataCategory::Facial => self.receive_facial,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.port != 0 && DataCategory::iter().any(|c| self.wants(c))
    }
}

/// Categories a slot was actually granted after arbitration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataPassSettings {
    pub head_pose: bool,
    pub hand_pose: bool,
    pub lower_body_pose: bool,
    pub facial: bool,
}

impl DataPassSettings {
    pub const NONE: Self = Self {
        head_pose: false,
        hand_pose: false,
        lower_body_pose: false,
        facial: false,
    };

    pub fn allows(&self, category: DataCategory) -> bool {
        match category {
            DataCategory::HeadPose => self.head_pose,
            DataCategory::HandPose => self.hand_pose,
            DataCategory::LowerBodyPose => self.lower_body_pose,
            DataCategory::Facial => self.facial,
        }
    }

    fn grant(&mut self, category: DataCategory) {
        match category {
            DataCategory::HeadPose => self.head_pose = true,
            DataCategory::HandPose => self.hand_pose = true,
            DataCategory::LowerBodyPose => self.lower_body_pose = true,
            DataCategory::Facial => self.facial = true,
        }
    }

    pub fn any(&self) -> bool {
        DataCategory::iter().any(|c| self.allows(c))
    }
}

/// Grants each category to the first valid source requesting it, in slot order.
/// `None` marks a disabled slot.
pub fn arbitrate<'a>(
    sources: impl IntoIterator<Item = Option<&'a VmcpSource>>,
) -> Vec<DataPassSettings> {
    let mut taken = [false; DataCategory::COUNT];
    sources
        .into_iter()
        .map(|source| {
            let mut settings = DataPassSettings::NONE;
            let Some(source) = source.filter(|s| s.is_valid()) else {
                return settings;
            };
            for category in DataCategory::iter() {
                if source.wants(category) && !taken[category as usize] {
                    taken[category as usize] = true;
                    settings.grant(category);
                }
            }
            settings
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmcpSlotConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub source: VmcpSource,
}

impl Default for VmcpSlotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            source: VmcpSource::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmcpConfig {
    pub active: bool,
    pub slots: [VmcpSlotConfig; SLOT_COUNT],
}

impl Default for VmcpConfig {
    fn default() -> Self {
        Self {
            active: false,
            slots: std::array::from_fn(|i| VmcpSlotConfig {
                enabled: false,
                source: VmcpSource {
                    name: format!("Source {}", i + 1),
                    port: DEFAULT_PORTS[i],
                    ..Default::default()
                },
            }),
        }
    }
}

impl VmcpConfig {
    /// Slot `i`'s source if it should be listened to at all.
    pub fn effective_source(&self, slot: usize) -> Option<&VmcpSource> {
        let cfg = self.slots.get(slot)?;
        (self.active && cfg.enabled && cfg.source.is_valid()).then_some(&cfg.source)
    }

    pub fn arbitrate(&self) -> Vec<DataPassSettings> {
        arbitrate((0..SLOT_COUNT).map(|i| self.effective_source(i)))
    }
}
