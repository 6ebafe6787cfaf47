use std::{
    borrow::Cow,
    collections::{HashMap, HashSet},
    str::FromStr,
    sync::Arc,
};

use once_cell::sync::Lazy;
use strum::IntoEnumIterator;

use crate::core::arkit::ArkitChannel;

/// Distinct perfect-sync keys that mark a stream as carrying full facial data.
pub const PERFECT_SYNC_THRESHOLD: usize = 26;
pub const DISCONNECT_SECS: f32 = 1.0;

/// Expression presets, already in normalized (lower first letter) form.
const PRESET_KEYS: [&str; 18] = [
    "neutral",
    "aa",
    "ih",
    "ou",
    "ee",
    "oh",
    "blink",
    "blinkLeft",
    "blinkRight",
    "happy",
    "angry",
    "sad",
    "relaxed",
    "surprised",
    "lookUp",
    "lookDown",
    "lookLeft",
    "lookRight",
];

/// Older naming conventions mapped onto the keys above.
static LEGACY_ALIASES: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut aliases: HashMap<String, &'static str> = [
        ("a", "aa"),
        ("i", "ih"),
        ("u", "ou"),
        ("e", "ee"),
        ("o", "oh"),
        ("blink_L", "blinkLeft"),
        ("blink_R", "blinkRight"),
        ("joy", "happy"),
        ("sorrow", "sad"),
        ("fun", "relaxed"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to))
    .collect();

    for channel in ArkitChannel::iter() {
        if let Some(legacy) = channel.legacy_name() {
            aliases.insert(legacy, channel.as_str());
        }
    }
    aliases
});

fn normalize_key(raw: &str) -> Cow<'_, str> {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => {
            Cow::Owned(first.to_lowercase().chain(chars).collect())
        }
        _ => Cow::Borrowed(raw),
    }
}

/// Blendshape values received from the facial source, published on commit.
pub struct BlendshapeAggregator {
    vocabulary: HashSet<Arc<str>>,
    internal: HashMap<Arc<str>, f32>,
    published: HashMap<Arc<str>, f32>,
    seen_perfect_sync: HashSet<ArkitChannel>,
    perfect_sync: bool,
    countdown: f32,
    connected: bool,
    active: bool,
}

impl Default for BlendshapeAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl BlendshapeAggregator {
    pub fn new() -> Self {
        let mut me = Self {
            vocabulary: HashSet::new(),
            internal: HashMap::new(),
            published: HashMap::new(),
            seen_perfect_sync: HashSet::new(),
            perfect_sync: false,
            countdown: 0.,
            connected: false,
            active: true,
        };
        me.set_avatar_keys(&[]);
        me
    }

    /// Rebuilds the recognized vocabulary: standard keys plus the avatar's own clips.
    pub fn set_avatar_keys(&mut self, keys: &[String]) {
        self.vocabulary = ArkitChannel::iter()
            .map(|c| Arc::<str>::from(c.as_str()))
            .chain(PRESET_KEYS.iter().map(|k| Arc::<str>::from(*k)))
            .chain(keys.iter().map(|k| Arc::<str>::from(normalize_key(k).as_ref())))
            .collect();
        self.internal.retain(|k, _| self.vocabulary.contains(k));
        self.published.retain(|k, _| self.vocabulary.contains(k));
    }

    fn resolve(&self, raw_key: &str) -> Option<Arc<str>> {
        let key = normalize_key(raw_key);
        if let Some(found) = self.vocabulary.get(key.as_ref()) {
            return Some(found.clone());
        }
        let alias = LEGACY_ALIASES.get(key.as_ref())?;
        self.vocabulary.get(*alias).cloned()
    }

    pub fn set_value(&mut self, raw_key: &str, value: f32) {
        if !self.active {
            return;
        }
        let Some(key) = self.resolve(raw_key) else {
            log::trace!("VMCP: unknown blendshape {}", raw_key);
            return;
        };

        let value = if value.is_nan() { 0. } else { value.clamp(0., 1.) };
        self.countdown = DISCONNECT_SECS;
        self.connected = true;

        if !self.perfect_sync {
            if let Ok(channel) = ArkitChannel::from_str(&key) {
                self.seen_perfect_sync.insert(channel);
                if self.seen_perfect_sync.len() >= PERFECT_SYNC_THRESHOLD {
                    log::info!("VMCP: perfect sync blendshapes detected");
                    self.perfect_sync = true;
                    self.seen_perfect_sync.clear();
                }
            }
        }

        self.internal.insert(key, value);
    }

    /// Commit barrier: readers only ever see whole frames.
    pub fn apply(&mut self) {
        if !self.active {
            return;
        }
        self.published.clone_from(&self.internal);
    }

    pub fn update(&mut self, delta_t: f32) {
        if !self.active || !self.connected {
            return;
        }
        self.countdown -= delta_t;
        if self.countdown <= 0. {
            log::info!("VMCP: blendshape source timed out");
            self.reset();
        }
    }

    pub fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.active = active;
        if !active {
            self.reset();
        }
    }

    fn reset(&mut self) {
        self.internal.values_mut().for_each(|v| *v = 0.);
        self.published.values_mut().for_each(|v| *v = 0.);
        self.seen_perfect_sync.clear();
        self.perfect_sync = false;
        self.connected = false;
        self.countdown = 0.;
    }

    pub fn value(&self, key: &str) -> f32 {
        self.resolve(key)
            .and_then(|k| self.published.get(&k).copied())
            .unwrap_or(0.)
    }

    #[allow(unused)]
    pub fn published(&self) -> &HashMap<Arc<str>, f32> {
        &self.published
    }

    pub fn is_perfect_sync(&self) -> bool {
        self.perfect_sync
    }

    #[allow(unused)]
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}
