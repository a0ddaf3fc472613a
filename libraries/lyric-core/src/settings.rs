//! Persisted player settings
//!
//! The playback engine reads these on every decision that depends on them, so
//! a change made through a [`SettingsStore`] takes effect on the next tick.

use crate::error::{CoreError, Result};
use crate::types::{PlaybackMode, SoundQuality};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

/// Longest crossfade the player accepts, in seconds
pub const MAX_CROSSFADE_SECONDS: u32 = 30;

/// User-facing playback settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlayerSettings {
    /// Master volume (0.0 - 1.0)
    #[serde(default = "default_volume")]
    pub volume: f64,

    /// Quality requested when resolving track sources
    #[serde(default)]
    pub sound_quality: SoundQuality,

    /// When enabled, "previous" always switches track instead of restarting
    #[serde(default)]
    pub direct_switch_enabled: bool,

    /// Whether consecutive tracks overlap with a gain crossfade
    #[serde(default = "default_crossfading_enabled")]
    pub crossfading_enabled: bool,

    /// Configured crossfade length in seconds
    #[serde(default = "default_crossfading_length_seconds")]
    pub crossfading_length_seconds: u32,

    /// Playback mode restored on startup
    #[serde(default)]
    pub playback_mode: PlaybackMode,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            sound_quality: SoundQuality::default(),
            direct_switch_enabled: false,
            crossfading_enabled: default_crossfading_enabled(),
            crossfading_length_seconds: default_crossfading_length_seconds(),
            playback_mode: PlaybackMode::default(),
        }
    }
}

impl PlayerSettings {
    /// Load settings from an optional JSON file and the environment
    ///
    /// Environment variables are prefixed with `LYRIC_`, for example
    /// `LYRIC_CROSSFADING_LENGTH_SECONDS=8`, and win over the file. Missing
    /// keys fall back to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let environment = config::Environment::with_prefix("LYRIC").try_parsing(true);
        Self::build(path, Some(environment))
    }

    /// Load settings from a JSON file alone, ignoring the environment
    ///
    /// A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::build(Some(path), None)
    }

    fn build(path: Option<&Path>, environment: Option<config::Environment>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        if let Some(environment) = environment {
            builder = builder.add_source(environment);
        }

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate value ranges
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(CoreError::invalid_input(format!(
                "volume must be within 0.0..=1.0, got {}",
                self.volume
            )));
        }

        if self.crossfading_length_seconds == 0
            || self.crossfading_length_seconds > MAX_CROSSFADE_SECONDS
        {
            return Err(CoreError::invalid_input(format!(
                "crossfading length must be within 1..={} seconds, got {}",
                MAX_CROSSFADE_SECONDS, self.crossfading_length_seconds
            )));
        }

        Ok(())
    }

    /// Configured crossfade length as a duration
    pub fn crossfading_length(&self) -> Duration {
        Duration::from_secs(u64::from(self.crossfading_length_seconds))
    }
}

fn default_volume() -> f64 {
    1.0
}

fn default_crossfading_enabled() -> bool {
    true
}

fn default_crossfading_length_seconds() -> u32 {
    6
}

/// Read/write access to persisted settings
pub trait SettingsStore: Send + Sync + fmt::Debug {
    /// Current settings (defaults when nothing was stored)
    fn load(&self) -> PlayerSettings;

    /// Persist settings
    fn save(&self, settings: &PlayerSettings) -> Result<()>;
}

impl dyn SettingsStore {
    /// Read-modify-write helper
    ///
    /// The modified settings are validated before they are saved.
    pub fn update(&self, change: impl FnOnce(&mut PlayerSettings)) -> Result<PlayerSettings> {
        let mut settings = self.load();
        change(&mut settings);
        settings.validate()?;
        self.save(&settings)?;
        Ok(settings)
    }
}

/// In-memory settings, for tests and embedders that persist elsewhere
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: RwLock<PlayerSettings>,
}

impl MemorySettingsStore {
    /// Create a store holding the given settings
    pub fn new(settings: PlayerSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> PlayerSettings {
        match self.settings.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn save(&self, settings: &PlayerSettings) -> Result<()> {
        match self.settings.write() {
            Ok(mut guard) => *guard = settings.clone(),
            Err(poisoned) => *poisoned.into_inner() = settings.clone(),
        }
        Ok(())
    }
}

/// Settings persisted as a JSON file
///
/// The file is read once on open; reads are served from memory and every
/// save writes through to disk. Environment overrides are never read here,
/// so they cannot leak into the file.
#[derive(Debug)]
pub struct FileSettingsStore {
    path: PathBuf,
    cached: MemorySettingsStore,
}

impl FileSettingsStore {
    /// Open (or lazily create) the settings file at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = PlayerSettings::from_file(&path)?;

        Ok(Self {
            path,
            cached: MemorySettingsStore::new(settings),
        })
    }

    /// Location of the settings file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> PlayerSettings {
        self.cached.load()
    }

    fn save(&self, settings: &PlayerSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, json)?;
        self.cached.save(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn default_settings() {
        let settings = PlayerSettings::default();
        assert_eq!(settings.volume, 1.0);
        assert_eq!(settings.sound_quality, SoundQuality::High);
        assert!(!settings.direct_switch_enabled);
        assert!(settings.crossfading_enabled);
        assert_eq!(settings.crossfading_length_seconds, 6);
        assert_eq!(settings.playback_mode, PlaybackMode::RepeatAll);
        assert_eq!(settings.crossfading_length(), Duration::from_secs(6));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let settings: PlayerSettings = serde_json::from_str(r#"{"volume": 0.25}"#).unwrap();
        assert_eq!(settings.volume, 0.25);
        assert!(settings.crossfading_enabled);
        assert_eq!(settings.crossfading_length_seconds, 6);
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let loud = PlayerSettings {
            volume: 1.5,
            ..Default::default()
        };
        assert!(loud.validate().is_err());

        let endless = PlayerSettings {
            crossfading_length_seconds: MAX_CROSSFADE_SECONDS + 1,
            ..Default::default()
        };
        assert!(endless.validate().is_err());

        let zero = PlayerSettings {
            crossfading_length_seconds: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn update_through_trait_object() {
        let store: Arc<dyn SettingsStore> = Arc::new(MemorySettingsStore::default());

        let updated = store
            .update(|s| s.playback_mode = PlaybackMode::Shuffle)
            .unwrap();

        assert_eq!(updated.playback_mode, PlaybackMode::Shuffle);
        assert_eq!(store.load().playback_mode, PlaybackMode::Shuffle);
    }

    #[test]
    fn update_refuses_invalid_changes() {
        let store: Arc<dyn SettingsStore> = Arc::new(MemorySettingsStore::default());

        assert!(store.update(|s| s.volume = -0.1).is_err());
        assert_eq!(store.load().volume, 1.0);
    }

    #[test]
    fn file_store_loads_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::open(dir.path().join("settings.json")).unwrap();

        assert_eq!(store.load(), PlayerSettings::default());
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = FileSettingsStore::open(&path).unwrap();
        let settings = PlayerSettings {
            volume: 0.5,
            crossfading_length_seconds: 10,
            playback_mode: PlaybackMode::Shuffle,
            ..Default::default()
        };
        store.save(&settings).unwrap();

        let reopened = FileSettingsStore::open(&path).unwrap();
        assert_eq!(reopened.load(), settings);
    }

    #[test]
    fn environment_overrides_stay_out_of_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::env::set_var("LYRIC_CROSSFADING_LENGTH_SECONDS", "9");

        let merged = PlayerSettings::load(Some(&path));
        let store = FileSettingsStore::open(&path);
        std::env::remove_var("LYRIC_CROSSFADING_LENGTH_SECONDS");

        assert_eq!(merged.unwrap().crossfading_length_seconds, 9);
        let store = store.unwrap();
        assert_eq!(store.load().crossfading_length_seconds, 6);

        let quieter = PlayerSettings {
            volume: 0.5,
            ..store.load()
        };
        store.save(&quieter).unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        let written: PlayerSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(written.crossfading_length_seconds, 6);
        assert_eq!(written.volume, 0.5);
    }
}
