//! Core types for the playback engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remaining time on the current node below which the next node is prepared
pub const LOOKAHEAD_WINDOW: Duration = Duration::from_secs(60);

/// Delay between failed preparation attempts
pub const PREPARE_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Retries after the initial preparation attempt before giving up
pub const MAX_PREPARE_RETRIES: u32 = 3;

/// Tracks must be strictly longer than this to take part in a crossfade
pub const CROSSFADE_MIN_TRACK_LENGTH: Duration = Duration::from_secs(60);

/// A crossfade is not started with this much time or less left
pub const CROSSFADE_MIN_REMAINING: Duration = Duration::from_secs(3);

/// A user seek landing this close to the end suppresses the crossfade
pub const SEEK_INTERRUPT_WINDOW: Duration = Duration::from_secs(20);

/// Past this position, "previous" restarts the current track
pub const PREVIOUS_RESTART_THRESHOLD: Duration = Duration::from_secs(3);

/// Engine status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineStatus {
    /// No list loaded
    #[default]
    Stopped,

    /// List loaded, current node stopped
    Paused,

    /// List loaded, current node running
    Playing,
}

impl EngineStatus {
    /// Whether a list is loaded
    pub fn is_loaded(&self) -> bool {
        !matches!(self, Self::Stopped)
    }

    /// Whether audio is running
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }
}

/// Preparation status of the "next" node slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeStatus {
    /// Nothing prepared
    #[default]
    Unavailable,

    /// Creation in flight (or waiting for a retry)
    Preparing,

    /// Node ready in the next slot
    Available,

    /// Every attempt failed; stays until the queue changes or the track does
    Failed,
}

/// Engine tuning
///
/// These are runtime knobs, not user settings. User-facing preferences live
/// in [`lyric_core::PlayerSettings`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Period of the playback tick (default: 50ms)
    pub tick_interval: Duration,

    /// Period of the gain tick while crossfading (default: 10ms)
    pub fade_tick_interval: Duration,

    /// Capacity of the event channel (default: 256)
    pub event_capacity: usize,

    /// Spawn the tick tasks automatically (default: true)
    ///
    /// With this off, the host drives the engine through
    /// [`PlaybackEngine::tick`](crate::PlaybackEngine::tick) and
    /// [`PlaybackEngine::fade_tick`](crate::PlaybackEngine::fade_tick).
    pub auto_tick: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            fade_tick_interval: Duration::from_millis(10),
            event_capacity: 256,
            auto_tick: true,
        }
    }
}

impl EngineConfig {
    /// Config for hosts that tick the engine themselves
    pub fn manual() -> Self {
        Self {
            auto_tick: false,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_interval, Duration::from_millis(50));
        assert_eq!(config.fade_tick_interval, Duration::from_millis(10));
        assert!(config.auto_tick);
        assert!(!EngineConfig::manual().auto_tick);
    }

    #[test]
    fn status_helpers() {
        assert!(!EngineStatus::Stopped.is_loaded());
        assert!(EngineStatus::Paused.is_loaded());
        assert!(!EngineStatus::Paused.is_playing());
        assert!(EngineStatus::Playing.is_playing());
        assert_eq!(NodeStatus::default(), NodeStatus::Unavailable);
    }
}
