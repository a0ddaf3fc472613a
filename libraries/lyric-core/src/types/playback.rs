/// Playback-related enums shared between settings and the engine
use serde::{Deserialize, Serialize};

/// Requested decode quality for a track's audio source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundQuality {
    Normal,
    #[default]
    High,
    #[serde(rename = "very_high")]
    VeryHigh,
    Lossless,
}

impl SoundQuality {
    /// Convert to string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::VeryHigh => "very_high",
            Self::Lossless => "lossless",
        }
    }
}

impl std::fmt::Display for SoundQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Playback mode
///
/// `RepeatAll` is the sequential mode: the list plays in source order and
/// wraps around. `Shuffle` plays a random permutation and wraps around too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    #[default]
    RepeatAll,
    RepeatOne,
    Shuffle,
}

impl PlaybackMode {
    /// Convert to string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RepeatAll => "repeat_all",
            Self::RepeatOne => "repeat_one",
            Self::Shuffle => "shuffle",
        }
    }

    /// Parse from string
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "repeat_all" => Some(Self::RepeatAll),
            "repeat_one" => Some(Self::RepeatOne),
            "shuffle" => Some(Self::Shuffle),
            _ => None,
        }
    }

    /// Whether this mode plays a shuffled permutation
    #[must_use]
    pub fn is_shuffle(&self) -> bool {
        matches!(self, Self::Shuffle)
    }
}

impl std::fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Context a collection was started from
///
/// Recorded by the engine when a collection starts playing so the UI can
/// link back to it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlaybackSource {
    /// Tracks from a playlist
    Playlist { id: u64, name: String },

    /// Tracks from an album
    Album { id: u64, name: String },

    /// Tracks from an artist page
    Artist { id: u64, name: String },

    /// Search results or any ad-hoc selection
    #[default]
    Single,
}
