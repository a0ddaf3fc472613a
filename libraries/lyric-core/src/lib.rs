//! LyricEase Core
//!
//! Platform-agnostic domain types, settings and error handling shared by the
//! LyricEase crates.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: the [`Track`] capability trait, [`TrackId`],
//!   [`SoundQuality`], [`PlaybackMode`], [`PlaybackSource`]
//! - **Settings**: [`PlayerSettings`] and the [`SettingsStore`] trait with
//!   in-memory and JSON-file implementations
//! - **Error Handling**: unified [`CoreError`] and [`Result`] types
//!
//! # Example
//!
//! ```rust
//! use lyric_core::{LocalTrack, PlayerSettings, Track};
//! use std::path::PathBuf;
//! use std::time::Duration;
//!
//! let track = LocalTrack::new(1, "Intro", Duration::from_secs(95), PathBuf::from("/music/intro.flac"));
//! assert_eq!(track.duration(), Duration::from_secs(95));
//!
//! let settings = PlayerSettings::default();
//! assert!(settings.crossfading_enabled);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod settings;
pub mod types;

pub use error::{CoreError, Result};
pub use settings::{FileSettingsStore, MemorySettingsStore, PlayerSettings, SettingsStore};
pub use types::{
    LocalTrack, MediaSource, PlaybackMode, PlaybackSource, SoundQuality, Track, TrackId, TrackRef,
};
