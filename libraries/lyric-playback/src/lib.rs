//! LyricEase - Playback Engine
//!
//! Playback queue and crossfade scheduler for the LyricEase player.
//!
//! This crate provides:
//! - Playback order generation (sequential and shuffled)
//! - Queue model with an up-next override queue
//! - Previous/current/next node slots over a pluggable audio backend
//! - Lookahead prefetching of the next track, with bounded retries
//! - Gain-automated crossfades between consecutive tracks
//! - Transport facade, events and OS transport-controls bridge
//!
//! # Architecture
//!
//! `lyric-playback` never decodes audio. The platform provides an
//! [`AudioBackend`] that turns a track's [`MediaSource`](lyric_core::MediaSource)
//! into a controllable node; the engine decides what plays when and drives
//! node gains during crossfades.
//!
//! # Example: Queue Model
//!
//! ```rust
//! use lyric_core::{LocalTrack, PlaybackMode, TrackId};
//! use lyric_playback::PlaybackQueue;
//! use std::path::PathBuf;
//! use std::time::Duration;
//!
//! let tracks = (1..=3)
//!     .map(|id| {
//!         LocalTrack::new(id, format!("Track {}", id), Duration::from_secs(200), PathBuf::from("/music"))
//!             .into_ref()
//!     })
//!     .collect();
//!
//! let mut queue = PlaybackQueue::new(PlaybackMode::RepeatAll);
//! queue.load(tracks, Some(TrackId::new(2)));
//!
//! let upcoming: Vec<u64> = queue.ordered_playback_list(100).map(|t| t.id().get()).collect();
//! assert_eq!(upcoming, vec![3, 1]);
//! ```
//!
//! # Example: Engine
//!
//! ```rust,no_run
//! use lyric_core::{MemorySettingsStore, PlaybackSource, PlayerSettings};
//! use lyric_playback::{EngineConfig, PlaybackEngine, PlayerEvent};
//! use std::sync::Arc;
//! # fn platform_backend() -> Arc<dyn lyric_playback::AudioBackend> { unimplemented!() }
//! # fn album_tracks() -> Vec<lyric_core::TrackRef> { unimplemented!() }
//!
//! # async fn run() -> lyric_playback::Result<()> {
//! let settings = Arc::new(MemorySettingsStore::new(PlayerSettings::default()));
//! let engine = PlaybackEngine::new(platform_backend(), settings, EngineConfig::default());
//! engine.initialize().await?;
//!
//! let mut events = engine.subscribe();
//! engine
//!     .play_collection(album_tracks(), None, PlaybackSource::Single)
//!     .await?;
//!
//! while let Ok(event) = events.recv().await {
//!     if let PlayerEvent::CurrentItemChanged { track } = event {
//!         println!("Now playing {}", track.title());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod controls;
pub mod crossfade;
mod engine;
mod error;
pub mod events;
mod lookahead;
mod node;
pub mod queue;
pub mod sequencer;
pub mod types;

// Public exports
pub use backend::{AudioBackend, AudioGraph, NodeHandle, OutputSink};
pub use controls::{
    handle_command, spawn_command_listener, spawn_controls_bridge, DisplayInfo, TransportCommand,
    TransportControls,
};
pub use engine::{PlaybackEngine, WeakPlaybackEngine};
pub use error::{PlaybackError, Result};
pub use events::PlayerEvent;
pub use queue::{PlaybackQueue, QueuePosition, DEFAULT_ORDERED_LIST_LIMIT};
pub use types::{EngineConfig, EngineStatus, NodeStatus};
