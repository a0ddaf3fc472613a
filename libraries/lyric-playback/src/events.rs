//! Playback events
//!
//! Events are published on a broadcast channel. Subscribers that fall behind
//! lose the oldest events rather than slowing the engine down.
//!
//! Within one logical transition a status change is always published before
//! the queue update.

use lyric_core::{PlaybackMode, TrackRef};
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::trace;

/// Events emitted by the engine
#[derive(Clone)]
pub enum PlayerEvent {
    /// Playback started or stopped
    StatusChanged {
        /// Whether audio is running now
        is_playing: bool,
    },

    /// Playback mode changed
    ModeChanged {
        /// The new mode
        mode: PlaybackMode,
    },

    /// Position update (every tick while playing, and after a seek)
    PositionChanged {
        /// Position in the current track
        current: Duration,
        /// Duration of the current track
        total: Duration,
    },

    /// A different track became current
    CurrentItemChanged {
        /// The new current track
        track: TrackRef,
    },

    /// Up-next queue, list or order changed
    QueueUpdated,

    /// Playback stopped and the queue was cleared
    PlaybackEnded,

    /// Something failed that the caller did not see as an error
    PlaybackError {
        /// Error message
        message: String,
    },
}

impl fmt::Debug for PlayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatusChanged { is_playing } => f
                .debug_struct("StatusChanged")
                .field("is_playing", is_playing)
                .finish(),
            Self::ModeChanged { mode } => f
                .debug_struct("ModeChanged")
                .field("mode", mode)
                .finish(),
            Self::PositionChanged { current, total } => f
                .debug_struct("PositionChanged")
                .field("current", current)
                .field("total", total)
                .finish(),
            Self::CurrentItemChanged { track } => f
                .debug_struct("CurrentItemChanged")
                .field("track_id", &track.id())
                .finish(),
            Self::QueueUpdated => f.write_str("QueueUpdated"),
            Self::PlaybackEnded => f.write_str("PlaybackEnded"),
            Self::PlaybackError { message } => f
                .debug_struct("PlaybackError")
                .field("message", message)
                .finish(),
        }
    }
}

/// Outbound event channel
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// New receiver, seeing events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; nobody listening is fine
    pub fn emit(&self, event: PlayerEvent) {
        trace!(event = ?event, "Emitting event");
        let _ = self.sender.send(event);
    }
}
