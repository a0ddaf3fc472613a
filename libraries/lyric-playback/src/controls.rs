//! OS transport-controls integration
//!
//! Two directions:
//! - Inbound: media-key and remote commands arrive as [`TransportCommand`]s
//!   on a channel and are handled exactly like programmatic calls.
//! - Outbound: a bridge task turns engine events into
//!   [`TransportControls`] updates (status, timeline, display metadata).

use crate::engine::PlaybackEngine;
use crate::error::Result;
use crate::events::PlayerEvent;
use lyric_core::TrackRef;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A command from the OS transport controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    Play,
    Pause,
    PlayPause,
    Next,
    Previous,
    /// Seek to an absolute position
    Seek(Duration),
}

/// Now-playing metadata shown by the OS
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub cover_url: Option<String>,
    pub duration: Duration,
}

impl From<&TrackRef> for DisplayInfo {
    fn from(track: &TrackRef) -> Self {
        Self {
            title: track.title().to_string(),
            artist: track.artist().to_string(),
            album: track.album().to_string(),
            cover_url: track.cover_url().map(str::to_string),
            duration: track.duration(),
        }
    }
}

/// Sink for now-playing updates, implemented per platform
pub trait TransportControls: Send + Sync {
    /// Playback started or stopped
    fn update_status(&self, is_playing: bool);

    /// Position within the current track
    fn update_timeline(&self, position: Duration, duration: Duration);

    /// A new track became current
    fn update_display(&self, info: &DisplayInfo);

    /// Nothing is loaded any more
    fn clear(&self) {}
}

/// Handle one command against `engine`
pub async fn handle_command(engine: &PlaybackEngine, command: TransportCommand) -> Result<()> {
    debug!(?command, "Transport command");
    match command {
        TransportCommand::Play => engine.play().await,
        TransportCommand::Pause => engine.pause().await,
        TransportCommand::PlayPause => engine.play_pause().await,
        TransportCommand::Next => engine.next().await,
        TransportCommand::Previous => engine.previous().await,
        TransportCommand::Seek(position) => engine.seek(position).await,
    }
}

/// Feed commands from `commands` into the engine until the channel closes
///
/// Holds only a weak reference; the task ends once the engine is dropped.
pub fn spawn_command_listener(
    engine: &PlaybackEngine,
    mut commands: mpsc::Receiver<TransportCommand>,
) -> JoinHandle<()> {
    let engine = engine.downgrade();
    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            let Some(engine) = engine.upgrade() else {
                break;
            };
            if let Err(e) = handle_command(&engine, command).await {
                warn!(?command, error = %e, "Transport command failed");
            }
        }
    })
}

/// Forward engine events to `controls` until the engine is dropped
pub fn spawn_controls_bridge(
    engine: &PlaybackEngine,
    controls: Arc<dyn TransportControls>,
) -> JoinHandle<()> {
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => forward(controls.as_ref(), &event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Transport bridge lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn forward(controls: &dyn TransportControls, event: &PlayerEvent) {
    match event {
        PlayerEvent::StatusChanged { is_playing } => controls.update_status(*is_playing),
        PlayerEvent::PositionChanged { current, total } => {
            controls.update_timeline(*current, *total);
        }
        PlayerEvent::CurrentItemChanged { track } => {
            controls.update_display(&DisplayInfo::from(track));
        }
        PlayerEvent::PlaybackEnded => controls.clear(),
        PlayerEvent::ModeChanged { .. }
        | PlayerEvent::QueueUpdated
        | PlayerEvent::PlaybackError { .. } => {}
    }
}
