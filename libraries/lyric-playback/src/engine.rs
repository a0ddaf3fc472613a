//! Playback engine
//!
//! [`PlaybackEngine`] is the transport facade. It serializes every queue and
//! node mutation behind one async mutex, and is driven from two sides:
//! user commands (play, next, seek, ...) and a periodic tick that feeds the
//! lookahead prefetcher and the crossfade state machine.
//!
//! ```text
//!            play_collection                  pause
//! Stopped ───────────────────▶ Playing ◀──────────────▶ Paused
//!    ▲                           │  ▲        play
//!    │           stop            │  │
//!    └───────────────────────────┘  └── Crossfading (sub-state, tick driven)
//! ```
//!
//! Background tasks (ticks, prefetch attempts, retries) only hold weak
//! references and end once the last engine handle is dropped.

use crate::backend::AudioBackend;
use crate::crossfade::{CrossfadeMachine, EntryCheck, FadeStep};
use crate::error::{PlaybackError, Result};
use crate::events::{EventBus, PlayerEvent};
use crate::lookahead::{FailureAction, Lookahead};
use crate::node::{NodeFactory, NodeLifecycle, TrackNode};
use crate::queue::{Advance, NextEntry, PlaybackQueue, SkipTarget};
use crate::types::{
    EngineConfig, EngineStatus, NodeStatus, PREVIOUS_RESTART_THRESHOLD, SEEK_INTERRUPT_WINDOW,
};
use lyric_core::{
    PlaybackMode, PlaybackSource, PlayerSettings, SettingsStore, SoundQuality, TrackId, TrackRef,
};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Handle to a playback engine
///
/// Cheap to clone; all clones drive the same engine.
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<Inner>,
}

/// Weak handle that does not keep the engine alive
#[derive(Clone)]
pub struct WeakPlaybackEngine {
    inner: Weak<Inner>,
}

impl WeakPlaybackEngine {
    /// Get a strong handle if the engine still exists
    pub fn upgrade(&self) -> Option<PlaybackEngine> {
        self.inner.upgrade().map(|inner| PlaybackEngine { inner })
    }
}

struct Inner {
    state: Mutex<EngineState>,
    events: EventBus,
    settings: Arc<dyn SettingsStore>,
    backend: Arc<dyn AudioBackend>,
    config: EngineConfig,
}

#[derive(Debug)]
struct EngineState {
    status: EngineStatus,
    queue: PlaybackQueue,
    nodes: NodeLifecycle,
    lookahead: Lookahead,
    crossfade: CrossfadeMachine,
    source: PlaybackSource,
    ticker: Option<JoinHandle<()>>,
    fade_ticker: Option<JoinHandle<()>>,
}

impl EngineState {
    fn new(mode: PlaybackMode) -> Self {
        Self {
            status: EngineStatus::Stopped,
            queue: PlaybackQueue::new(mode),
            nodes: NodeLifecycle::default(),
            lookahead: Lookahead::default(),
            crossfade: CrossfadeMachine::default(),
            source: PlaybackSource::default(),
            ticker: None,
            fade_ticker: None,
        }
    }
}

impl PlaybackEngine {
    /// Create an engine
    ///
    /// The backend is not touched until [`initialize`](Self::initialize).
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        settings: Arc<dyn SettingsStore>,
        config: EngineConfig,
    ) -> Self {
        let mode = settings.load().playback_mode;
        let inner = Inner {
            state: Mutex::new(EngineState::new(mode)),
            events: EventBus::new(config.event_capacity),
            settings,
            backend,
            config,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Weak handle for background tasks
    pub fn downgrade(&self) -> WeakPlaybackEngine {
        WeakPlaybackEngine {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.inner.events.subscribe()
    }

    // ===== Lifecycle =====

    /// Create the audio graph and output sink
    ///
    /// Playback operations fail with
    /// [`PlaybackError::BackendUnavailable`] until this succeeds. Calling it
    /// again is a no-op.
    pub async fn initialize(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if state.nodes.is_initialized() {
            return Ok(());
        }

        let graph = self.inner.backend.create_graph().await?;
        let factory = NodeFactory::new(graph)?;
        factory.set_volume(self.inner.settings.load().volume)?;
        state.nodes.install(factory);

        info!("Audio backend initialized");
        Ok(())
    }

    /// Stop playback and release the audio graph
    pub async fn shutdown(&self) {
        let mut state = self.inner.state.lock().await;
        self.inner.stop(&mut state);
        state.nodes.release();
        info!("Audio backend released");
    }

    // ===== Playback Control =====

    /// Replace the list and start playing
    ///
    /// `start` picks the first track; without it (or if it is not in the
    /// list) playback starts at the first position of the playback order.
    /// An empty list is ignored.
    pub async fn play_collection(
        &self,
        tracks: Vec<TrackRef>,
        start: Option<TrackId>,
        source: PlaybackSource,
    ) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        ignore_invalid_state(
            self.inner
                .play_collection(&mut state, tracks, start, source)
                .await,
        )
    }

    /// Start or resume playback
    pub async fn play(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        ignore_invalid_state(self.inner.play(&mut state))
    }

    /// Pause playback
    pub async fn pause(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        ignore_invalid_state(self.inner.pause(&mut state))
    }

    /// Toggle between playing and paused
    pub async fn play_pause(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        let result = if state.status.is_playing() {
            self.inner.pause(&mut state)
        } else {
            self.inner.play(&mut state)
        };
        ignore_invalid_state(result)
    }

    /// Skip to the next track
    pub async fn next(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        ignore_invalid_state(self.inner.advance(&mut state, Advance::User).await)
    }

    /// Go to the previous track
    ///
    /// Unless direct switching is enabled, a track more than three seconds in
    /// is restarted instead.
    pub async fn previous(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        ignore_invalid_state(self.inner.previous(&mut state).await)
    }

    /// Jump to a track in the up-next queue or the list
    pub async fn skip_to(&self, id: TrackId) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        ignore_invalid_state(self.inner.skip_to(&mut state, id).await)
    }

    /// Stop playback and clear the queue
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        let loaded = ensure_loaded(&state);
        if loaded.is_ok() {
            self.inner.stop(&mut state);
        }
        ignore_invalid_state(loaded)
    }

    // ===== Seek =====

    /// Seek in the current track
    pub async fn seek(&self, position: Duration) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        ignore_invalid_state(self.inner.seek(&mut state, position))
    }

    // ===== Queue Management =====

    /// Queue tracks to play next, in the given order
    pub async fn add_to_up_next(&self, tracks: Vec<TrackRef>) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        ignore_invalid_state(self.inner.add_to_up_next(&mut state, &tracks))
    }

    /// Remove a track from the up-next queue, or else from the list
    pub async fn remove_track(&self, id: TrackId) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        ignore_invalid_state(self.inner.remove_track(&mut state, id))
    }

    // ===== Settings =====

    /// Change and persist the playback mode
    pub async fn set_playback_mode(&self, mode: PlaybackMode) -> Result<()> {
        self.inner.settings.update(|s| s.playback_mode = mode)?;
        let mut state = self.inner.state.lock().await;
        self.inner.set_mode(&mut state, mode);
        Ok(())
    }

    /// Change and persist the master volume (0.0 to 1.0)
    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        self.inner.settings.update(|s| s.volume = volume)?;
        let state = self.inner.state.lock().await;
        if let Ok(factory) = state.nodes.factory() {
            factory.set_volume(volume)?;
        }
        debug!(volume, "Volume changed");
        Ok(())
    }

    /// Change and persist the sound quality used for new nodes
    pub fn set_sound_quality(&self, quality: SoundQuality) -> Result<()> {
        self.inner.settings.update(|s| s.sound_quality = quality)?;
        Ok(())
    }

    /// Change and persist the crossfade settings
    pub fn set_crossfading(&self, enabled: bool, length_seconds: u32) -> Result<()> {
        self.inner.settings.update(|s| {
            s.crossfading_enabled = enabled;
            s.crossfading_length_seconds = length_seconds;
        })?;
        Ok(())
    }

    /// Change and persist whether "previous" always switches tracks
    pub fn set_direct_switch(&self, enabled: bool) -> Result<()> {
        self.inner
            .settings
            .update(|s| s.direct_switch_enabled = enabled)?;
        Ok(())
    }

    /// Current settings
    pub fn settings(&self) -> PlayerSettings {
        self.inner.settings.load()
    }

    // ===== Ticks =====

    /// Run one playback tick
    ///
    /// Called automatically every [`EngineConfig::tick_interval`] while
    /// playing, unless automatic ticking is off.
    pub async fn tick(&self) {
        let mut state = self.inner.state.lock().await;
        self.inner.on_tick(&mut state).await;
    }

    /// Run one crossfade gain update; returns whether a crossfade is still running
    pub async fn fade_tick(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        self.inner.on_fade_tick(&mut state)
    }

    // ===== State Queries =====

    pub async fn status(&self) -> EngineStatus {
        self.inner.state.lock().await.status
    }

    /// Preparation status of the next node
    pub async fn next_status(&self) -> NodeStatus {
        self.inner.state.lock().await.lookahead.status()
    }

    pub async fn is_crossfading(&self) -> bool {
        self.inner.state.lock().await.crossfade.is_active()
    }

    pub async fn playback_mode(&self) -> PlaybackMode {
        self.inner.state.lock().await.queue.mode()
    }

    /// Track of the current node
    pub async fn current_item(&self) -> Option<TrackRef> {
        let state = self.inner.state.lock().await;
        state.nodes.current().map(|node| node.track().clone())
    }

    /// Position and duration of the current node
    pub async fn position(&self) -> Option<(Duration, Duration)> {
        let state = self.inner.state.lock().await;
        state
            .nodes
            .current()
            .map(|node| (node.position(), node.duration()))
    }

    /// The list as given to [`play_collection`](Self::play_collection)
    pub async fn original_playback_list(&self) -> Vec<TrackRef> {
        self.inner.state.lock().await.queue.original().to_vec()
    }

    /// Permutation of list indices in play order
    pub async fn playback_order(&self) -> Vec<usize> {
        self.inner.state.lock().await.queue.order().to_vec()
    }

    /// Up-next queue, front first
    pub async fn up_next(&self) -> Vec<TrackRef> {
        let state = self.inner.state.lock().await;
        state.queue.up_next().cloned().collect()
    }

    /// Upcoming tracks of the playback order, at most `limit`
    pub async fn ordered_playback_list(&self, limit: usize) -> Vec<TrackRef> {
        let state = self.inner.state.lock().await;
        state.queue.ordered_playback_list(limit).cloned().collect()
    }

    /// Context the current list was started from
    pub async fn playback_source(&self) -> PlaybackSource {
        self.inner.state.lock().await.source.clone()
    }
}

impl Inner {
    // ===== Commands =====

    async fn play_collection(
        self: &Arc<Self>,
        state: &mut EngineState,
        tracks: Vec<TrackRef>,
        start: Option<TrackId>,
        source: PlaybackSource,
    ) -> Result<()> {
        if tracks.is_empty() {
            return Err(PlaybackError::invalid_state("empty collection"));
        }
        let factory = state.nodes.factory()?;

        self.teardown(state);
        let entry = state
            .queue
            .load(tracks, start)
            .ok_or_else(|| PlaybackError::invalid_state("empty collection"))?;
        state.source = source;
        info!(
            tracks = state.queue.original().len(),
            track_id = %entry.track.id(),
            "Playing collection"
        );

        let node = match self.create_node(&factory, entry.track.clone()).await {
            Ok(node) => node,
            Err(e) => {
                self.stop(state);
                return Err(e);
            }
        };
        state.nodes.replace_current(node);
        state.queue.commit_advance(&entry);

        if let Err(e) = start_current(state) {
            self.report(&e);
            self.set_status(state, EngineStatus::Paused);
            return Err(e);
        }

        self.set_status(state, EngineStatus::Playing);
        self.events.emit(PlayerEvent::QueueUpdated);
        self.events.emit(PlayerEvent::CurrentItemChanged {
            track: entry.track,
        });
        Ok(())
    }

    fn play(self: &Arc<Self>, state: &mut EngineState) -> Result<()> {
        ensure_loaded(state)?;
        if state.status.is_playing() {
            return Ok(());
        }

        start_current(state)?;
        self.set_status(state, EngineStatus::Playing);
        Ok(())
    }

    fn pause(self: &Arc<Self>, state: &mut EngineState) -> Result<()> {
        ensure_loaded(state)?;
        if !state.status.is_playing() {
            return Ok(());
        }

        self.cancel_crossfade(state);
        if let Some(current) = state.nodes.current_mut() {
            current.stop()?;
        }
        self.set_status(state, EngineStatus::Paused);
        Ok(())
    }

    /// Move to the next entry, used by user skips and automatic advance
    async fn advance(self: &Arc<Self>, state: &mut EngineState, advance: Advance) -> Result<()> {
        ensure_loaded(state)?;
        let factory = state.nodes.factory()?;
        self.cancel_crossfade(state);

        if state.queue.prepared().is_some() && !state.queue.prepared_matches(advance) {
            debug!(?advance, "Prepared node is not the successor, discarding");
            self.discard_prepared(state);
        }

        let entry = match state.queue.prepared().cloned() {
            Some(entry) => entry,
            None => state
                .queue
                .take_next(advance)
                .ok_or_else(|| PlaybackError::invalid_state("nothing to play next"))?,
        };

        let prepared_node = if state.lookahead.status() == NodeStatus::Available {
            state.nodes.take_next()
        } else {
            None
        };
        // A preparation still in flight is discarded when it lands
        state.lookahead.reset();

        let incoming = match prepared_node {
            Some(node) => node,
            None => match self.create_node(&factory, entry.track.clone()).await {
                Ok(node) => node,
                Err(e) => {
                    state.queue.release_prepared();
                    return Err(e);
                }
            },
        };

        state.nodes.rotate_forward(incoming);
        if let Some(outgoing) = state.nodes.previous_mut() {
            if let Err(e) = outgoing.stop() {
                warn!(error = %e, "Failed to stop outgoing node");
            }
        }
        state.queue.commit_advance(&entry);
        debug!(track_id = %entry.track.id(), ?advance, "Advanced to next track");

        if let Err(e) = start_current(state) {
            self.report(&e);
            self.set_status(state, EngineStatus::Paused);
            return Err(e);
        }

        self.set_status(state, EngineStatus::Playing);
        self.emit_track_change(state);
        Ok(())
    }

    async fn previous(self: &Arc<Self>, state: &mut EngineState) -> Result<()> {
        ensure_loaded(state)?;
        let factory = state.nodes.factory()?;
        self.cancel_crossfade(state);

        if !self.settings.load().direct_switch_enabled {
            if let Some(current) = state.nodes.current_mut() {
                if current.position() > PREVIOUS_RESTART_THRESHOLD {
                    current.seek(Duration::ZERO)?;
                    debug!(track_id = %current.track().id(), "Restarting current track");
                    self.events.emit(PlayerEvent::PositionChanged {
                        current: Duration::ZERO,
                        total: current.duration(),
                    });
                    return Ok(());
                }
            }
        }

        let entry = state
            .queue
            .peek_previous()
            .ok_or_else(|| PlaybackError::invalid_state("no previous track"))?;
        self.discard_prepared(state);
        state.nodes.dispose_previous();

        let node = self.create_node(&factory, entry.track.clone()).await?;
        self.switch_current(state, node, &entry)
    }

    async fn skip_to(self: &Arc<Self>, state: &mut EngineState, id: TrackId) -> Result<()> {
        ensure_loaded(state)?;
        let factory = state.nodes.factory()?;
        self.cancel_crossfade(state);
        self.discard_prepared(state);

        match state.queue.skip_to(id) {
            None => Err(PlaybackError::invalid_state(format!(
                "track {} is not queued",
                id
            ))),
            Some(SkipTarget::UpNext) => self.advance(state, Advance::User).await,
            Some(SkipTarget::Ordered(entry)) => {
                state.nodes.dispose_previous();
                let node = self.create_node(&factory, entry.track.clone()).await?;
                self.switch_current(state, node, &entry)
            }
        }
    }

    fn seek(&self, state: &mut EngineState, position: Duration) -> Result<()> {
        ensure_loaded(state)?;
        self.cancel_crossfade(state);

        let node = state
            .nodes
            .current_mut()
            .ok_or_else(|| PlaybackError::invalid_state("no current track"))?;
        node.seek(position.min(node.duration()))?;

        if node.remaining() < SEEK_INTERRUPT_WINDOW && !node.user_interrupted_crossfade() {
            node.interrupt_crossfade();
            debug!(track_id = %node.track().id(), "Seek near track end, crossfade suppressed");
        }

        self.events.emit(PlayerEvent::PositionChanged {
            current: node.position(),
            total: node.duration(),
        });
        Ok(())
    }

    fn stop(self: &Arc<Self>, state: &mut EngineState) {
        let was_loaded = state.status.is_loaded();

        self.teardown(state);
        state.queue.clear();
        state.source = PlaybackSource::default();
        self.set_status(state, EngineStatus::Stopped);

        if was_loaded {
            info!("Playback ended");
            self.events.emit(PlayerEvent::PlaybackEnded);
        }
    }

    fn add_to_up_next(&self, state: &mut EngineState, tracks: &[TrackRef]) -> Result<()> {
        ensure_loaded(state)?;
        if tracks.is_empty() {
            return Ok(());
        }

        state.queue.reclaim_prepared();
        state.queue.add_to_up_next(tracks);
        self.revalidate_prepared(state);

        debug!(count = tracks.len(), "Added to up next");
        self.events.emit(PlayerEvent::QueueUpdated);
        Ok(())
    }

    fn remove_track(self: &Arc<Self>, state: &mut EngineState, id: TrackId) -> Result<()> {
        ensure_loaded(state)?;

        state.queue.reclaim_prepared();
        if !state.queue.remove_track(id) {
            state.queue.confirm_prepared();
            return Ok(());
        }
        debug!(track_id = %id, "Track removed");

        if state.queue.is_empty() {
            self.stop(state);
            return Ok(());
        }

        self.revalidate_prepared(state);
        self.events.emit(PlayerEvent::QueueUpdated);
        Ok(())
    }

    fn set_mode(&self, state: &mut EngineState, mode: PlaybackMode) {
        state.queue.reclaim_prepared();
        let reordered = state.queue.set_mode(mode);
        self.revalidate_prepared(state);

        info!(mode = %mode, reordered, "Playback mode changed");
        self.events.emit(PlayerEvent::ModeChanged { mode });
        if reordered && state.status.is_loaded() {
            self.events.emit(PlayerEvent::QueueUpdated);
        }
    }

    // ===== Ticks =====

    async fn on_tick(self: &Arc<Self>, state: &mut EngineState) {
        if !state.status.is_playing() {
            return;
        }
        let Some(current) = state.nodes.current() else {
            return;
        };

        let remaining = current.remaining();
        let current_eligible = current.is_eligible_for_crossfade();
        let interrupted = current.user_interrupted_crossfade();
        self.events.emit(PlayerEvent::PositionChanged {
            current: current.position(),
            total: current.duration(),
        });

        if state.lookahead.should_prepare(remaining) {
            self.begin_prepare(state);
        }

        if state.crossfade.is_active() {
            self.start_fade_ticker(state);
            return;
        }

        let settings = self.settings.load();
        let check = EntryCheck {
            enabled: settings.crossfading_enabled,
            length: settings.crossfading_length(),
            next_status: state.lookahead.status(),
            current_eligible,
            next_eligible: state
                .nodes
                .next()
                .is_some_and(|node| node.is_eligible_for_crossfade()),
            interrupted,
            remaining,
        };
        if check.should_enter() {
            self.enter_crossfade(state, remaining, check.length);
            return;
        }

        if remaining.is_zero() {
            debug!("Track ended, advancing");
            match self.advance(state, Advance::Auto).await {
                Ok(()) => {}
                Err(PlaybackError::InvalidState(reason)) => {
                    info!(%reason, "Nothing left to play");
                    self.stop(state);
                }
                Err(e) => {
                    warn!(error = %e, "Automatic advance failed, pausing");
                    self.set_status(state, EngineStatus::Paused);
                }
            }
        }
    }

    fn on_fade_tick(&self, state: &mut EngineState) -> bool {
        let Some(position) = state.nodes.current().map(TrackNode::position) else {
            state.crossfade.leave();
            return false;
        };

        match state.crossfade.step(position) {
            FadeStep::Idle => false,
            FadeStep::Continue(gains) => {
                if let Some(incoming) = state.nodes.current_mut() {
                    if let Err(e) = incoming.set_gain(gains.incoming) {
                        warn!(error = %e, "Failed to set incoming gain");
                    }
                }
                if let Some(outgoing) = state.nodes.previous_mut() {
                    if let Err(e) = outgoing.set_gain(gains.outgoing) {
                        warn!(error = %e, "Failed to set outgoing gain");
                    }
                }
                true
            }
            FadeStep::Finish => {
                self.finish_crossfade(state);
                false
            }
        }
    }

    fn start_ticker(self: &Arc<Self>, state: &mut EngineState) {
        if !self.config.auto_tick || is_running(state.ticker.as_ref()) {
            return;
        }

        let engine = Arc::downgrade(self);
        let period = self.config.tick_interval;
        state.ticker = Some(tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(inner) = engine.upgrade() else {
                    break;
                };
                let mut state = inner.state.lock().await;
                if !state.status.is_playing() {
                    break;
                }
                inner.on_tick(&mut state).await;
            }
        }));
    }

    fn stop_ticker(state: &mut EngineState) {
        if let Some(handle) = state.ticker.take() {
            handle.abort();
        }
    }

    fn start_fade_ticker(self: &Arc<Self>, state: &mut EngineState) {
        if !self.config.auto_tick || is_running(state.fade_ticker.as_ref()) {
            return;
        }

        let engine = Arc::downgrade(self);
        let period = self.config.fade_tick_interval;
        state.fade_ticker = Some(tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(inner) = engine.upgrade() else {
                    break;
                };
                let mut state = inner.state.lock().await;
                if !inner.on_fade_tick(&mut state) {
                    break;
                }
            }
        }));
    }

    // ===== Crossfade =====

    fn enter_crossfade(
        self: &Arc<Self>,
        state: &mut EngineState,
        overlap: Duration,
        length: Duration,
    ) {
        let Some(entry) = state.queue.prepared().cloned() else {
            return;
        };
        let Some(incoming) = state.nodes.take_next() else {
            return;
        };

        state.lookahead.reset();
        state.nodes.rotate_forward(incoming);
        state.queue.commit_advance(&entry);
        state.crossfade.enter(overlap, length);

        let started = match state.nodes.current_mut() {
            Some(current) => current.set_gain(0.0).and_then(|()| current.start()),
            None => Ok(()),
        };
        if let Err(e) = started {
            self.report(&e);
            self.finish_crossfade(state);
            self.set_status(state, EngineStatus::Paused);
            self.emit_track_change(state);
            return;
        }

        info!(
            track_id = %entry.track.id(),
            overlap_ms = overlap.as_millis() as u64,
            "Crossfade started"
        );
        self.start_fade_ticker(state);
        self.emit_track_change(state);
    }

    /// Incoming to full gain, outgoing stopped, back to idle
    fn finish_crossfade(&self, state: &mut EngineState) {
        if let Some(incoming) = state.nodes.current_mut() {
            if let Err(e) = incoming.set_gain(1.0) {
                warn!(error = %e, "Failed to restore incoming gain");
            }
        }
        if let Some(outgoing) = state.nodes.previous_mut() {
            if let Err(e) = outgoing.stop() {
                warn!(error = %e, "Failed to stop outgoing node");
            }
        }
        if state.crossfade.leave() {
            info!("Crossfade finished");
        }
    }

    fn cancel_crossfade(&self, state: &mut EngineState) {
        if state.crossfade.is_active() {
            debug!("Cancelling crossfade");
            self.finish_crossfade(state);
        }
        if let Some(handle) = state.fade_ticker.take() {
            handle.abort();
        }
    }

    // ===== Prefetch =====

    fn begin_prepare(self: &Arc<Self>, state: &mut EngineState) {
        let Some(entry) = state.queue.take_next(Advance::Auto) else {
            return;
        };
        let generation = state.lookahead.begin();
        debug!(track_id = %entry.track.id(), generation, "Preparing next node");
        self.spawn_attempt(entry.track, generation);
    }

    fn spawn_attempt(self: &Arc<Self>, track: TrackRef, generation: u64) {
        let engine = Arc::downgrade(self);
        tokio::spawn(async move {
            if let Some(inner) = engine.upgrade() {
                inner.prepare_attempt(track, generation).await;
            }
        });
    }

    /// Single-shot delayed retry
    ///
    /// Aborting the handle only ever cancels the delay; the attempt itself
    /// runs as its own task.
    fn schedule_retry(
        self: &Arc<Self>,
        track: TrackRef,
        generation: u64,
        delay: Duration,
    ) -> JoinHandle<()> {
        let engine = Arc::downgrade(self);
        tokio::spawn(async move {
            time::sleep(delay).await;
            if let Some(inner) = engine.upgrade() {
                inner.spawn_attempt(track, generation);
            }
        })
    }

    async fn prepare_attempt(self: &Arc<Self>, track: TrackRef, generation: u64) {
        let factory = {
            let state = self.state.lock().await;
            if !state.lookahead.is_current(generation) {
                return;
            }
            match state.nodes.factory() {
                Ok(factory) => factory,
                Err(_) => return,
            }
        };

        let quality = self.settings.load().sound_quality;
        let result = factory.create(track.clone(), quality).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(node) => {
                if state.lookahead.complete(generation) {
                    debug!(track_id = %track.id(), generation, "Next node ready");
                    state.nodes.set_next(node);
                } else {
                    debug!(track_id = %track.id(), generation, "Discarding stale node");
                    factory.discard(node);
                }
            }
            Err(e) => match state.lookahead.record_failure(generation) {
                FailureAction::Ignore => {
                    debug!(track_id = %track.id(), generation, "Ignoring failure of stale preparation");
                }
                FailureAction::Retry { attempt, delay } => {
                    warn!(
                        track_id = %track.id(),
                        attempt,
                        error = %e,
                        "Preparing next node failed, retrying"
                    );
                    let handle = self.schedule_retry(track, generation, delay);
                    state.lookahead.set_retry(handle);
                }
                FailureAction::GiveUp => {
                    error!(track_id = %track.id(), error = %e, "Preparing next node failed, giving up");
                    self.events.emit(PlayerEvent::PlaybackError {
                        message: e.to_string(),
                    });
                }
            },
        }
    }

    /// Drop the prepared node and entry
    fn discard_prepared(&self, state: &mut EngineState) {
        state.lookahead.reset();
        state.nodes.dispose_next();
        state.queue.release_prepared();
    }

    /// Keep the prepared node only if it is still what plays next
    fn revalidate_prepared(&self, state: &mut EngineState) {
        let still_next = state.queue.confirm_prepared();
        if !still_next || state.lookahead.status() == NodeStatus::Failed {
            debug!(
                generation = state.lookahead.generation(),
                "Prepared node invalidated"
            );
            self.discard_prepared(state);
        }
    }

    // ===== Helpers =====

    async fn create_node(&self, factory: &NodeFactory, track: TrackRef) -> Result<TrackNode> {
        let quality = self.settings.load().sound_quality;
        factory.create(track, quality).await.map_err(|e| {
            self.report(&e);
            e
        })
    }

    /// Install `node` as current and start it at `entry`
    fn switch_current(
        self: &Arc<Self>,
        state: &mut EngineState,
        node: TrackNode,
        entry: &NextEntry,
    ) -> Result<()> {
        state.nodes.replace_current(node);
        state.queue.commit_advance(entry);
        debug!(track_id = %entry.track.id(), "Switched current track");

        if let Err(e) = start_current(state) {
            self.report(&e);
            self.set_status(state, EngineStatus::Paused);
            return Err(e);
        }

        self.set_status(state, EngineStatus::Playing);
        self.emit_track_change(state);
        Ok(())
    }

    /// Dispose every slot and forget any preparation
    fn teardown(&self, state: &mut EngineState) {
        self.cancel_crossfade(state);
        state.lookahead.reset();
        state.queue.release_prepared();
        state.nodes.dispose_all();
    }

    fn set_status(self: &Arc<Self>, state: &mut EngineState, status: EngineStatus) {
        let was_playing = state.status.is_playing();
        state.status = status;

        if status.is_playing() {
            self.start_ticker(state);
        } else {
            Self::stop_ticker(state);
        }

        if was_playing != status.is_playing() {
            self.events.emit(PlayerEvent::StatusChanged {
                is_playing: status.is_playing(),
            });
        }
    }

    fn emit_track_change(&self, state: &EngineState) {
        if let Some(current) = state.nodes.current() {
            self.events.emit(PlayerEvent::CurrentItemChanged {
                track: current.track().clone(),
            });
        }
        self.events.emit(PlayerEvent::QueueUpdated);
    }

    fn report(&self, error: &PlaybackError) {
        error!(error = %error, "Playback error");
        self.events.emit(PlayerEvent::PlaybackError {
            message: error.to_string(),
        });
    }
}

fn ensure_loaded(state: &EngineState) -> Result<()> {
    if state.status.is_loaded() {
        Ok(())
    } else {
        Err(PlaybackError::invalid_state("no list loaded"))
    }
}

fn start_current(state: &mut EngineState) -> Result<()> {
    let current = state
        .nodes
        .current_mut()
        .ok_or_else(|| PlaybackError::invalid_state("no current track"))?;
    current.set_gain(1.0)?;
    current.start()
}

fn is_running(handle: Option<&JoinHandle<()>>) -> bool {
    handle.is_some_and(|h| !h.is_finished())
}

/// Commands that do not apply in the current state are silently ignored
fn ignore_invalid_state(result: Result<()>) -> Result<()> {
    match result {
        Err(PlaybackError::InvalidState(reason)) => {
            debug!(%reason, "Command ignored");
            Ok(())
        }
        other => other,
    }
}
