//! Shared test helpers: an in-memory audio backend and an engine harness
#![allow(dead_code)]

use async_trait::async_trait;
use lyric_core::{LocalTrack, MediaSource, MemorySettingsStore, PlayerSettings, TrackRef};
use lyric_playback::{
    AudioBackend, AudioGraph, EngineConfig, NodeHandle, OutputSink, PlaybackEngine,
    PlaybackError, PlayerEvent, Result,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing_subscriber::EnvFilter;

// ===== Fake Backend =====

/// Observable state of one fake node
#[derive(Debug)]
pub struct NodeState {
    pub path: PathBuf,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub gain: f64,
    pub playing: bool,
    pub connected: bool,
    pub disposed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    durations: HashMap<PathBuf, Duration>,
    nodes: Vec<Arc<Mutex<NodeState>>>,
    created: usize,
    disposed: usize,
    alive: usize,
    max_alive: usize,
    failures_remaining: usize,
    volume: Option<f64>,
}

/// Backend that records every node it hands out
///
/// Nodes never advance on their own; tests move positions explicitly.
/// New nodes come up "playing" to check that the engine forces them into a
/// stopped state.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    shared: Arc<Mutex<Shared>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

fn path_for(id: u64) -> PathBuf {
    PathBuf::from(format!("/music/{}.mp3", id))
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A track whose node will report `secs` of duration
    pub fn track(&self, id: u64, secs: u64) -> TrackRef {
        let duration = Duration::from_secs(secs);
        lock(&self.shared).durations.insert(path_for(id), duration);
        LocalTrack::new(id, format!("Track {}", id), duration, path_for(id)).into_ref()
    }

    /// Tracks `ids`, all `secs` long
    pub fn tracks(&self, ids: impl IntoIterator<Item = u64>, secs: u64) -> Vec<TrackRef> {
        ids.into_iter().map(|id| self.track(id, secs)).collect()
    }

    /// Make the next `count` node creations fail
    pub fn fail_next(&self, count: usize) {
        lock(&self.shared).failures_remaining = count;
    }

    pub fn created(&self) -> usize {
        lock(&self.shared).created
    }

    pub fn disposed(&self) -> usize {
        lock(&self.shared).disposed
    }

    pub fn alive(&self) -> usize {
        lock(&self.shared).alive
    }

    pub fn max_alive(&self) -> usize {
        lock(&self.shared).max_alive
    }

    pub fn volume(&self) -> Option<f64> {
        lock(&self.shared).volume
    }

    /// Most recent live node for track `id`
    pub fn node(&self, id: u64) -> Option<Arc<Mutex<NodeState>>> {
        let path = path_for(id);
        lock(&self.shared)
            .nodes
            .iter()
            .rev()
            .find(|node| {
                let node = lock(node);
                node.path == path && !node.disposed
            })
            .cloned()
    }

    pub fn set_position(&self, id: u64, position: Duration) {
        let node = self.node(id).expect("no live node for track");
        lock(&node).position = position;
    }

    pub fn gain(&self, id: u64) -> f64 {
        let node = self.node(id).expect("no live node for track");
        let gain = lock(&node).gain;
        gain
    }

    pub fn is_playing(&self, id: u64) -> bool {
        self.node(id).is_some_and(|node| lock(&node).playing)
    }

    pub fn position(&self, id: u64) -> Duration {
        let node = self.node(id).expect("no live node for track");
        let position = lock(&node).position;
        position
    }
}

#[async_trait]
impl AudioBackend for FakeBackend {
    async fn create_graph(&self) -> Result<Arc<dyn AudioGraph>> {
        Ok(Arc::new(FakeGraph {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct FakeGraph {
    shared: Arc<Mutex<Shared>>,
}

#[async_trait]
impl AudioGraph for FakeGraph {
    fn create_output_sink(&self) -> Result<Arc<dyn OutputSink>> {
        Ok(Arc::new(FakeSink {
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn create_node(&self, source: MediaSource) -> Result<Box<dyn NodeHandle>> {
        let mut shared = lock(&self.shared);
        if shared.failures_remaining > 0 {
            shared.failures_remaining -= 1;
            return Err(PlaybackError::node_creation("decoder refused source"));
        }

        let MediaSource::File(path) = source else {
            return Err(PlaybackError::node_creation("unsupported source"));
        };
        let duration = shared.durations.get(&path).copied();
        let state = Arc::new(Mutex::new(NodeState {
            path,
            position: Duration::ZERO,
            duration,
            gain: 1.0,
            playing: true,
            connected: false,
            disposed: false,
        }));

        shared.nodes.push(Arc::clone(&state));
        shared.created += 1;
        shared.alive += 1;
        shared.max_alive = shared.max_alive.max(shared.alive);

        Ok(Box::new(FakeNode {
            state,
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct FakeSink {
    shared: Arc<Mutex<Shared>>,
}

impl OutputSink for FakeSink {
    fn set_volume(&self, volume: f64) -> Result<()> {
        lock(&self.shared).volume = Some(volume);
        Ok(())
    }
}

struct FakeNode {
    state: Arc<Mutex<NodeState>>,
    shared: Arc<Mutex<Shared>>,
}

impl FakeNode {
    fn live(&self) -> Result<MutexGuard<'_, NodeState>> {
        let state = lock(&self.state);
        if state.disposed {
            return Err(PlaybackError::backend("node already disposed"));
        }
        Ok(state)
    }
}

impl NodeHandle for FakeNode {
    fn start(&mut self) -> Result<()> {
        self.live()?.playing = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.live()?.playing = false;
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.live()?.position = position;
        Ok(())
    }

    fn position(&self) -> Duration {
        lock(&self.state).position
    }

    fn duration(&self) -> Option<Duration> {
        lock(&self.state).duration
    }

    fn gain(&self) -> f64 {
        lock(&self.state).gain
    }

    fn set_gain(&mut self, gain: f64) -> Result<()> {
        self.live()?.gain = gain;
        Ok(())
    }

    fn connect(&mut self, _sink: &dyn OutputSink) -> Result<()> {
        self.live()?.connected = true;
        Ok(())
    }

    fn disconnect(&mut self, _sink: &dyn OutputSink) -> Result<()> {
        self.live()?.connected = false;
        Ok(())
    }

    fn dispose(&mut self) -> Result<()> {
        self.live()?.disposed = true;
        let mut shared = lock(&self.shared);
        shared.alive -= 1;
        shared.disposed += 1;
        Ok(())
    }
}

// ===== Engine Harness =====

pub struct Harness {
    pub engine: PlaybackEngine,
    pub backend: FakeBackend,
    pub settings: Arc<MemorySettingsStore>,
    pub events: broadcast::Receiver<PlayerEvent>,
}

/// Initialized engine on a fake backend, ticked by hand
pub async fn harness(settings: PlayerSettings) -> Harness {
    harness_with(settings, EngineConfig::manual()).await
}

pub async fn harness_with(settings: PlayerSettings, config: EngineConfig) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let backend = FakeBackend::new();
    let settings = Arc::new(MemorySettingsStore::new(settings));
    let engine = PlaybackEngine::new(Arc::new(backend.clone()), settings.clone(), config);
    engine.initialize().await.unwrap();
    let events = engine.subscribe();

    Harness {
        engine,
        backend,
        settings,
        events,
    }
}

/// Settings with crossfading off, so ticks only prefetch and advance
pub fn no_crossfade() -> PlayerSettings {
    PlayerSettings {
        crossfading_enabled: false,
        ..PlayerSettings::default()
    }
}

/// Let spawned preparation tasks run
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Pending events, without position updates
pub fn drain(events: &mut broadcast::Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut drained = Vec::new();
    loop {
        match events.try_recv() {
            Ok(PlayerEvent::PositionChanged { .. }) => {}
            Ok(event) => drained.push(event),
            Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    drained
}

/// Compact event names for order assertions
pub fn names(events: &[PlayerEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| match event {
            PlayerEvent::StatusChanged { is_playing } => format!("status:{}", is_playing),
            PlayerEvent::ModeChanged { mode } => format!("mode:{}", mode),
            PlayerEvent::PositionChanged { .. } => "position".to_string(),
            PlayerEvent::CurrentItemChanged { track } => format!("current:{}", track.id()),
            PlayerEvent::QueueUpdated => "queue".to_string(),
            PlayerEvent::PlaybackEnded => "ended".to_string(),
            PlayerEvent::PlaybackError { .. } => "error".to_string(),
        })
        .collect()
}

pub fn ids(tracks: &[TrackRef]) -> Vec<u64> {
    tracks.iter().map(|t| t.id().get()).collect()
}

pub async fn current_id(engine: &PlaybackEngine) -> Option<u64> {
    engine.current_item().await.map(|t| t.id().get())
}
