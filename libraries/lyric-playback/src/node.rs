//! Track nodes and the previous/current/next slots
//!
//! A [`TrackNode`] is a backend node bound to one track. [`NodeLifecycle`]
//! owns the graph, the single output sink and the three slots, and is the
//! only place nodes are created or disposed. Disposal consumes the node, so
//! a disposed node can never be touched again.

use crate::backend::{AudioGraph, NodeHandle, OutputSink};
use crate::error::{PlaybackError, Result};
use crate::types::CROSSFADE_MIN_TRACK_LENGTH;
use lyric_core::{SoundQuality, TrackRef};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A live backend node bound to one track
pub struct TrackNode {
    track: TrackRef,
    handle: Box<dyn NodeHandle>,
    eligible_for_crossfade: bool,
    user_interrupted_crossfade: bool,
}

impl fmt::Debug for TrackNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackNode")
            .field("track_id", &self.track.id())
            .field("eligible_for_crossfade", &self.eligible_for_crossfade)
            .field(
                "user_interrupted_crossfade",
                &self.user_interrupted_crossfade,
            )
            .finish_non_exhaustive()
    }
}

impl TrackNode {
    fn new(track: TrackRef, handle: Box<dyn NodeHandle>) -> Self {
        let duration = handle.duration().unwrap_or_else(|| track.duration());
        Self {
            track,
            handle,
            eligible_for_crossfade: duration > CROSSFADE_MIN_TRACK_LENGTH,
            user_interrupted_crossfade: false,
        }
    }

    /// Track this node plays
    pub fn track(&self) -> &TrackRef {
        &self.track
    }

    /// Current position
    pub fn position(&self) -> Duration {
        self.handle.position()
    }

    /// Node duration, falling back to the track's own duration
    pub fn duration(&self) -> Duration {
        self.handle
            .duration()
            .unwrap_or_else(|| self.track.duration())
    }

    /// Time left until the end of the node
    pub fn remaining(&self) -> Duration {
        self.duration().saturating_sub(self.position())
    }

    /// Whether the node may take part in a crossfade
    pub fn is_eligible_for_crossfade(&self) -> bool {
        self.eligible_for_crossfade
    }

    /// Whether a user seek near the end suppressed the crossfade
    pub fn user_interrupted_crossfade(&self) -> bool {
        self.user_interrupted_crossfade
    }

    /// Latch the crossfade suppression for this node
    pub fn interrupt_crossfade(&mut self) {
        self.user_interrupted_crossfade = true;
    }

    pub fn start(&mut self) -> Result<()> {
        self.handle.start()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.handle.stop()
    }

    pub fn seek(&mut self, position: Duration) -> Result<()> {
        self.handle.seek(position)
    }

    pub fn set_gain(&mut self, gain: f64) -> Result<()> {
        self.handle.set_gain(gain.clamp(0.0, 1.0))
    }

    /// Stop, disconnect and release, best effort
    ///
    /// Failures are logged and never propagated.
    fn dispose(mut self, sink: Option<&dyn OutputSink>) {
        let track_id = self.track.id();

        if let Err(e) = self.handle.stop() {
            warn!(track_id = %track_id, error = %e, "Failed to stop node during dispose");
        }
        if let Some(sink) = sink {
            if let Err(e) = self.handle.disconnect(sink) {
                warn!(track_id = %track_id, error = %e, "Failed to disconnect node");
            }
        }
        if let Err(e) = self.handle.dispose() {
            warn!(track_id = %track_id, error = %e, "Failed to release node");
        }

        debug!(track_id = %track_id, "Node disposed");
    }
}

/// Graph plus output sink, the means to create nodes
///
/// Cheap to clone; clones share the same graph and sink.
#[derive(Clone)]
pub struct NodeFactory {
    graph: Arc<dyn AudioGraph>,
    sink: Arc<dyn OutputSink>,
}

impl fmt::Debug for NodeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeFactory").finish_non_exhaustive()
    }
}

impl NodeFactory {
    /// Create the output sink on `graph`
    pub fn new(graph: Arc<dyn AudioGraph>) -> Result<Self> {
        let sink = graph.create_output_sink()?;
        Ok(Self { graph, sink })
    }

    /// Create a stopped node at position zero, connected to the sink
    ///
    /// The node is forced to a stopped, reset state whatever the backend did
    /// on creation.
    pub async fn create(&self, track: TrackRef, quality: SoundQuality) -> Result<TrackNode> {
        let track_id = track.id();
        let source = track
            .media_source(quality)
            .await
            .map_err(|e| PlaybackError::node_creation(format!("track {}: {}", track_id, e)))?;

        let mut handle = self.graph.create_node(source).await?;

        if let Err(e) = settle(handle.as_mut(), self.sink.as_ref()) {
            if let Err(dispose_error) = handle.dispose() {
                warn!(track_id = %track_id, error = %dispose_error, "Failed to release unsettled node");
            }
            return Err(PlaybackError::node_creation(format!(
                "track {}: {}",
                track_id, e
            )));
        }

        debug!(track_id = %track_id, quality = %quality, "Node created");
        Ok(TrackNode::new(track, handle))
    }

    /// Dispose a node that never made it into a slot
    pub fn discard(&self, node: TrackNode) {
        node.dispose(Some(self.sink.as_ref()));
    }

    /// Set master volume on the sink
    pub fn set_volume(&self, volume: f64) -> Result<()> {
        self.sink.set_volume(volume.clamp(0.0, 1.0))
    }
}

fn settle(handle: &mut dyn NodeHandle, sink: &dyn OutputSink) -> Result<()> {
    handle.stop()?;
    handle.reset()?;
    handle.set_gain(1.0)?;
    handle.connect(sink)
}

/// Owner of the backend resources and the three node slots
///
/// Never holds more than three nodes. Every slot is disposed before it is
/// reassigned, and [`release`](Self::release) empties the slots before the
/// sink and graph go away. Dropping the lifecycle releases it.
#[derive(Debug, Default)]
pub struct NodeLifecycle {
    factory: Option<NodeFactory>,
    previous: Option<TrackNode>,
    current: Option<TrackNode>,
    next: Option<TrackNode>,
}

impl NodeLifecycle {
    /// Install the backend resources
    pub fn install(&mut self, factory: NodeFactory) {
        self.release();
        self.factory = Some(factory);
    }

    /// Dispose every slot, then drop the sink and graph
    pub fn release(&mut self) {
        self.dispose_all();
        self.factory = None;
    }

    /// Whether the backend is initialized
    pub fn is_initialized(&self) -> bool {
        self.factory.is_some()
    }

    /// Factory handle for creating nodes outside the engine lock
    pub fn factory(&self) -> Result<NodeFactory> {
        self.factory
            .clone()
            .ok_or(PlaybackError::BackendUnavailable)
    }

    pub fn previous_mut(&mut self) -> Option<&mut TrackNode> {
        self.previous.as_mut()
    }

    pub fn current(&self) -> Option<&TrackNode> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut TrackNode> {
        self.current.as_mut()
    }

    pub fn next(&self) -> Option<&TrackNode> {
        self.next.as_ref()
    }

    /// Number of nodes alive in the slots
    pub fn alive(&self) -> usize {
        [&self.previous, &self.current, &self.next]
            .iter()
            .filter(|slot| slot.is_some())
            .count()
    }

    /// Put a freshly prepared node in the next slot
    pub fn set_next(&mut self, node: TrackNode) {
        self.dispose_next();
        self.next = Some(node);
        debug_assert!(self.alive() <= 3);
    }

    /// Take the prepared node out of the next slot
    pub fn take_next(&mut self) -> Option<TrackNode> {
        self.next.take()
    }

    /// Replace the current node, disposing the old one
    pub fn replace_current(&mut self, node: TrackNode) {
        self.dispose_current();
        self.current = Some(node);
        debug_assert!(self.alive() <= 3);
    }

    /// Shift slots forward: previous is disposed, current becomes previous
    ///
    /// The old current keeps running; callers stop it when the transition
    /// ends.
    pub fn rotate_forward(&mut self, incoming: TrackNode) {
        self.dispose_previous();
        self.previous = self.current.take();
        self.current = Some(incoming);
        debug_assert!(self.alive() <= 3);
    }

    pub fn dispose_previous(&mut self) {
        let node = self.previous.take();
        self.dispose(node);
    }

    pub fn dispose_current(&mut self) {
        let node = self.current.take();
        self.dispose(node);
    }

    pub fn dispose_next(&mut self) {
        let node = self.next.take();
        self.dispose(node);
    }

    /// Dispose all three slots
    pub fn dispose_all(&mut self) {
        self.dispose_previous();
        self.dispose_current();
        self.dispose_next();
    }

    fn dispose(&self, node: Option<TrackNode>) {
        if let Some(node) = node {
            let sink = self.factory.as_ref().map(|f| f.sink.as_ref());
            node.dispose(sink);
        }
    }
}

impl Drop for NodeLifecycle {
    fn drop(&mut self) {
        self.release();
    }
}
