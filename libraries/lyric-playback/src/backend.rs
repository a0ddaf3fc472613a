//! Audio rendering backend interface
//!
//! Abstracts the platform audio graph. The engine never decodes audio itself:
//! a backend turns a [`MediaSource`] into a controllable node with transport
//! and gain primitives, and provides the single output sink every node
//! connects to.
//!
//! ```text
//! AudioBackend ──create_graph──▶ AudioGraph ──create_output_sink──▶ OutputSink (volume)
//!                                    │
//!                                    └──create_node(MediaSource)──▶ NodeHandle ──connect──▶ sink
//! ```

use crate::error::Result;
use async_trait::async_trait;
use lyric_core::MediaSource;
use std::sync::Arc;
use std::time::Duration;

/// Entry point of a platform audio backend
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Create the audio graph
    ///
    /// Called once per engine initialization.
    async fn create_graph(&self) -> Result<Arc<dyn AudioGraph>>;
}

/// A live audio graph
#[async_trait]
pub trait AudioGraph: Send + Sync {
    /// Create the output sink all track nodes connect to
    fn create_output_sink(&self) -> Result<Arc<dyn OutputSink>>;

    /// Build a node that decodes `source`
    ///
    /// This may suspend while the source is opened. A non-success creation
    /// status must be reported as
    /// [`PlaybackError::NodeCreationFailed`](crate::PlaybackError::NodeCreationFailed).
    async fn create_node(&self, source: MediaSource) -> Result<Box<dyn NodeHandle>>;
}

/// Output sink shared by every node
pub trait OutputSink: Send + Sync {
    /// Set master volume (0.0 to 1.0)
    fn set_volume(&self, volume: f64) -> Result<()>;
}

/// A backend node bound to one decoded source
///
/// All operations are fallible. The engine owns each handle exclusively and
/// calls [`dispose`](Self::dispose) exactly once.
pub trait NodeHandle: Send {
    /// Start (or resume) rendering
    fn start(&mut self) -> Result<()>;

    /// Stop rendering, keeping the position
    fn stop(&mut self) -> Result<()>;

    /// Move to `position`
    fn seek(&mut self, position: Duration) -> Result<()>;

    /// Back to the start of the source
    ///
    /// Equivalent to `seek(Duration::ZERO)`
    fn reset(&mut self) -> Result<()> {
        self.seek(Duration::ZERO)
    }

    /// Current position in the source
    fn position(&self) -> Duration;

    /// Total duration of the source, if the backend knows it
    fn duration(&self) -> Option<Duration>;

    /// Node gain (0.0 to 1.0)
    fn gain(&self) -> f64;

    /// Set node gain (0.0 to 1.0)
    fn set_gain(&mut self, gain: f64) -> Result<()>;

    /// Connect to the output sink
    fn connect(&mut self, sink: &dyn OutputSink) -> Result<()>;

    /// Disconnect from the output sink
    fn disconnect(&mut self, sink: &dyn OutputSink) -> Result<()>;

    /// Release backend resources
    fn dispose(&mut self) -> Result<()>;
}
