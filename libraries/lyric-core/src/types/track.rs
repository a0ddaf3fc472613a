//! Track capability trait and the local-file track used by tests and tools
use crate::error::Result;
use crate::types::{SoundQuality, TrackId};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Decodable audio source resolved from a track
///
/// Handed to the audio backend, which turns it into a playable node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Remote stream
    Url(String),

    /// Local file
    File(PathBuf),
}

/// A playable track
///
/// The playback core only relies on identity, duration and the ability to
/// resolve a decodable source. Display metadata is forwarded to the
/// transport controls.
#[async_trait]
pub trait Track: Send + Sync + fmt::Debug {
    /// Stable identity
    fn id(&self) -> TrackId;

    /// Track title
    fn title(&self) -> &str;

    /// Artist display string
    fn artist(&self) -> &str;

    /// Album display string
    fn album(&self) -> &str;

    /// Nominal duration
    fn duration(&self) -> Duration;

    /// Cover art URL, if any
    fn cover_url(&self) -> Option<&str> {
        None
    }

    /// Resolve a decodable source at the requested quality
    ///
    /// # Errors
    /// Returns an error if the source cannot be resolved (network failure,
    /// missing file, quality unavailable)
    async fn media_source(&self, quality: SoundQuality) -> Result<MediaSource>;
}

/// Shared handle to a track
pub type TrackRef = Arc<dyn Track>;

/// Track backed by a file on disk
///
/// Quality is ignored: a local file only has one encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalTrack {
    /// Unique track identifier
    pub id: TrackId,

    /// Track title
    pub title: String,

    /// Artist name
    pub artist: String,

    /// Album name
    pub album: String,

    /// Track duration
    pub duration: Duration,

    /// File path for decoding
    pub path: PathBuf,
}

impl LocalTrack {
    /// Create a track with placeholder artist/album metadata
    pub fn new(id: u64, title: impl Into<String>, duration: Duration, path: PathBuf) -> Self {
        Self {
            id: TrackId::new(id),
            title: title.into(),
            artist: String::new(),
            album: String::new(),
            duration,
            path,
        }
    }

    /// Wrap into a shared [`TrackRef`]
    pub fn into_ref(self) -> TrackRef {
        Arc::new(self)
    }
}

#[async_trait]
impl Track for LocalTrack {
    fn id(&self) -> TrackId {
        self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn artist(&self) -> &str {
        &self.artist
    }

    fn album(&self) -> &str {
        &self.album
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    async fn media_source(&self, _quality: SoundQuality) -> Result<MediaSource> {
        Ok(MediaSource::File(self.path.clone()))
    }
}
