mod ids;
mod playback;
mod track;

pub use ids::TrackId;
pub use playback::{PlaybackMode, PlaybackSource, SoundQuality};
pub use track::{LocalTrack, MediaSource, Track, TrackRef};
