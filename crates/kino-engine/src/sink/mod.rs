//! Platform sink capability surface
//!
//! The sink is the platform's media-playback primitive (a video element, a
//! native player view, ...). The engine never decodes anything itself; it
//! drives a [`MediaSink`] and reacts to the [`SinkSignal`]s it emits.
//!
//! ```text
//!   Engine ──calls──▶ MediaSink ──signals (broadcast)──▶ Engine ──▶ Adapter
//! ```

#[cfg(any(test, feature = "memory-sink"))]
pub mod memory;

#[cfg(any(test, feature = "memory-sink"))]
pub use memory::MemorySink;

use crate::cue::PlatformCue;
use crate::error::Result;
use crate::types::{CanPlay, DrmSystem, MediaError, Resolution, TimeRanges};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use url::Url;

/// Shared handle to a sink
pub type SharedSink = Arc<dyn MediaSink>;

/// Signals emitted by the platform sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "lowercase")]
pub enum SinkSignal {
    LoadStart,
    LoadedMetadata,
    /// First frame available; the "data loaded" signal
    LoadedData,
    CanPlay,
    CanPlayThrough,
    /// Duration became known or changed
    DurationChange,
    Play,
    Playing,
    Pause,
    Seeking,
    Seeked,
    TimeUpdate,
    Ended,
    Waiting,
    Stalled,
    Progress,
    VolumeChange,
    RateChange,
    Emptied,
    Error(MediaError),
    /// Active cues of the text track at `index` changed
    CueChange { index: usize },
}

impl SinkSignal {
    /// Platform signal name
    pub fn name(&self) -> &'static str {
        match self {
            SinkSignal::LoadStart => "loadstart",
            SinkSignal::LoadedMetadata => "loadedmetadata",
            SinkSignal::LoadedData => "loadeddata",
            SinkSignal::CanPlay => "canplay",
            SinkSignal::CanPlayThrough => "canplaythrough",
            SinkSignal::DurationChange => "durationchange",
            SinkSignal::Play => "play",
            SinkSignal::Playing => "playing",
            SinkSignal::Pause => "pause",
            SinkSignal::Seeking => "seeking",
            SinkSignal::Seeked => "seeked",
            SinkSignal::TimeUpdate => "timeupdate",
            SinkSignal::Ended => "ended",
            SinkSignal::Waiting => "waiting",
            SinkSignal::Stalled => "stalled",
            SinkSignal::Progress => "progress",
            SinkSignal::VolumeChange => "volumechange",
            SinkSignal::RateChange => "ratechange",
            SinkSignal::Emptied => "emptied",
            SinkSignal::Error(_) => "error",
            SinkSignal::CueChange { .. } => "cuechange",
        }
    }

    /// Lifecycle signals are re-dispatched verbatim to the application.
    /// Cue changes are per-track and go through the cue subscription instead.
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, SinkSignal::CueChange { .. })
    }
}

/// Media readiness, as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    #[default]
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

/// Text track mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTrackMode {
    /// Not decoding
    #[default]
    Disabled,
    /// Decoding, cues not rendered by the platform
    Hidden,
    /// Decoding and rendered
    Showing,
}

impl TextTrackMode {
    /// Hidden and showing tracks both decode cues
    pub fn is_decoding(&self) -> bool {
        !matches!(self, TextTrackMode::Disabled)
    }
}

/// Preload hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preload {
    None,
    Metadata,
    #[default]
    Auto,
}

/// Plain read/write sink properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkProperties {
    pub volume: f64,
    pub muted: bool,
    pub playback_rate: f64,
    pub autoplay: bool,
    pub looping: bool,
    pub controls: bool,
    pub preload: Preload,
    pub poster: Option<Url>,
}

impl Default for SinkProperties {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
            autoplay: false,
            looping: false,
            controls: false,
            preload: Preload::Auto,
            poster: None,
        }
    }
}

/// Video track as reported by the platform's adaptive track list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformVideoTrack {
    pub id: String,
    pub label: Option<String>,
    pub language: Option<String>,
    pub selected: bool,
    pub bandwidth: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Audio track as reported by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformAudioTrack {
    pub id: String,
    pub label: Option<String>,
    pub language: Option<String>,
    pub enabled: bool,
}

/// Text track as reported by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformTextTrack {
    pub id: String,
    /// Raw platform kind string
    pub kind: String,
    pub label: Option<String>,
    pub language: Option<String>,
    pub mode: TextTrackMode,
}

/// Key material handed to the platform's content decryption module
#[derive(Debug, Clone, PartialEq)]
pub struct MediaKeys {
    pub system: DrmSystem,
    /// License server; the platform performs the license exchange
    pub license_url: Option<Url>,
    /// FairPlay application certificate
    pub certificate_url: Option<Url>,
    /// Headers for license requests
    pub headers: HashMap<String, String>,
    /// Pre-built license (ClearKey JWK set)
    pub license: Option<Bytes>,
}

/// The platform media-playback primitive.
///
/// Methods take `&self`; implementations own their interior mutability.
pub trait MediaSink: Send + Sync {
    // Playback state
    fn current_time(&self) -> f64;
    /// Seek. May fail while no media is attached.
    fn set_current_time(&self, time: f64) -> Result<()>;
    /// Duration in seconds; NaN while unknown, infinite for live streams
    fn duration(&self) -> f64;
    fn paused(&self) -> bool;
    fn seeking(&self) -> bool;
    fn ended(&self) -> bool;
    fn error(&self) -> Option<MediaError>;
    fn ready_state(&self) -> ReadyState;

    // Pass-through properties
    fn properties(&self) -> SinkProperties;
    fn set_properties(&self, properties: SinkProperties);

    // Transport
    fn play(&self) -> Result<()>;
    fn pause(&self);
    /// Start (or restart) the platform load of the current source
    fn load(&self);

    // Source binding
    fn source(&self) -> Option<Url>;
    fn set_source(&self, url: &Url);
    /// Current rendered size of the playback surface
    fn viewport_size(&self) -> Resolution;
    /// Native support probe for a mimetype
    fn can_play_type(&self, mimetype: &str) -> Result<CanPlay>;

    // Track lists
    fn video_tracks(&self) -> Vec<PlatformVideoTrack>;
    fn set_video_track_selected(&self, index: usize, selected: bool);
    fn audio_tracks(&self) -> Vec<PlatformAudioTrack>;
    fn set_audio_track_enabled(&self, index: usize, enabled: bool);
    fn text_tracks(&self) -> Vec<PlatformTextTrack>;
    fn set_text_track_mode(&self, index: usize, mode: TextTrackMode);
    /// Cues of a text track that are active at the current position
    fn active_cues(&self, index: usize) -> Vec<PlatformCue>;

    // Time ranges
    fn seekable(&self) -> TimeRanges;
    fn buffered(&self) -> TimeRanges;
    fn played(&self) -> TimeRanges;

    // DRM
    fn set_media_keys(&self, keys: MediaKeys) -> Result<()>;
    fn clear_media_keys(&self);

    /// Subscribe to platform signals
    fn subscribe(&self) -> broadcast::Receiver<SinkSignal>;

    /// Stop playback and detach the source; the sink is unusable afterwards
    fn release(&self);
}
