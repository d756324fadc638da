//! Events published to the application

use crate::cue::Cue;
use crate::sink::SinkSignal;
use crate::track::{AudioTrack, TextTrack, VideoTrack};
use crate::types::AbrMode;
use serde::{Deserialize, Serialize};

/// Semantic events raised by the adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum PlaybackEvent {
    VideoTrackChanged { track: VideoTrack },
    AudioTrackChanged { track: AudioTrack },
    TextTrackChanged { track: TextTrack },
    AbrModeChanged { mode: AbrMode },
    /// Complete set of active cues (replaces the previous set)
    TextCueChanged { cues: Vec<Cue> },
}

impl PlaybackEvent {
    /// Event name
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackEvent::VideoTrackChanged { .. } => "video-track-changed",
            PlaybackEvent::AudioTrackChanged { .. } => "audio-track-changed",
            PlaybackEvent::TextTrackChanged { .. } => "text-track-changed",
            PlaybackEvent::AbrModeChanged { .. } => "abr-mode-changed",
            PlaybackEvent::TextCueChanged { .. } => "text-cue-changed",
        }
    }
}

/// Everything the engine publishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "payload", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Platform lifecycle signal, re-dispatched verbatim
    Media(SinkSignal),
    /// Adapter semantic event
    Playback(PlaybackEvent),
}

impl EngineEvent {
    /// Name under which the event is dispatched
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::Media(signal) => signal.name(),
            EngineEvent::Playback(event) => event.name(),
        }
    }
}
