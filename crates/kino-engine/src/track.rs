//! Unified track model
//!
//! Tracks are value objects produced by enumeration. `index` is the position
//! in the enumeration that produced the track and goes stale as soon as the
//! platform list mutates; `id` is stable and is what selection resolves by.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Stable track identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identities for one enumeration of platform tracks.
///
/// A platform id is kept when it is non-empty and unique within the list.
/// Empty or repeated ids fall back to `{prefix}:{index}`.
pub(crate) fn enumeration_ids<'a>(prefix: &str, raw: impl IntoIterator<Item = &'a str>) -> Vec<TrackId> {
    let raw: Vec<&str> = raw.into_iter().collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for id in &raw {
        *counts.entry(*id).or_default() += 1;
    }

    let mut taken: HashSet<String> = HashSet::new();
    raw.iter()
        .enumerate()
        .map(|(index, id)| {
            let mut candidate = if id.is_empty() || counts[id] > 1 {
                format!("{prefix}:{index}")
            } else {
                id.to_string()
            };
            while (counts.contains_key(candidate.as_str()) && candidate != *id) || taken.contains(&candidate) {
                candidate.push('\'');
            }
            taken.insert(candidate.clone());
            TrackId(candidate)
        })
        .collect()
}

/// Fields shared by every track kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Stable identity
    pub id: TrackId,
    /// Position in the enumeration that produced this track
    pub index: usize,
    /// Selected (video), enabled (audio) or decoding (text)
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// BCP-47 language code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl TrackInfo {
    pub fn new(id: impl Into<TrackId>, index: usize, active: bool) -> Self {
        Self {
            id: id.into(),
            index,
            active,
            label: None,
            language: None,
        }
    }
}

/// Video rendition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTrack {
    #[serde(flatten)]
    pub info: TrackInfo,
    /// Bandwidth in bits per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl VideoTrack {
    pub fn new(info: TrackInfo) -> Self {
        Self {
            info,
            bandwidth: None,
            width: None,
            height: None,
        }
    }

    pub fn id(&self) -> &TrackId {
        &self.info.id
    }

    pub fn index(&self) -> usize {
        self.info.index
    }

    pub fn is_active(&self) -> bool {
        self.info.active
    }
}

/// Audio track; `active` means enabled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    #[serde(flatten)]
    pub info: TrackInfo,
}

impl AudioTrack {
    pub fn new(info: TrackInfo) -> Self {
        Self { info }
    }

    pub fn id(&self) -> &TrackId {
        &self.info.id
    }

    pub fn index(&self) -> usize {
        self.info.index
    }

    pub fn is_enabled(&self) -> bool {
        self.info.active
    }
}

/// Text track type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTrackKind {
    /// Dialogue translation
    Subtitles,
    /// Closed captions (speaker identification, sound effects)
    Captions,
    /// Audio descriptions
    Descriptions,
    /// Chapter titles
    Chapters,
    /// Metadata track
    Metadata,
    /// Anything the platform reports that we don't recognize
    Other,
}

impl TextTrackKind {
    /// Parse a platform kind string
    pub fn parse(kind: &str) -> Self {
        match kind.to_ascii_lowercase().as_str() {
            "subtitles" => TextTrackKind::Subtitles,
            "captions" => TextTrackKind::Captions,
            "descriptions" => TextTrackKind::Descriptions,
            "chapters" => TextTrackKind::Chapters,
            "metadata" => TextTrackKind::Metadata,
            _ => TextTrackKind::Other,
        }
    }

    /// Only subtitles and captions can be selected for display
    pub fn is_selectable(&self) -> bool {
        matches!(self, TextTrackKind::Subtitles | TextTrackKind::Captions)
    }
}

impl std::fmt::Display for TextTrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextTrackKind::Subtitles => write!(f, "subtitles"),
            TextTrackKind::Captions => write!(f, "captions"),
            TextTrackKind::Descriptions => write!(f, "descriptions"),
            TextTrackKind::Chapters => write!(f, "chapters"),
            TextTrackKind::Metadata => write!(f, "metadata"),
            TextTrackKind::Other => write!(f, "other"),
        }
    }
}

/// Text track (subtitles, captions, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextTrack {
    #[serde(flatten)]
    pub info: TrackInfo,
    pub kind: TextTrackKind,
    /// Set once the track has been put in showing mode; cue-change signals
    /// only fire for tracks that have been shown at least once
    pub shown: bool,
}

impl TextTrack {
    pub fn new(info: TrackInfo, kind: TextTrackKind) -> Self {
        Self {
            info,
            kind,
            shown: false,
        }
    }

    pub fn id(&self) -> &TrackId {
        &self.info.id
    }

    pub fn index(&self) -> usize {
        self.info.index
    }

    pub fn is_active(&self) -> bool {
        self.info.active
    }
}

/// All tracks from one enumeration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub video: Vec<VideoTrack>,
    pub audio: Vec<AudioTrack>,
    pub text: Vec<TextTrack>,
}

impl TrackSnapshot {
    pub fn is_empty(&self) -> bool {
        self.video.is_empty() && self.audio.is_empty() && self.text.is_empty()
    }

    /// Currently selected video track
    pub fn active_video(&self) -> Option<&VideoTrack> {
        self.video.iter().find(|t| t.is_active())
    }

    /// Currently decoding text track
    pub fn active_text(&self) -> Option<&TextTrack> {
        self.text.iter().find(|t| t.is_active())
    }
}
