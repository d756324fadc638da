//! Core types for Kino Engine

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an engine session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// DRM system types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrmSystem {
    Widevine,
    FairPlay,
    PlayReady,
    ClearKey,
}

impl DrmSystem {
    /// Returns the EME key system string
    pub fn key_system(&self) -> &'static str {
        match self {
            DrmSystem::Widevine => "com.widevine.alpha",
            DrmSystem::FairPlay => "com.apple.fps",
            DrmSystem::PlayReady => "com.microsoft.playready",
            DrmSystem::ClearKey => "org.w3.clearkey",
        }
    }
}

impl std::fmt::Display for DrmSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrmSystem::Widevine => write!(f, "widevine"),
            DrmSystem::FairPlay => write!(f, "fairplay"),
            DrmSystem::PlayReady => write!(f, "playready"),
            DrmSystem::ClearKey => write!(f, "clearkey"),
        }
    }
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count, used to rank renditions
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True if this resolution fits inside `bounds` on both axes
    pub fn fits_within(&self, bounds: Resolution) -> bool {
        self.width <= bounds.width && self.height <= bounds.height
    }

    /// Returns quality tier name
    pub fn quality_name(&self) -> &'static str {
        match self.height {
            0..=240 => "240p",
            241..=360 => "360p",
            361..=480 => "480p",
            481..=720 => "720p",
            721..=1080 => "1080p",
            1081..=1440 => "1440p",
            _ => "4K",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Ordered list of `[start, end)` time ranges in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRanges(pub Vec<(f64, f64)>);

impl TimeRanges {
    pub fn new(ranges: Vec<(f64, f64)>) -> Self {
        Self(ranges)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// End of the last range
    pub fn last_end(&self) -> Option<f64> {
        self.0.last().map(|(_, end)| *end)
    }

    /// True if `time` falls inside any range
    pub fn contains(&self, time: f64) -> bool {
        self.0.iter().any(|(start, end)| time >= *start && time <= *end)
    }
}

/// Platform error categories, as reported by the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaErrorCode {
    /// Fetch aborted by the user agent
    Aborted,
    /// Network failure while fetching media
    Network,
    /// Media could not be decoded
    Decode,
    /// Source type or URL not supported
    SrcNotSupported,
    /// Protected content could not be decrypted
    Encrypted,
}

impl MediaErrorCode {
    /// Errors that may clear up on a fresh load
    pub fn is_transient(&self) -> bool {
        matches!(self, MediaErrorCode::Aborted | MediaErrorCode::Network)
    }
}

/// Error reported by the platform sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaError {
    pub code: MediaErrorCode,
    pub message: String,
}

impl MediaError {
    pub fn new(code: MediaErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

/// Platform families with distinct rendition-switch behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    #[default]
    Generic,
    /// WebKit-based players. The seek after a source swap is dropped
    /// unless the duration is known.
    Safari,
}

impl PlatformFamily {
    /// Whether a progressive switch must wait for `durationchange` before seeking
    pub fn waits_for_duration(&self) -> bool {
        matches!(self, PlatformFamily::Safari)
    }
}

/// Who drives rendition selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbrMode {
    /// Renditions are switched by this engine (progressive variants)
    Manual,
    /// Renditions are switched by the platform (adaptive streams)
    Auto,
}

impl std::fmt::Display for AbrMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbrMode::Manual => write!(f, "manual"),
            AbrMode::Auto => write!(f, "auto"),
        }
    }
}

/// Answer of a platform `canPlayType` probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanPlay {
    No,
    Maybe,
    Probably,
}

impl CanPlay {
    pub fn is_supported(&self) -> bool {
        !matches!(self, CanPlay::No)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_fits() {
        let viewport = Resolution::new(1280, 720);
        assert!(Resolution::new(1280, 720).fits_within(viewport));
        assert!(Resolution::new(640, 360).fits_within(viewport));
        assert!(!Resolution::new(1920, 1080).fits_within(viewport));
        assert!(!Resolution::new(1300, 500).fits_within(viewport));
    }

    #[test]
    fn test_time_ranges_last_end() {
        let ranges = TimeRanges::new(vec![(0.0, 10.0), (20.0, 42.5)]);
        assert_eq!(ranges.last_end(), Some(42.5));
        assert!(ranges.contains(25.0));
        assert!(!ranges.contains(15.0));
        assert_eq!(TimeRanges::default().last_end(), None);
    }

    #[test]
    fn test_platform_quirks() {
        assert!(PlatformFamily::Safari.waits_for_duration());
        assert!(!PlatformFamily::Generic.waits_for_duration());
        assert_eq!(PlatformFamily::default(), PlatformFamily::Generic);
    }

    #[test]
    fn test_abr_mode_serde() {
        assert_eq!(serde_json::to_string(&AbrMode::Manual).unwrap(), "\"manual\"");
        assert_eq!(AbrMode::Auto.to_string(), "auto");
    }
}
