//! Source descriptors and classification
//!
//! A source list holds one descriptor per progressive variant, or a single
//! descriptor pointing at an adaptive stream. Classification happens once,
//! when the adapter is created, and is carried as [`SourceKind`].

use crate::error::{Error, Result};
use crate::types::{DrmSystem, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use url::Url;

/// The single progressive container type; everything else is adaptive
pub const PROGRESSIVE_MIMETYPE: &str = "video/mp4";

/// Delivery classification of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Single-file rendition; variants are switched by swapping the URL
    Progressive,
    /// Multi-rendition stream; the platform switches bitrate itself
    Adaptive,
}

impl SourceKind {
    /// Classify a mimetype
    pub fn classify(mimetype: &str) -> Self {
        if mimetype.trim().eq_ignore_ascii_case(PROGRESSIVE_MIMETYPE) {
            SourceKind::Progressive
        } else {
            SourceKind::Adaptive
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Progressive => write!(f, "progressive"),
            SourceKind::Adaptive => write!(f, "adaptive"),
        }
    }
}

/// Per-system DRM parameters for a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrmDescriptor {
    /// DRM system
    pub system: DrmSystem,
    /// License server URL (Widevine, PlayReady, FairPlay)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_url: Option<Url>,
    /// Server certificate URL (FairPlay)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_url: Option<Url>,
    /// Custom headers for license requests
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// ClearKey key pairs (base64url key id -> base64url key)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub clear_keys: HashMap<String, String>,
}

impl DrmDescriptor {
    /// Descriptor for a license-server based system
    pub fn license_server(system: DrmSystem, license_url: Url) -> Self {
        Self {
            system,
            license_url: Some(license_url),
            certificate_url: None,
            headers: HashMap::new(),
            clear_keys: HashMap::new(),
        }
    }

    /// Descriptor for ClearKey playback
    pub fn clearkey(keys: HashMap<String, String>) -> Self {
        Self {
            system: DrmSystem::ClearKey,
            license_url: None,
            certificate_url: None,
            headers: HashMap::new(),
            clear_keys: keys,
        }
    }

    /// Set the FairPlay certificate URL
    pub fn with_certificate(mut self, url: Url) -> Self {
        self.certificate_url = Some(url);
        self
    }

    /// Add a custom header for license requests
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }
}

/// DRM data attached to a source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrmData {
    /// Acceptable systems, in the content provider's order of preference
    pub systems: Vec<DrmDescriptor>,
}

impl DrmData {
    pub fn new(systems: Vec<DrmDescriptor>) -> Self {
        Self { systems }
    }

    /// Descriptor for a specific system
    pub fn descriptor(&self, system: DrmSystem) -> Option<&DrmDescriptor> {
        self.systems.iter().find(|d| d.system == system)
    }
}

/// One playable source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Identifier, unique within a source list
    pub id: String,
    /// Media URL
    pub url: Url,
    /// Container/manifest mimetype
    pub mimetype: String,
    /// DRM parameters, if the content is protected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drm: Option<DrmData>,
    /// Bandwidth in bits per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl SourceDescriptor {
    /// Create a source without DRM or rendition metadata
    pub fn new(id: impl Into<String>, url: Url, mimetype: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url,
            mimetype: mimetype.into(),
            drm: None,
            bandwidth: None,
            width: None,
            height: None,
        }
    }

    /// Create a progressive variant
    pub fn progressive(id: impl Into<String>, url: Url, width: u32, height: u32) -> Self {
        Self::new(id, url, PROGRESSIVE_MIMETYPE).with_resolution(width, height)
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_bandwidth(mut self, bandwidth: u64) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    pub fn with_drm(mut self, drm: DrmData) -> Self {
        self.drm = Some(drm);
        self
    }

    /// Classification of this source
    pub fn kind(&self) -> SourceKind {
        SourceKind::classify(&self.mimetype)
    }

    /// Resolution, when both dimensions are known
    pub fn resolution(&self) -> Option<Resolution> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(Resolution::new(w, h)),
            _ => None,
        }
    }

    /// Shape check: required fields present
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidSource(format!("missing id for {}", self.url)));
        }
        if self.mimetype.trim().is_empty() {
            return Err(Error::InvalidSource(format!("missing mimetype for source {}", self.id)));
        }
        Ok(())
    }
}

/// Validate every descriptor in a source list and reject repeated ids.
///
/// Progressive variants are selected by source id, so ids must be unique
/// within one list.
pub fn validate_sources(sources: &[SourceDescriptor]) -> Result<()> {
    let mut seen = HashSet::new();
    for source in sources {
        source.validate()?;
        if !seen.insert(source.id.as_str()) {
            return Err(Error::InvalidSource(format!("duplicate source id {}", source.id)));
        }
    }
    Ok(())
}

/// Pick the progressive variant that best fits `viewport`.
///
/// The highest-resolution variant not exceeding the viewport on either axis
/// wins; if none fits, the lowest variant is used. Variants without known
/// dimensions are never chosen. Returns `None` when no variant has dimensions.
pub fn best_fit(sources: &[SourceDescriptor], viewport: Resolution) -> Option<&SourceDescriptor> {
    let sized: Vec<(&SourceDescriptor, Resolution)> = sources
        .iter()
        .filter_map(|s| s.resolution().map(|r| (s, r)))
        .collect();

    let rank = |(s, r): &(&SourceDescriptor, Resolution)| (r.area(), s.bandwidth.unwrap_or(0));

    sized
        .iter()
        .filter(|(_, r)| r.fits_within(viewport))
        .max_by_key(|entry| rank(*entry))
        .or_else(|| sized.iter().min_by_key(|entry| rank(*entry)))
        .map(|(s, _)| *s)
}
