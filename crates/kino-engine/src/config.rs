//! Engine and media configuration

use crate::error::{Error, Result};
use crate::source::{validate_sources, SourceDescriptor};
use crate::types::PlatformFamily;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prefer the platform's native playback; native adapters refuse to
    /// play anything when this is off
    pub prefer_native: bool,
    /// Platform family, selects rendition-switch quirks
    pub platform: PlatformFamily,
    /// Acceptable drift (seconds) between the pre-switch position and the
    /// position after a rendition switch
    pub seek_tolerance: f64,
    /// Install cue subscriptions on selected text tracks
    pub cue_sync: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prefer_native: true,
            platform: PlatformFamily::Generic,
            seek_tolerance: 0.5,
            cue_sync: true,
        }
    }
}

impl EngineConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.seek_tolerance.is_finite() || self.seek_tolerance < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "seek_tolerance must be a non-negative number, got {}",
                self.seek_tolerance
            )));
        }
        Ok(())
    }
}

/// A source list plus the engine configuration to play it with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConfig {
    pub sources: Vec<SourceDescriptor>,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl MediaConfig {
    /// Parse and validate a JSON media config
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON media config from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::InvalidConfig("source list is empty".into()));
        }
        validate_sources(&self.sources)?;
        self.engine.validate()
    }
}
