//! DRM protocols
//!
//! A protocol negotiates one DRM system and configures the sink for protected
//! playback. The registry keeps prototype protocols; each session gets its
//! own instance through [`DrmProtocol::new_session`], so nothing is shared
//! between sessions.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Capability Registry                 │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌─────┐  │
//! │  │ Widevine │  │PlayReady │  │ FairPlay │  │ CK  │  │  first match wins
//! │  └────┬─────┘  └────┬─────┘  └────┬─────┘  └──┬──┘  │
//! └───────┼─────────────┼─────────────┼───────────┼─────┘
//!         └─────────────┴──────┬──────┴───────────┘
//!                       new_session()
//!                              │
//!                    ┌─────────┴─────────┐
//!                    │  Adapter session  │──set_drm_playback──▶ sink
//!                    └───────────────────┘
//! ```

use crate::error::{Error, Result};
use crate::sink::{MediaKeys, SharedSink};
use crate::source::{DrmData, DrmDescriptor};
use crate::types::DrmSystem;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use bytes::Bytes;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Pluggable DRM protocol
pub trait DrmProtocol: Send + Sync {
    /// Protocol name for logs
    fn name(&self) -> &'static str;

    /// Whether this protocol can handle any of `descriptors`
    fn can_play_drm(&self, descriptors: &[DrmDescriptor]) -> Result<bool>;

    /// Fresh, unbound instance scoped to one session
    fn new_session(&self) -> Box<dyn DrmProtocol>;

    /// Configure `sink` for protected playback of `drm`
    fn set_drm_playback(&mut self, sink: &SharedSink, drm: &DrmData) -> Result<()>;

    /// Tear down whatever `set_drm_playback` set up
    fn destroy(&mut self);
}

// =============================================================================
// License server protocols (Widevine, PlayReady, FairPlay)
// =============================================================================

/// Protocol for systems whose license exchange is performed by the platform
pub struct LicenseServerProtocol {
    system: DrmSystem,
    sink: Option<SharedSink>,
}

impl LicenseServerProtocol {
    pub fn new(system: DrmSystem) -> Self {
        Self { system, sink: None }
    }

    pub fn widevine() -> Self {
        Self::new(DrmSystem::Widevine)
    }

    pub fn playready() -> Self {
        Self::new(DrmSystem::PlayReady)
    }

    pub fn fairplay() -> Self {
        Self::new(DrmSystem::FairPlay)
    }

    fn accepts(&self, descriptor: &DrmDescriptor) -> bool {
        descriptor.system == self.system
            && descriptor.license_url.is_some()
            && (self.system != DrmSystem::FairPlay || descriptor.certificate_url.is_some())
    }
}

impl DrmProtocol for LicenseServerProtocol {
    fn name(&self) -> &'static str {
        self.system.key_system()
    }

    fn can_play_drm(&self, descriptors: &[DrmDescriptor]) -> Result<bool> {
        Ok(descriptors.iter().any(|d| self.accepts(d)))
    }

    fn new_session(&self) -> Box<dyn DrmProtocol> {
        Box::new(LicenseServerProtocol::new(self.system))
    }

    fn set_drm_playback(&mut self, sink: &SharedSink, drm: &DrmData) -> Result<()> {
        let descriptor = drm
            .systems
            .iter()
            .find(|d| self.accepts(d))
            .ok_or_else(|| Error::DrmNotSupported {
                system: self.system.to_string(),
            })?;

        sink.set_media_keys(MediaKeys {
            system: self.system,
            license_url: descriptor.license_url.clone(),
            certificate_url: descriptor.certificate_url.clone(),
            headers: descriptor.headers.clone(),
            license: None,
        })?;

        info!(system = %self.system, license_url = ?descriptor.license_url, "DRM playback configured");
        self.sink = Some(sink.clone());
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.clear_media_keys();
            debug!(system = %self.system, "DRM session released");
        }
    }
}

// =============================================================================
// ClearKey
// =============================================================================

/// ClearKey protocol: the license is built locally from the key pairs
#[derive(Default)]
pub struct ClearKeyProtocol {
    sink: Option<SharedSink>,
}

impl ClearKeyProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ClearKey JWK-set license.
    ///
    /// Key ids and keys must be base64url (unpadded) encoded.
    pub fn build_license(keys: &BTreeMap<&str, &str>) -> Result<Bytes> {
        if keys.is_empty() {
            return Err(Error::drm("No ClearKey keys configured"));
        }

        let mut jwks = Vec::with_capacity(keys.len());
        for (kid, key) in keys {
            for value in [kid, key] {
                URL_SAFE_NO_PAD
                    .decode(value.as_bytes())
                    .map_err(|e| Error::drm(format!("Invalid base64url key material {value}: {e}")))?;
            }
            jwks.push(serde_json::json!({
                "kty": "oct",
                "kid": kid,
                "k": key,
            }));
        }

        let license = serde_json::json!({
            "keys": jwks,
            "type": "temporary",
        });

        Ok(Bytes::from(license.to_string()))
    }
}

impl DrmProtocol for ClearKeyProtocol {
    fn name(&self) -> &'static str {
        DrmSystem::ClearKey.key_system()
    }

    fn can_play_drm(&self, descriptors: &[DrmDescriptor]) -> Result<bool> {
        Ok(descriptors
            .iter()
            .any(|d| d.system == DrmSystem::ClearKey && !d.clear_keys.is_empty()))
    }

    fn new_session(&self) -> Box<dyn DrmProtocol> {
        Box::new(ClearKeyProtocol::new())
    }

    fn set_drm_playback(&mut self, sink: &SharedSink, drm: &DrmData) -> Result<()> {
        let descriptor = drm
            .descriptor(DrmSystem::ClearKey)
            .ok_or_else(|| Error::DrmNotSupported {
                system: DrmSystem::ClearKey.to_string(),
            })?;

        let keys: BTreeMap<&str, &str> = descriptor
            .clear_keys
            .iter()
            .map(|(kid, key)| (kid.as_str(), key.as_str()))
            .collect();
        let license = Self::build_license(&keys)?;

        sink.set_media_keys(MediaKeys {
            system: DrmSystem::ClearKey,
            license_url: None,
            certificate_url: None,
            headers: descriptor.headers.clone(),
            license: Some(license),
        })?;

        info!(keys = keys.len(), "ClearKey playback configured");
        self.sink = Some(sink.clone());
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.clear_media_keys();
            debug!("ClearKey session released");
        }
    }
}

/// Built-in protocols in negotiation order
pub fn default_protocols() -> Vec<Box<dyn DrmProtocol>> {
    vec![
        Box::new(LicenseServerProtocol::widevine()),
        Box::new(LicenseServerProtocol::playready()),
        Box::new(LicenseServerProtocol::fairplay()),
        Box::new(ClearKeyProtocol::new()),
    ]
}
