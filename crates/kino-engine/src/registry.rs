//! Capability registry
//!
//! Holds the adapter factories and DRM protocols available to every engine
//! instance, and answers "can this be played here?" questions.

use crate::adapter::{AdapterFactory, AdapterSetup, NativeAdapterFactory, PlaybackAdapter};
use crate::config::EngineConfig;
use crate::drm::{default_protocols, DrmProtocol};
use crate::error::{Error, Result};
use crate::events::PlaybackEvent;
use crate::sink::{MediaSink, SharedSink};
use crate::source::{validate_sources, DrmDescriptor, SourceDescriptor};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Registered adapter factories and DRM protocols
#[derive(Default)]
pub struct CapabilityRegistry {
    drm_protocols: Vec<Box<dyn DrmProtocol>>,
    adapters: Vec<Box<dyn AdapterFactory>>,
}

impl CapabilityRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the native adapter and the built-in DRM protocols
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_adapter(Box::new(NativeAdapterFactory));
        for protocol in default_protocols() {
            registry.register_drm(protocol);
        }
        registry
    }

    /// Append a DRM protocol; earlier registrations win negotiation
    pub fn register_drm(&mut self, protocol: Box<dyn DrmProtocol>) {
        debug!(protocol = protocol.name(), "DRM protocol registered");
        self.drm_protocols.push(protocol);
    }

    /// Append an adapter factory; earlier registrations are tried first
    pub fn register_adapter(&mut self, factory: Box<dyn AdapterFactory>) {
        debug!(adapter = factory.name(), "Adapter registered");
        self.adapters.push(factory);
    }

    pub fn drm_protocol_count(&self) -> usize {
        self.drm_protocols.len()
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters.len()
    }

    /// Whether any registered protocol supports one of `descriptors`
    pub fn can_play_drm(&self, descriptors: &[DrmDescriptor]) -> bool {
        self.negotiate_drm(descriptors).is_some()
    }

    /// A fresh session of the first protocol supporting `descriptors`
    pub fn negotiate_drm(&self, descriptors: &[DrmDescriptor]) -> Option<Box<dyn DrmProtocol>> {
        self.drm_protocols
            .iter()
            .find(|protocol| match protocol.can_play_drm(descriptors) {
                Ok(supported) => supported,
                Err(e) => {
                    warn!(protocol = protocol.name(), error = %e, "DRM probe failed");
                    false
                }
            })
            .map(|protocol| {
                debug!(protocol = protocol.name(), "DRM protocol negotiated");
                protocol.new_session()
            })
    }

    /// Whether a registered adapter plays `mimetype` on `sink`
    pub fn can_play_type(&self, sink: &dyn MediaSink, mimetype: &str, config: &EngineConfig) -> bool {
        self.adapters
            .iter()
            .any(|factory| factory.can_play_type(sink, mimetype, config))
    }

    /// Mimetype and DRM support for one source
    pub fn can_play_source(&self, sink: &dyn MediaSink, source: &SourceDescriptor, config: &EngineConfig) -> bool {
        self.find_factory(sink, source, config).is_some()
    }

    fn find_factory(
        &self,
        sink: &dyn MediaSink,
        source: &SourceDescriptor,
        config: &EngineConfig,
    ) -> Option<&dyn AdapterFactory> {
        if let Some(drm) = &source.drm {
            if !self.can_play_drm(&drm.systems) {
                return None;
            }
        }
        self.adapters
            .iter()
            .find(|factory| factory.can_play_type(sink, &source.mimetype, config))
            .map(|factory| factory.as_ref())
    }

    /// Build an adapter for `sources`.
    ///
    /// The first source decides the adapter, the source kind and the DRM
    /// protocol. Sources of another kind are dropped from the session.
    pub fn create_adapter(
        &self,
        sink: SharedSink,
        sources: Vec<SourceDescriptor>,
        config: &EngineConfig,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Result<Box<dyn PlaybackAdapter>> {
        let primary = sources
            .first()
            .ok_or_else(|| Error::InvalidSource("source list is empty".into()))?;
        validate_sources(&sources)?;

        let factory = self
            .find_factory(sink.as_ref(), primary, config)
            .ok_or_else(|| Error::NoCompatibleAdapter {
                mimetype: primary.mimetype.clone(),
            })?;

        let kind = primary.kind();
        let drm = match &primary.drm {
            Some(data) => Some(self.negotiate_drm(&data.systems).ok_or_else(|| Error::DrmNotSupported {
                system: data
                    .systems
                    .iter()
                    .map(|d| d.system.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            })?),
            None => None,
        };

        let total = sources.len();
        let sources: Vec<SourceDescriptor> = sources.into_iter().filter(|s| s.kind() == kind).collect();
        if sources.len() != total {
            warn!(dropped = total - sources.len(), ?kind, "Ignoring sources of a different kind");
        }

        info!(
            adapter = factory.name(),
            ?kind,
            sources = sources.len(),
            drm = ?drm.as_ref().map(|p| p.name()),
            "Adapter created"
        );

        Ok(factory.create(AdapterSetup {
            sink,
            sources,
            kind,
            drm,
            config: config.clone(),
            events,
        }))
    }
}
