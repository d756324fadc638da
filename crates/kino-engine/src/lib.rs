//! Kino Engine - Playback engine abstraction for Kino
//!
//! This crate puts one uniform playback surface over a platform media sink:
//! - Capability registry for adapter and DRM protocol selection
//! - Engine facade with signal routing and event re-publishing
//! - Native adapter with progressive rendition switching and cue sync
//! - Live-edge support for unbounded streams
//! - Track and cue model shared by every adapter
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Kino Engine                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  create   ┌──────────────┐   ┌──────────────┐ │
//! │  │  Capability  │──────────▶│   Adapter    │──▶│     DRM      │ │
//! │  │   Registry   │           │  (+ switch   │   │   Protocol   │ │
//! │  └──────────────┘           │   machine)   │   └──────┬───────┘ │
//! │         ▲                   └──┬───────▲───┘          │         │
//! │         │                events│       │signals       │         │
//! │  ┌──────┴───────┐           ┌──▼───────┴───┐          │         │
//! │  │    Engine    │◀──────────│    Engine    │          │         │
//! │  │   (facade)   │──────────▶│   routing    │          │         │
//! │  └──────┬───────┘           └──────▲───────┘          │         │
//! │         │ EngineEvent              │ SinkSignal       │         │
//! └─────────┼──────────────────────────┼──────────────────┼─────────┘
//!           ▼                          │                  ▼
//!      application              ┌──────┴──────────────────────┐
//!                               │       Platform sink         │
//!                               └─────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use kino_engine::{CapabilityRegistry, Engine, EngineConfig, MemorySink, SourceDescriptor};
//! use std::sync::Arc;
//! use url::Url;
//!
//! let sink = Arc::new(MemorySink::new());
//! let sources = vec![SourceDescriptor::progressive(
//!     "hd",
//!     Url::parse("https://cdn.example.com/hd.mp4").unwrap(),
//!     1280,
//!     720,
//! )];
//! let registry = CapabilityRegistry::with_defaults();
//! let mut engine = Engine::new(sink, sources, EngineConfig::default(), &registry);
//!
//! let load = engine.load(None);
//! engine.pump();
//! assert_eq!(load.outcome().unwrap().unwrap().video.len(), 1);
//! ```

pub mod adapter;
pub mod config;
pub mod cue;
pub mod drm;
pub mod engine;
pub mod error;
pub mod events;
pub mod registry;
pub mod sink;
pub mod source;
pub mod track;
pub mod types;

pub use adapter::{
    AdapterFactory, LoadHandle, LoadState, NativeAdapter, NativeAdapterFactory, PlaybackAdapter,
    SwitchState,
};
pub use config::{EngineConfig, MediaConfig};
pub use cue::{Cue, PlatformCue};
pub use drm::{ClearKeyProtocol, DrmProtocol, LicenseServerProtocol};
pub use engine::Engine;
pub use error::{Error, Result};
pub use events::{EngineEvent, PlaybackEvent};
pub use registry::CapabilityRegistry;
#[cfg(any(test, feature = "memory-sink"))]
pub use sink::MemorySink;
pub use sink::{MediaSink, SharedSink, SinkSignal, TextTrackMode};
pub use source::{best_fit, validate_sources, DrmData, DrmDescriptor, SourceDescriptor, SourceKind};
pub use track::{AudioTrack, TextTrack, TextTrackKind, TrackId, TrackInfo, TrackSnapshot, VideoTrack};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the engine library
pub fn init() {
    tracing::info!(version = VERSION, "Kino Engine initialized");
}
