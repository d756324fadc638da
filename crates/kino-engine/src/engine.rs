//! Engine facade
//!
//! Owns one sink and at most one adapter, routes platform signals, and
//! re-publishes everything the application cares about:
//!
//! ```text
//!   sink ──signals──▶ Engine::handle_signal
//!                        │ 1. adapter.handle_signal   (load / switch machinery)
//!                        │ 2. cue-change gating       (adapter.sync_cues)
//!                        │ 3. EngineEvent::Media      (verbatim, when attached)
//!                        │ 4. EngineEvent::Playback   (adapter events, when attached)
//!                        ▼
//!                  broadcast::Sender<EngineEvent> ──▶ application
//! ```

use crate::adapter::{LoadHandle, PlaybackAdapter, SwitchState};
use crate::config::{EngineConfig, MediaConfig};
use crate::error::{Error, Result};
use crate::events::{EngineEvent, PlaybackEvent};
use crate::registry::CapabilityRegistry;
use crate::sink::{SharedSink, SinkSignal};
use crate::source::{SourceDescriptor, SourceKind};
use crate::track::{AudioTrack, TextTrack, TrackId, TrackSnapshot, VideoTrack};
use crate::types::SessionId;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, instrument, warn};

/// Capacity of the application event channel
const EVENT_CAPACITY: usize = 256;

/// Uniform playback surface over one sink
pub struct Engine {
    /// Session ID, recorded on tracing spans
    id: SessionId,
    /// Platform sink
    sink: SharedSink,
    /// Engine configuration
    config: EngineConfig,
    /// Active adapter; absent when no registered adapter fits the sources
    adapter: Option<Box<dyn PlaybackAdapter>>,
    /// Platform signal subscription, dropped on destroy
    signals: Option<broadcast::Receiver<SinkSignal>>,
    /// Events raised by the adapter
    adapter_events: mpsc::UnboundedReceiver<PlaybackEvent>,
    /// Application event channel
    events: broadcast::Sender<EngineEvent>,
    /// Whether signals and adapter events are re-published
    attached: bool,
    /// Text track whose cue changes are forwarded
    cue_subscription: Option<TrackId>,
    destroyed: bool,
}

impl Engine {
    /// Build an engine for `sources` on `sink` and attach it.
    ///
    /// When no adapter can play the sources the engine is still usable; every
    /// adapter-backed operation degrades to a safe default.
    pub fn new(
        sink: SharedSink,
        sources: Vec<SourceDescriptor>,
        config: EngineConfig,
        registry: &CapabilityRegistry,
    ) -> Self {
        let id = SessionId::new();
        let signals = sink.subscribe();
        let (adapter_tx, adapter_events) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let adapter = match registry.create_adapter(sink.clone(), sources, &config, adapter_tx) {
            Ok(adapter) => Some(adapter),
            Err(e) => {
                warn!(session = %id, error = %e, "No adapter bound");
                None
            }
        };

        let mut engine = Self {
            id,
            sink,
            config,
            adapter,
            signals: Some(signals),
            adapter_events,
            events,
            attached: false,
            cue_subscription: None,
            destroyed: false,
        };
        engine.attach();

        info!(
            session = %engine.id,
            adapter = engine.adapter.as_ref().map(|a| a.name()).unwrap_or("none"),
            "Engine created"
        );
        engine
    }

    /// Build an engine from a parsed media config
    pub fn from_config(sink: SharedSink, config: MediaConfig, registry: &CapabilityRegistry) -> Self {
        Self::new(sink, config.sources, config.engine, registry)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sink(&self) -> &SharedSink {
        &self.sink
    }

    pub fn has_adapter(&self) -> bool {
        self.adapter.is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Event routing
    // =========================================================================

    /// Start re-publishing platform signals and adapter events
    pub fn attach(&mut self) {
        if self.attached || self.destroyed {
            return;
        }
        self.attached = true;
        debug!(session = %self.id, "Attached");
    }

    /// Stop re-publishing. Signals still drive the adapter.
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        debug!(session = %self.id, "Detached");
    }

    /// Handle every signal already queued by the sink. Returns how many.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let Some(signals) = self.signals.as_mut() else { break };
            match signals.try_recv() {
                Ok(signal) => {
                    self.handle_signal(signal);
                    handled += 1;
                }
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(session = %self.id, missed, "Signal subscription lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        self.flush_adapter_events();
        handled
    }

    /// Wait for the next platform signal and handle it.
    ///
    /// Returns `None` once the sink's signal source is gone or the engine is
    /// destroyed.
    pub async fn process_next(&mut self) -> Option<SinkSignal> {
        loop {
            let signals = self.signals.as_mut()?;
            match signals.recv().await {
                Ok(signal) => {
                    self.handle_signal(signal.clone());
                    return Some(signal);
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(session = %self.id, missed, "Signal subscription lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Route one platform signal
    pub fn handle_signal(&mut self, signal: SinkSignal) {
        if self.destroyed {
            return;
        }

        if let Some(adapter) = self.adapter.as_mut() {
            adapter.handle_signal(&signal);

            if let SinkSignal::CueChange { index } = &signal {
                let changed = adapter.text_tracks().into_iter().nth(*index);
                match (&self.cue_subscription, changed) {
                    (Some(subscribed), Some(track)) if track.id() == subscribed => adapter.sync_cues(subscribed),
                    _ => debug!(index = *index, "Cue change on unsubscribed track"),
                }
            }
        }

        if self.attached && signal.is_lifecycle() {
            self.publish(EngineEvent::Media(signal));
        }
        self.flush_adapter_events();
    }

    fn flush_adapter_events(&mut self) {
        while let Ok(event) = self.adapter_events.try_recv() {
            if self.attached {
                self.publish(EngineEvent::Playback(event));
            } else {
                debug!(event = event.name(), "Dropping adapter event while detached");
            }
        }
    }

    fn publish(&self, event: EngineEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    // =========================================================================
    // Load and track selection
    // =========================================================================

    /// Start loading; the returned handle resolves with the track snapshot.
    ///
    /// Without an adapter the platform load is still triggered and the handle
    /// is already resolved with no tracks.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn load(&mut self, start_time: Option<f64>) -> LoadHandle {
        if self.destroyed {
            return LoadHandle::failed(Error::Destroyed);
        }
        let handle = match self.adapter.as_mut() {
            Some(adapter) => adapter.load(start_time),
            None => {
                debug!("No adapter bound, loading sink directly");
                self.sink.load();
                LoadHandle::ready(TrackSnapshot::default())
            }
        };
        self.flush_adapter_events();
        handle
    }

    /// Forget a settled load so the next `load` starts over
    pub fn reset_load(&mut self) -> bool {
        self.adapter.as_mut().map(|a| a.reset_load()).unwrap_or(false)
    }

    #[instrument(skip(self, track), fields(session = %self.id, track = %track.id()))]
    pub fn select_video_track(&mut self, track: &VideoTrack) -> Result<()> {
        let Some(adapter) = self.adapter.as_mut() else {
            return Ok(());
        };
        let result = adapter.select_video_track(track);
        self.flush_adapter_events();
        result
    }

    #[instrument(skip(self, track), fields(session = %self.id, track = %track.id()))]
    pub fn select_audio_track(&mut self, track: &AudioTrack) {
        let Some(adapter) = self.adapter.as_mut() else { return };
        adapter.select_audio_track(track);
        self.flush_adapter_events();
    }

    /// Switch text tracks, moving the cue subscription to the new track.
    ///
    /// The old subscription is removed before the switch and the new one is
    /// installed after it, so no cue change from either track slips through
    /// mid-switch.
    #[instrument(skip(self, track), fields(session = %self.id, track = %track.id()))]
    pub fn select_text_track(&mut self, track: &TextTrack) {
        let Some(adapter) = self.adapter.as_mut() else { return };

        if let Some(previous) = self.cue_subscription.take() {
            debug!(track = %previous, "Cue subscription removed");
        }

        adapter.select_text_track(track);

        if self.config.cue_sync {
            self.cue_subscription = adapter.active_text_track().map(|t| t.id().clone());
            if let Some(current) = &self.cue_subscription {
                debug!(track = %current, "Cue subscription installed");
            }
        }
        self.flush_adapter_events();
    }

    #[instrument(skip(self), fields(session = %self.id))]
    pub fn hide_text_track(&mut self) {
        let Some(adapter) = self.adapter.as_mut() else { return };

        if let Some(previous) = self.cue_subscription.take() {
            debug!(track = %previous, "Cue subscription removed");
        }
        adapter.hide_text_track();
        self.flush_adapter_events();
    }

    /// Track whose cue changes are currently forwarded
    pub fn cue_subscription(&self) -> Option<&TrackId> {
        self.cue_subscription.as_ref()
    }

    pub fn video_tracks(&self) -> Vec<VideoTrack> {
        self.adapter.as_ref().map(|a| a.video_tracks()).unwrap_or_default()
    }

    pub fn audio_tracks(&self) -> Vec<AudioTrack> {
        self.adapter.as_ref().map(|a| a.audio_tracks()).unwrap_or_default()
    }

    pub fn text_tracks(&self) -> Vec<TextTrack> {
        self.adapter.as_ref().map(|a| a.text_tracks()).unwrap_or_default()
    }

    pub fn tracks(&self) -> TrackSnapshot {
        self.adapter.as_ref().map(|a| a.tracks()).unwrap_or_default()
    }

    pub fn source_kind(&self) -> Option<SourceKind> {
        self.adapter.as_ref().map(|a| a.source_kind())
    }

    pub fn bound_source(&self) -> Option<&SourceDescriptor> {
        self.adapter.as_ref().and_then(|a| a.bound_source())
    }

    pub fn switch_state(&self) -> SwitchState {
        self.adapter
            .as_ref()
            .map(|a| a.switch_state())
            .unwrap_or_default()
    }

    // =========================================================================
    // Playback surface
    // =========================================================================

    pub fn play(&self) -> Result<()> {
        self.sink.play()
    }

    pub fn pause(&self) {
        self.sink.pause()
    }

    pub fn seek(&self, time: f64) -> Result<()> {
        self.sink.set_current_time(time)
    }

    pub fn current_time(&self) -> f64 {
        self.sink.current_time()
    }

    pub fn paused(&self) -> bool {
        self.sink.paused()
    }

    /// Duration, or the live edge while live
    pub fn duration(&self) -> f64 {
        match &self.adapter {
            Some(adapter) => adapter.duration(),
            None => self.sink.duration(),
        }
    }

    pub fn is_live(&self) -> bool {
        match &self.adapter {
            Some(adapter) => adapter.is_live(),
            None => self.sink.duration() == f64::INFINITY,
        }
    }

    pub fn live_edge(&self) -> f64 {
        match &self.adapter {
            Some(adapter) => adapter.live_edge(),
            None => self.sink.duration(),
        }
    }

    pub fn seek_to_live_edge(&mut self) {
        if let Some(adapter) = self.adapter.as_mut() {
            adapter.seek_to_live_edge();
        }
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Detach, destroy the adapter and release the sink. Safe to call twice.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.detach();
        self.signals = None;
        self.cue_subscription = None;
        if let Some(mut adapter) = self.adapter.take() {
            adapter.destroy();
        }
        self.sink.release();
        self.destroyed = true;
        info!(session = %self.id, "Engine destroyed");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.destroy();
    }
}
