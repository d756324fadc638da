//! Native adapter
//!
//! Plays sources through the platform's own decoder. Progressive sources are
//! switched by swapping the URL (see [`switch`](super::switch)); adaptive
//! sources expose the platform's rendition list and let it do the switching.

use super::{
    AdapterFactory, AdapterSetup, LoadHandle, LoadResolver, PlaybackAdapter, Resume,
    SwitchAction, SwitchMachine, SwitchState,
};
use crate::config::EngineConfig;
use crate::cue::normalize_all;
use crate::drm::DrmProtocol;
use crate::error::Error;
use crate::events::PlaybackEvent;
use crate::sink::{MediaSink, SharedSink, SinkSignal, TextTrackMode};
use crate::source::{best_fit, SourceDescriptor, SourceKind};
use crate::track::{enumeration_ids, AudioTrack, TextTrack, TextTrackKind, TrackId, TrackInfo, VideoTrack};
use crate::types::{AbrMode, PlatformFamily};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Factory for [`NativeAdapter`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeAdapterFactory;

impl AdapterFactory for NativeAdapterFactory {
    fn name(&self) -> &'static str {
        "native"
    }

    fn can_play_type(&self, sink: &dyn MediaSink, mimetype: &str, config: &EngineConfig) -> bool {
        if !config.prefer_native {
            return false;
        }
        match sink.can_play_type(mimetype) {
            Ok(answer) => answer.is_supported(),
            Err(e) => {
                warn!(mimetype, error = %e, "canPlayType probe failed");
                false
            }
        }
    }

    fn create(&self, setup: AdapterSetup) -> Box<dyn PlaybackAdapter> {
        Box::new(NativeAdapter::new(setup))
    }
}

/// The load in progress (or settled) for this session
struct LoadSlot {
    handle: LoadHandle,
    resolver: LoadResolver,
}

/// Native playback session
pub struct NativeAdapter {
    sink: SharedSink,
    kind: SourceKind,
    sources: Vec<SourceDescriptor>,
    /// Source currently set on the sink
    bound: Option<SourceDescriptor>,
    drm: Option<Box<dyn DrmProtocol>>,
    platform: PlatformFamily,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    load: Option<LoadSlot>,
    switch: SwitchMachine,
    /// Text tracks that have been made visible at least once
    shown: HashSet<TrackId>,
    destroyed: bool,
}

impl NativeAdapter {
    pub fn new(setup: AdapterSetup) -> Self {
        let bound = setup.sources.first().cloned();
        Self {
            sink: setup.sink,
            kind: setup.kind,
            sources: setup.sources,
            bound,
            drm: setup.drm,
            platform: setup.config.platform,
            events: setup.events,
            load: None,
            switch: SwitchMachine::new(),
            shown: HashSet::new(),
            destroyed: false,
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        debug!(event = event.name(), "Playback event");
        if self.events.send(event).is_err() {
            debug!("No listener for playback events");
        }
    }

    fn settle_load(&self, result: crate::Result<()>) {
        let Some(slot) = &self.load else { return };
        if !slot.handle.is_pending() {
            return;
        }
        match result {
            Ok(()) => {
                let tracks = self.tracks();
                info!(
                    video = tracks.video.len(),
                    audio = tracks.audio.len(),
                    text = tracks.text.len(),
                    "Load complete"
                );
                slot.resolver.resolve(tracks);
            }
            Err(e) => {
                warn!(error = %e, "Load failed");
                slot.resolver.reject(e);
            }
        }
    }

    fn apply(&mut self, action: SwitchAction) {
        match action {
            SwitchAction::Seek(position) => {
                debug!(position, "Restoring position after rendition switch");
                if let Err(e) = self.sink.set_current_time(position) {
                    // No seeked will follow and the position is unconfirmed;
                    // nothing is restored and no event is emitted
                    if let Some((target, _)) = self.switch.cancel() {
                        warn!(target = %target, error = %e, "Rendition switch aborted: post-switch seek failed");
                    }
                }
            }
            SwitchAction::Finish { target, resume } => self.finish_switch(target, resume),
            SwitchAction::Abort { target, error } => {
                warn!(target = %target, error = %error, "Rendition switch aborted");
            }
        }
    }

    fn finish_switch(&mut self, target: TrackId, resume: Resume) {
        if resume.paused {
            self.sink.pause();
        } else if let Err(e) = self.sink.play() {
            warn!(error = %e, "Could not resume playback after switch");
        }

        info!(
            target = %target,
            position = self.sink.current_time(),
            "Rendition switch complete"
        );

        if let Some(track) = self.video_tracks().into_iter().find(|t| t.id() == &target) {
            self.emit(PlaybackEvent::VideoTrackChanged { track });
        }
    }

    fn switch_progressive(&mut self, target: &VideoTrack) -> crate::Result<()> {
        if self.switch.is_in_flight() {
            return Err(Error::SwitchInProgress);
        }
        if target.is_active() {
            debug!(track = %target.id(), "Variant already bound");
            return Ok(());
        }
        let Some(source) = self
            .sources
            .iter()
            .find(|s| s.id == target.id().as_str())
            .cloned()
        else {
            return Ok(());
        };

        let resume = Resume {
            position: self.sink.current_time(),
            paused: self.sink.paused(),
        };
        self.switch.begin(target.id().clone(), resume)?;

        info!(
            from = ?self.bound.as_ref().map(|s| s.id.as_str()),
            to = %source.id,
            position = resume.position,
            paused = resume.paused,
            "Switching progressive rendition"
        );

        self.sink.set_source(&source.url);
        self.bound = Some(source);
        self.sink.load();
        Ok(())
    }

    fn switch_adaptive(&mut self, target: &VideoTrack) {
        let count = self.sink.video_tracks().len();
        for index in 0..count {
            if index != target.index() {
                self.sink.set_video_track_selected(index, false);
            }
        }
        self.sink.set_video_track_selected(target.index(), true);

        if let Some(track) = self.video_tracks().into_iter().find(|t| t.id() == target.id()) {
            self.emit(PlaybackEvent::VideoTrackChanged { track });
        }
    }
}

impl PlaybackAdapter for NativeAdapter {
    fn name(&self) -> &'static str {
        "native"
    }

    fn source_kind(&self) -> SourceKind {
        self.kind
    }

    fn bound_source(&self) -> Option<&SourceDescriptor> {
        self.bound.as_ref()
    }

    #[instrument(skip(self), fields(kind = ?self.kind))]
    fn load(&mut self, start_time: Option<f64>) -> LoadHandle {
        if let Some(slot) = &self.load {
            debug!("Load already requested");
            return slot.handle.clone();
        }
        if self.destroyed {
            return LoadHandle::failed(Error::Destroyed);
        }

        let (handle, resolver) = LoadHandle::pending();
        self.load = Some(LoadSlot {
            handle: handle.clone(),
            resolver,
        });

        if self.kind == SourceKind::Progressive {
            let viewport = self.sink.viewport_size();
            if let Some(best) = best_fit(&self.sources, viewport) {
                if self.bound.as_ref().map(|s| &s.id) != Some(&best.id) {
                    info!(source = %best.id, viewport = ?viewport, "Best-fit variant selected");
                    self.bound = Some(best.clone());
                }
            }
        }

        let Some(source) = self.bound.clone() else {
            self.settle_load(Err(Error::InvalidSource("source list is empty".into())));
            return handle;
        };

        self.sink.set_source(&source.url);

        if let (Some(drm), Some(protocol)) = (&source.drm, self.drm.as_mut()) {
            if let Err(e) = protocol.set_drm_playback(&self.sink, drm) {
                self.settle_load(Err(e));
                return handle;
            }
        }

        let mode = match self.kind {
            SourceKind::Progressive => AbrMode::Manual,
            SourceKind::Adaptive => AbrMode::Auto,
        };
        self.emit(PlaybackEvent::AbrModeChanged { mode });

        if let Some(position) = start_time {
            if let Err(e) = self.sink.set_current_time(position) {
                warn!(position, error = %e, "Could not set start position");
            }
        }

        info!(source = %source.id, url = %source.url, "Loading");
        self.sink.load();
        handle
    }

    fn reset_load(&mut self) -> bool {
        match &self.load {
            Some(slot) if !slot.handle.is_pending() => {
                self.load = None;
                true
            }
            _ => false,
        }
    }

    fn handle_signal(&mut self, signal: &SinkSignal) {
        if self.destroyed {
            return;
        }

        match signal {
            SinkSignal::LoadedData => self.settle_load(Ok(())),
            SinkSignal::Error(error) => self.settle_load(Err(Error::Media(error.clone()))),
            _ => {}
        }

        if let Some(action) = self.switch.on_signal(signal, self.platform) {
            self.apply(action);
        }
    }

    fn video_tracks(&self) -> Vec<VideoTrack> {
        match self.kind {
            SourceKind::Progressive => {
                let bound = self.bound.as_ref().map(|s| s.id.as_str());
                self.sources
                    .iter()
                    .enumerate()
                    .map(|(index, source)| VideoTrack {
                        info: TrackInfo::new(source.id.as_str(), index, Some(source.id.as_str()) == bound),
                        bandwidth: source.bandwidth,
                        width: source.width,
                        height: source.height,
                    })
                    .collect()
            }
            SourceKind::Adaptive => {
                let platform = self.sink.video_tracks();
                let ids = enumeration_ids("video", platform.iter().map(|t| t.id.as_str()));
                platform
                    .into_iter()
                    .zip(ids)
                    .enumerate()
                    .map(|(index, (track, id))| VideoTrack {
                        info: TrackInfo {
                            id,
                            index,
                            active: track.selected,
                            label: track.label,
                            language: track.language,
                        },
                        bandwidth: track.bandwidth,
                        width: track.width,
                        height: track.height,
                    })
                    .collect()
            }
        }
    }

    fn audio_tracks(&self) -> Vec<AudioTrack> {
        let platform = self.sink.audio_tracks();
        let ids = enumeration_ids("audio", platform.iter().map(|t| t.id.as_str()));
        platform
            .into_iter()
            .zip(ids)
            .enumerate()
            .map(|(index, (track, id))| {
                AudioTrack::new(TrackInfo {
                    id,
                    index,
                    active: track.enabled,
                    label: track.label,
                    language: track.language,
                })
            })
            .collect()
    }

    fn text_tracks(&self) -> Vec<TextTrack> {
        let platform = self.sink.text_tracks();
        let ids = enumeration_ids("text", platform.iter().map(|t| t.id.as_str()));
        platform
            .into_iter()
            .zip(ids)
            .enumerate()
            .map(|(index, (track, id))| {
                let shown = self.shown.contains(&id);
                let mut text = TextTrack::new(
                    TrackInfo {
                        id,
                        index,
                        active: track.mode.is_decoding(),
                        label: track.label,
                        language: track.language,
                    },
                    TextTrackKind::parse(&track.kind),
                );
                text.shown = shown;
                text
            })
            .collect()
    }

    #[instrument(skip(self, track), fields(track = %track.id()))]
    fn select_video_track(&mut self, track: &VideoTrack) -> crate::Result<()> {
        if self.destroyed {
            return Ok(());
        }
        if self.kind == SourceKind::Progressive && self.switch.is_in_flight() {
            return Err(Error::SwitchInProgress);
        }

        let Some(target) = self.video_tracks().into_iter().find(|t| t.id() == track.id()) else {
            debug!("Unknown video track, ignoring");
            return Ok(());
        };
        if target.index() != track.index() {
            debug!(stale = track.index(), current = target.index(), "Video track moved");
        }

        match self.kind {
            SourceKind::Progressive => self.switch_progressive(&target),
            SourceKind::Adaptive => {
                self.switch_adaptive(&target);
                Ok(())
            }
        }
    }

    #[instrument(skip(self, track), fields(track = %track.id()))]
    fn select_audio_track(&mut self, track: &AudioTrack) {
        if self.destroyed {
            return;
        }
        let tracks = self.audio_tracks();
        let Some(target) = tracks.iter().find(|t| t.id() == track.id()) else {
            debug!("Unknown audio track, ignoring");
            return;
        };

        for other in tracks.iter().filter(|t| t.index() != target.index()) {
            self.sink.set_audio_track_enabled(other.index(), false);
        }
        self.sink.set_audio_track_enabled(target.index(), true);

        if let Some(track) = self.audio_tracks().into_iter().find(|t| t.id() == track.id()) {
            self.emit(PlaybackEvent::AudioTrackChanged { track });
        }
    }

    #[instrument(skip(self, track), fields(track = %track.id()))]
    fn select_text_track(&mut self, track: &TextTrack) {
        if self.destroyed {
            return;
        }
        let tracks = self.text_tracks();
        let Some(target) = tracks.iter().find(|t| t.id() == track.id()) else {
            debug!("Unknown text track, ignoring");
            return;
        };
        if !target.kind.is_selectable() {
            debug!(kind = %target.kind, "Text track kind is not selectable");
            return;
        }

        for other in tracks.iter().filter(|t| t.index() != target.index()) {
            self.sink.set_text_track_mode(other.index(), TextTrackMode::Disabled);
        }

        // Some platforms only start decoding cues once a track has been
        // showing; after that, hidden is enough.
        if self.shown.insert(target.id().clone()) {
            self.sink.set_text_track_mode(target.index(), TextTrackMode::Showing);
        }
        self.sink.set_text_track_mode(target.index(), TextTrackMode::Hidden);

        if let Some(track) = self.text_tracks().into_iter().find(|t| t.id() == track.id()) {
            self.emit(PlaybackEvent::TextTrackChanged { track });
        }
    }

    fn hide_text_track(&mut self) {
        for index in 0..self.sink.text_tracks().len() {
            self.sink.set_text_track_mode(index, TextTrackMode::Disabled);
        }
    }

    fn sync_cues(&mut self, track: &TrackId) {
        if self.destroyed {
            return;
        }
        let Some(target) = self.text_tracks().into_iter().find(|t| t.id() == track) else {
            return;
        };
        if !target.is_active() {
            return;
        }

        let cues = normalize_all(&self.sink.active_cues(target.index()));
        debug!(track = %track, cues = cues.len(), "Active cues changed");
        self.emit(PlaybackEvent::TextCueChanged { cues });
    }

    fn switch_state(&self) -> SwitchState {
        self.switch.state().clone()
    }

    fn is_live(&self) -> bool {
        self.sink.duration() == f64::INFINITY
    }

    fn live_edge(&self) -> f64 {
        self.sink
            .seekable()
            .last_end()
            .or_else(|| self.sink.buffered().last_end())
            .unwrap_or_else(|| self.sink.duration())
    }

    fn seek_to_live_edge(&mut self) {
        let edge = self.live_edge();
        if let Err(e) = self.sink.set_current_time(edge) {
            debug!(edge, error = %e, "Seek to live edge failed");
        }
    }

    fn duration(&self) -> f64 {
        if self.is_live() {
            self.live_edge()
        } else {
            self.sink.duration()
        }
    }

    fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        self.switch.cancel();
        // Dropping the resolver aborts anyone still waiting
        self.load = None;
        if let Some(mut drm) = self.drm.take() {
            drm.destroy();
        }
        self.sources.clear();
        self.bound = None;
        self.shown.clear();

        info!("Native adapter destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cue::PlatformCue;
    use crate::sink::{MemorySink, PlatformAudioTrack, PlatformTextTrack, PlatformVideoTrack};
    use crate::types::{MediaError, MediaErrorCode, TimeRanges};
    use std::sync::Arc;
    use tokio::sync::broadcast;
    use url::Url;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://cdn.example.com/{path}")).unwrap()
    }

    fn variants() -> Vec<SourceDescriptor> {
        vec![
            SourceDescriptor::progressive("hd", url("hd.mp4"), 1280, 720),
            SourceDescriptor::progressive("sd", url("sd.mp4"), 640, 360),
        ]
    }

    struct Fixture {
        sink: Arc<MemorySink>,
        signals: broadcast::Receiver<SinkSignal>,
        events: mpsc::UnboundedReceiver<PlaybackEvent>,
        adapter: NativeAdapter,
    }

    impl Fixture {
        fn new(sink: MemorySink, sources: Vec<SourceDescriptor>, config: EngineConfig) -> Self {
            let sink = Arc::new(sink);
            let signals = sink.subscribe();
            let (tx, events) = mpsc::unbounded_channel();
            let kind = sources[0].kind();
            let adapter = NativeAdapter::new(AdapterSetup {
                sink: sink.clone(),
                sources,
                kind,
                drm: None,
                config,
                events: tx,
            });
            Self {
                sink,
                signals,
                events,
                adapter,
            }
        }

        fn pump(&mut self) {
            while let Ok(signal) = self.signals.try_recv() {
                self.adapter.handle_signal(&signal);
            }
        }

        fn drain_events(&mut self) -> Vec<PlaybackEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                events.push(event);
            }
            events
        }
    }

    fn subtitles(id: &str) -> PlatformTextTrack {
        PlatformTextTrack {
            id: id.into(),
            kind: "subtitles".into(),
            label: None,
            language: Some("en".into()),
            mode: TextTrackMode::Disabled,
        }
    }

    #[test]
    fn test_load_is_coalesced() {
        let mut fx = Fixture::new(MemorySink::new(), variants(), EngineConfig::default());

        let first = fx.adapter.load(None);
        let second = fx.adapter.load(None);
        assert_eq!(first, second);
        assert_eq!(fx.sink.load_count(), 1);

        fx.pump();
        let tracks = first.outcome().unwrap().unwrap();
        assert_eq!(tracks.video.len(), 2);
        assert_eq!(fx.adapter.load(None), first);

        assert!(fx.adapter.reset_load());
        assert_ne!(fx.adapter.load(None), first);
        assert_eq!(fx.sink.load_count(), 2);
    }

    #[test]
    fn test_reset_keeps_pending_load() {
        let mut fx = Fixture::new(MemorySink::new(), variants(), EngineConfig::default());
        fx.adapter.load(None);
        assert!(!fx.adapter.reset_load());
    }

    #[test]
    fn test_best_fit_on_load() {
        let sources = vec![
            SourceDescriptor::progressive("sd", url("sd.mp4"), 640, 360),
            SourceDescriptor::progressive("hd", url("hd.mp4"), 1280, 720),
            SourceDescriptor::progressive("uhd", url("uhd.mp4"), 3840, 2160),
        ];
        let mut fx = Fixture::new(MemorySink::new().with_viewport(1920, 1080), sources, EngineConfig::default());
        fx.adapter.load(None);

        assert_eq!(fx.adapter.bound_source().unwrap().id, "hd");
        assert_eq!(fx.sink.source(), Some(url("hd.mp4")));
        assert_eq!(
            fx.drain_events(),
            vec![PlaybackEvent::AbrModeChanged { mode: AbrMode::Manual }]
        );
    }

    #[test]
    fn test_start_position() {
        let mut fx = Fixture::new(MemorySink::new(), variants(), EngineConfig::default());
        let handle = fx.adapter.load(Some(42.0));
        fx.pump();
        assert!(handle.outcome().unwrap().is_ok());
        assert_eq!(fx.sink.current_time(), 42.0);
    }

    #[test]
    fn test_load_error_rejects() {
        let mut fx = Fixture::new(MemorySink::new(), variants(), EngineConfig::default());
        fx.sink.fail_next_load(MediaError::new(MediaErrorCode::SrcNotSupported, "nope"));
        let handle = fx.adapter.load(None);
        fx.pump();
        assert!(matches!(handle.outcome(), Some(Err(Error::Media(_)))));
    }

    #[test]
    fn test_progressive_switch() {
        let mut fx = Fixture::new(MemorySink::new(), variants(), EngineConfig::default());
        fx.adapter.load(None);
        fx.pump();
        fx.sink.set_current_time(12.5).unwrap();
        fx.sink.play().unwrap();
        fx.pump();
        fx.drain_events();

        let sd = fx.adapter.video_tracks()[1].clone();
        fx.adapter.select_video_track(&sd).unwrap();
        assert!(matches!(fx.adapter.switch_state(), SwitchState::AwaitingLoad { .. }));

        fx.pump();
        assert!(matches!(fx.adapter.switch_state(), SwitchState::Complete { .. }));
        assert!((fx.sink.current_time() - 12.5).abs() < 0.5);
        assert!(!fx.sink.paused());

        let events = fx.drain_events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            PlaybackEvent::VideoTrackChanged { track } => {
                assert_eq!(track.id().as_str(), "sd");
                assert!(track.is_active());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_switch_keeps_paused() {
        let mut fx = Fixture::new(MemorySink::new(), variants(), EngineConfig::default());
        fx.adapter.load(None);
        fx.pump();

        let sd = fx.adapter.video_tracks()[1].clone();
        fx.adapter.select_video_track(&sd).unwrap();
        fx.pump();
        assert!(fx.sink.paused());
    }

    #[test]
    fn test_concurrent_switch_rejected() {
        let mut fx = Fixture::new(MemorySink::new(), variants(), EngineConfig::default());
        fx.adapter.load(None);
        fx.pump();

        let tracks = fx.adapter.video_tracks();
        fx.adapter.select_video_track(&tracks[1]).unwrap();
        let err = fx.adapter.select_video_track(&tracks[0]).unwrap_err();
        assert!(matches!(err, Error::SwitchInProgress));
    }

    #[test]
    fn test_select_unknown_or_active_is_noop() {
        let mut fx = Fixture::new(MemorySink::new(), variants(), EngineConfig::default());
        fx.adapter.load(None);
        fx.pump();
        fx.drain_events();

        let hd = fx.adapter.video_tracks()[0].clone();
        fx.adapter.select_video_track(&hd).unwrap();

        let ghost = VideoTrack::new(TrackInfo::new("ghost", 9, false));
        fx.adapter.select_video_track(&ghost).unwrap();

        assert_eq!(fx.sink.load_count(), 1);
        assert!(fx.drain_events().is_empty());
    }

    #[test]
    fn test_safari_switch_waits_for_duration() {
        let config = EngineConfig {
            platform: PlatformFamily::Safari,
            ..Default::default()
        };
        let mut fx = Fixture::new(MemorySink::new(), variants(), config);
        fx.adapter.load(None);
        fx.pump();
        fx.sink.set_current_time(8.0).unwrap();
        fx.pump();

        let sd = fx.adapter.video_tracks()[1].clone();
        fx.adapter.select_video_track(&sd).unwrap();
        fx.pump();

        assert!(matches!(fx.adapter.switch_state(), SwitchState::Complete { .. }));
        assert_eq!(fx.sink.current_time(), 8.0);
    }

    #[test]
    fn test_adaptive_selection_by_id() {
        let renditions = vec![
            PlatformVideoTrack {
                id: "v720".into(),
                label: None,
                language: None,
                selected: true,
                bandwidth: Some(3_000_000),
                width: Some(1280),
                height: Some(720),
            },
            PlatformVideoTrack {
                id: "v360".into(),
                label: None,
                language: None,
                selected: false,
                bandwidth: Some(800_000),
                width: Some(640),
                height: Some(360),
            },
        ];
        let sources = vec![SourceDescriptor::new(
            "main",
            url("main.m3u8"),
            "application/x-mpegurl",
        )];
        let mut fx = Fixture::new(MemorySink::new().with_video_tracks(renditions), sources, EngineConfig::default());
        fx.adapter.load(None);
        fx.pump();
        assert_eq!(
            fx.drain_events(),
            vec![PlaybackEvent::AbrModeChanged { mode: AbrMode::Auto }]
        );

        let v360 = fx.adapter.video_tracks()[1].clone();
        // The platform list shifts before the selection lands
        fx.sink.insert_video_track(
            0,
            PlatformVideoTrack {
                id: "v1080".into(),
                label: None,
                language: None,
                selected: false,
                bandwidth: None,
                width: Some(1920),
                height: Some(1080),
            },
        );
        fx.adapter.select_video_track(&v360).unwrap();

        let active: Vec<_> = fx.adapter.video_tracks().into_iter().filter(|t| t.is_active()).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id().as_str(), "v360");
        assert_eq!(active[0].index(), 2);
    }

    #[test]
    fn test_text_track_shown_once() {
        let sink = MemorySink::new().with_text_tracks(vec![subtitles("en"), subtitles("fr")]);
        let mut fx = Fixture::new(sink, variants(), EngineConfig::default());
        fx.adapter.load(None);
        fx.pump();

        let tracks = fx.adapter.text_tracks();
        fx.adapter.select_text_track(&tracks[0]);
        fx.adapter.select_text_track(&tracks[1]);
        fx.adapter.select_text_track(&tracks[0]);

        let en: Vec<TextTrackMode> = fx
            .sink
            .text_mode_history()
            .into_iter()
            .filter(|(index, _)| *index == 0)
            .map(|(_, mode)| mode)
            .collect();
        assert_eq!(
            en,
            vec![
                TextTrackMode::Showing,
                TextTrackMode::Hidden,
                TextTrackMode::Disabled,
                TextTrackMode::Hidden,
            ]
        );

        let active = fx.adapter.active_text_track().unwrap();
        assert_eq!(active.id().as_str(), "en");
        assert!(active.shown);
    }

    #[test]
    fn test_failed_restore_seek_aborts_switch() {
        let mut fx = Fixture::new(MemorySink::new(), variants(), EngineConfig::default());
        fx.adapter.load(None);
        fx.pump();
        fx.sink.set_current_time(12.5).unwrap();
        fx.sink.play().unwrap();
        fx.pump();
        fx.drain_events();

        fx.sink.fail_seeks(true);
        let sd = fx.adapter.video_tracks()[1].clone();
        fx.adapter.select_video_track(&sd).unwrap();
        fx.pump();

        assert_eq!(fx.adapter.switch_state(), SwitchState::Idle);
        assert!(fx.sink.paused());
        assert!(fx.drain_events().is_empty());
        assert_eq!(fx.adapter.bound_source().unwrap().id, "sd");

        // A later switch is not blocked
        fx.sink.fail_seeks(false);
        let hd = fx.adapter.video_tracks()[0].clone();
        fx.adapter.select_video_track(&hd).unwrap();
        fx.pump();
        assert!(matches!(fx.adapter.switch_state(), SwitchState::Complete { .. }));
    }

    #[test]
    fn test_text_tracks_without_ids() {
        let mut en = subtitles("");
        en.language = Some("en".into());
        let mut fr = subtitles("");
        fr.language = Some("fr".into());
        let mut fx = Fixture::new(MemorySink::new().with_text_tracks(vec![en, fr]), variants(), EngineConfig::default());

        let tracks = fx.adapter.text_tracks();
        assert_ne!(tracks[0].id(), tracks[1].id());

        fx.adapter.select_text_track(&tracks[1]);
        let after = fx.adapter.text_tracks();
        assert!(!after[0].is_active());
        assert!(after[1].is_active());
        assert!(after[1].shown);
        assert!(!after[0].shown);

        // First activation of the other track still goes through showing
        fx.adapter.select_text_track(&tracks[0]);
        let showing: Vec<usize> = fx
            .sink
            .text_mode_history()
            .into_iter()
            .filter(|(_, mode)| *mode == TextTrackMode::Showing)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(showing, vec![1, 0]);
    }

    #[test]
    fn test_audio_tracks_without_ids() {
        let audio = |language: &str, enabled: bool| PlatformAudioTrack {
            id: String::new(),
            label: None,
            language: Some(language.into()),
            enabled,
        };
        let sink = MemorySink::new().with_audio_tracks(vec![audio("en", true), audio("de", false)]);
        let mut fx = Fixture::new(sink, variants(), EngineConfig::default());

        let tracks = fx.adapter.audio_tracks();
        fx.adapter.select_audio_track(&tracks[1]);

        let enabled: Vec<(Option<String>, bool)> = fx
            .adapter
            .audio_tracks()
            .into_iter()
            .map(|t| (t.info.language.clone(), t.is_enabled()))
            .collect();
        assert_eq!(
            enabled,
            vec![(Some("en".into()), false), (Some("de".into()), true)]
        );
        match fx.drain_events().as_slice() {
            [PlaybackEvent::AudioTrackChanged { track }] => assert_eq!(track.index(), 1),
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn test_adaptive_repeated_ids() {
        let rendition = |selected: bool, height: u32| PlatformVideoTrack {
            id: "v".into(),
            label: None,
            language: None,
            selected,
            bandwidth: None,
            width: None,
            height: Some(height),
        };
        let sink = MemorySink::new().with_video_tracks(vec![rendition(true, 720), rendition(false, 360)]);
        let sources = vec![SourceDescriptor::new("main", url("main.m3u8"), "application/x-mpegurl")];
        let mut fx = Fixture::new(sink, sources, EngineConfig::default());

        let tracks = fx.adapter.video_tracks();
        assert_ne!(tracks[0].id(), tracks[1].id());
        fx.adapter.select_video_track(&tracks[1]).unwrap();

        let active: Vec<bool> = fx.adapter.video_tracks().iter().map(|t| t.is_active()).collect();
        assert_eq!(active, vec![false, true]);
    }

    #[test]
    fn test_metadata_track_not_selectable() {
        let mut metadata = subtitles("meta");
        metadata.kind = "metadata".into();
        let mut fx = Fixture::new(MemorySink::new().with_text_tracks(vec![metadata]), variants(), EngineConfig::default());

        let track = fx.adapter.text_tracks()[0].clone();
        fx.adapter.select_text_track(&track);
        assert!(fx.sink.text_mode_history().is_empty());
    }

    #[test]
    fn test_cue_sync_emits_one_batch() {
        let sink = MemorySink::new().with_text_tracks(vec![subtitles("en")]);
        let mut fx = Fixture::new(sink, variants(), EngineConfig::default());
        let track = fx.adapter.text_tracks()[0].clone();
        fx.adapter.select_text_track(&track);
        fx.drain_events();

        fx.sink.set_active_cues(
            0,
            vec![
                PlatformCue::Vtt {
                    start_time: 1.0,
                    end_time: 2.0,
                    text: "one".into(),
                },
                PlatformCue::Data {
                    start_time: 1.5,
                    end_time: 3.0,
                    payload: bytes::Bytes::from_static(b"two\0"),
                },
                PlatformCue::Vtt {
                    start_time: 1.8,
                    end_time: 4.0,
                    text: "three".into(),
                },
            ],
        );
        fx.adapter.sync_cues(track.id());

        let events = fx.drain_events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            PlaybackEvent::TextCueChanged { cues } => {
                let texts: Vec<_> = cues.iter().map(|c| c.text.as_str()).collect();
                assert_eq!(texts, vec!["one", "two", "three"]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_live_edge() {
        let mut fx = Fixture::new(MemorySink::new().with_media_duration(f64::INFINITY), variants(), EngineConfig::default());
        fx.adapter.load(None);
        fx.pump();
        assert!(fx.adapter.is_live());

        fx.sink.set_buffered(TimeRanges::new(vec![(0.0, 80.0)]));
        assert_eq!(fx.adapter.live_edge(), 80.0);

        fx.sink.set_seekable(TimeRanges::new(vec![(0.0, 50.0), (60.0, 100.0)]));
        assert_eq!(fx.adapter.live_edge(), 100.0);
        assert_eq!(fx.adapter.duration(), 100.0);

        fx.adapter.seek_to_live_edge();
        assert_eq!(fx.sink.current_time(), 100.0);

        fx.sink.fail_seeks(true);
        fx.adapter.seek_to_live_edge();
    }

    #[tokio::test]
    async fn test_destroy_aborts_pending_load() {
        let mut fx = Fixture::new(MemorySink::new(), variants(), EngineConfig::default());
        let handle = fx.adapter.load(None);
        fx.adapter.destroy();
        fx.adapter.destroy();

        assert!(matches!(handle.wait().await, Err(Error::LoadAborted)));
        assert!(fx.adapter.bound_source().is_none());
        fx.pump();
        assert!(matches!(fx.adapter.load(None).outcome(), Some(Err(Error::Destroyed))));
    }
}
