//! In-memory sink
//!
//! A scriptable [`MediaSink`] that behaves like a well-mannered platform
//! player without decoding anything. Loads complete synchronously by emitting
//! `loadedmetadata`, `loadeddata` and `durationchange` (in that order), seeks
//! emit `seeking` and `seeked`. Used by the test suites and the CLI simulator.

use super::{
    MediaKeys, MediaSink, PlatformAudioTrack, PlatformTextTrack, PlatformVideoTrack, ReadyState,
    SinkProperties, SinkSignal, TextTrackMode,
};
use crate::cue::PlatformCue;
use crate::error::{Error, Result};
use crate::types::{CanPlay, DrmSystem, MediaError, Resolution, TimeRanges};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::debug;
use url::Url;

/// Signal channel capacity
const SIGNAL_CAPACITY: usize = 256;

#[derive(Debug)]
struct State {
    current_time: f64,
    duration: f64,
    /// Duration reported once a load completes
    media_duration: f64,
    paused: bool,
    seeking: bool,
    ended: bool,
    error: Option<MediaError>,
    ready_state: ReadyState,
    properties: SinkProperties,
    source: Option<Url>,
    viewport: Resolution,
    supported_types: HashMap<String, CanPlay>,
    probe_fault: bool,
    video_tracks: Vec<PlatformVideoTrack>,
    audio_tracks: Vec<PlatformAudioTrack>,
    text_tracks: Vec<PlatformTextTrack>,
    active_cues: HashMap<usize, Vec<PlatformCue>>,
    text_mode_history: Vec<(usize, TextTrackMode)>,
    seekable: TimeRanges,
    buffered: TimeRanges,
    played: TimeRanges,
    key_systems: Vec<DrmSystem>,
    media_keys: Option<MediaKeys>,
    fail_next_load: Option<MediaError>,
    fail_seeks: bool,
    load_count: usize,
    seek_log: Vec<f64>,
    released: bool,
}

impl Default for State {
    fn default() -> Self {
        let supported_types = [
            ("video/mp4", CanPlay::Probably),
            ("application/x-mpegurl", CanPlay::Maybe),
            ("application/vnd.apple.mpegurl", CanPlay::Maybe),
        ]
        .into_iter()
        .map(|(mime, answer)| (mime.to_string(), answer))
        .collect();

        Self {
            current_time: 0.0,
            duration: f64::NAN,
            media_duration: 60.0,
            paused: true,
            seeking: false,
            ended: false,
            error: None,
            ready_state: ReadyState::HaveNothing,
            properties: SinkProperties::default(),
            source: None,
            viewport: Resolution::new(1280, 720),
            supported_types,
            probe_fault: false,
            video_tracks: Vec::new(),
            audio_tracks: Vec::new(),
            text_tracks: Vec::new(),
            active_cues: HashMap::new(),
            text_mode_history: Vec::new(),
            seekable: TimeRanges::default(),
            buffered: TimeRanges::default(),
            played: TimeRanges::default(),
            key_systems: vec![
                DrmSystem::Widevine,
                DrmSystem::PlayReady,
                DrmSystem::FairPlay,
                DrmSystem::ClearKey,
            ],
            media_keys: None,
            fail_next_load: None,
            fail_seeks: false,
            load_count: 0,
            seek_log: Vec::new(),
            released: false,
        }
    }
}

/// Scriptable in-memory platform sink
pub struct MemorySink {
    state: Mutex<State>,
    signals: broadcast::Sender<SinkSignal>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            signals,
        }
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// Rendered size of the playback surface
    pub fn with_viewport(self, width: u32, height: u32) -> Self {
        self.state.lock().viewport = Resolution::new(width, height);
        self
    }

    /// Duration reported after a successful load (`f64::INFINITY` for live)
    pub fn with_media_duration(self, duration: f64) -> Self {
        self.state.lock().media_duration = duration;
        self
    }

    /// Answer for a `can_play_type` probe
    pub fn with_supported_type(self, mimetype: &str, answer: CanPlay) -> Self {
        self.state
            .lock()
            .supported_types
            .insert(mimetype.to_ascii_lowercase(), answer);
        self
    }

    /// Key systems the platform accepts media keys for
    pub fn with_key_systems(self, systems: Vec<DrmSystem>) -> Self {
        self.state.lock().key_systems = systems;
        self
    }

    pub fn with_video_tracks(self, tracks: Vec<PlatformVideoTrack>) -> Self {
        self.state.lock().video_tracks = tracks;
        self
    }

    pub fn with_audio_tracks(self, tracks: Vec<PlatformAudioTrack>) -> Self {
        self.state.lock().audio_tracks = tracks;
        self
    }

    pub fn with_text_tracks(self, tracks: Vec<PlatformTextTrack>) -> Self {
        self.state.lock().text_tracks = tracks;
        self
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Emit a signal as if the platform fired it
    pub fn emit(&self, signal: SinkSignal) {
        debug!(signal = signal.name(), "memory sink signal");
        let _ = self.signals.send(signal);
    }

    /// Make the next `load()` fail with `error`
    pub fn fail_next_load(&self, error: MediaError) {
        self.state.lock().fail_next_load = Some(error);
    }

    /// Make seeks fail
    pub fn fail_seeks(&self, fail: bool) {
        self.state.lock().fail_seeks = fail;
    }

    /// Make `can_play_type` probes fault
    pub fn fail_probes(&self, fail: bool) {
        self.state.lock().probe_fault = fail;
    }

    pub fn set_seekable(&self, ranges: TimeRanges) {
        self.state.lock().seekable = ranges;
    }

    pub fn set_buffered(&self, ranges: TimeRanges) {
        self.state.lock().buffered = ranges;
    }

    pub fn set_played(&self, ranges: TimeRanges) {
        self.state.lock().played = ranges;
    }

    /// Replace the active cues of the text track at `index`
    pub fn set_active_cues(&self, index: usize, cues: Vec<PlatformCue>) {
        self.state.lock().active_cues.insert(index, cues);
    }

    /// Insert a video track at `position`, shifting later indices
    pub fn insert_video_track(&self, position: usize, track: PlatformVideoTrack) {
        let mut state = self.state.lock();
        let position = position.min(state.video_tracks.len());
        state.video_tracks.insert(position, track);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Number of platform loads triggered
    pub fn load_count(&self) -> usize {
        self.state.lock().load_count
    }

    /// Every successful seek target, in order
    pub fn seek_log(&self) -> Vec<f64> {
        self.state.lock().seek_log.clone()
    }

    /// Every mode assignment, in order
    pub fn text_mode_history(&self) -> Vec<(usize, TextTrackMode)> {
        self.state.lock().text_mode_history.clone()
    }

    /// Media keys currently attached
    pub fn media_keys(&self) -> Option<MediaKeys> {
        self.state.lock().media_keys.clone()
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    /// Number of live signal subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.signals.receiver_count()
    }
}

impl MediaSink for MemorySink {
    fn current_time(&self) -> f64 {
        self.state.lock().current_time
    }

    fn set_current_time(&self, time: f64) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.fail_seeks {
                return Err(Error::sink("seek rejected"));
            }
            if state.released || state.source.is_none() {
                return Err(Error::sink("no media attached"));
            }
            state.seek_log.push(time);
            if state.ready_state == ReadyState::HaveNothing {
                // Becomes the start position of the pending load
                state.current_time = time;
                return Ok(());
            }
            state.current_time = time;
            state.ended = false;
        }
        self.emit(SinkSignal::Seeking);
        self.emit(SinkSignal::Seeked);
        self.emit(SinkSignal::TimeUpdate);
        Ok(())
    }

    fn duration(&self) -> f64 {
        self.state.lock().duration
    }

    fn paused(&self) -> bool {
        self.state.lock().paused
    }

    fn seeking(&self) -> bool {
        self.state.lock().seeking
    }

    fn ended(&self) -> bool {
        self.state.lock().ended
    }

    fn error(&self) -> Option<MediaError> {
        self.state.lock().error.clone()
    }

    fn ready_state(&self) -> ReadyState {
        self.state.lock().ready_state
    }

    fn properties(&self) -> SinkProperties {
        self.state.lock().properties.clone()
    }

    fn set_properties(&self, properties: SinkProperties) {
        let volume_changed = {
            let mut state = self.state.lock();
            let changed = state.properties.volume != properties.volume
                || state.properties.muted != properties.muted;
            state.properties = properties;
            changed
        };
        if volume_changed {
            self.emit(SinkSignal::VolumeChange);
        }
    }

    fn play(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.released {
                return Err(Error::sink("sink released"));
            }
            if !state.paused {
                return Ok(());
            }
            state.paused = false;
        }
        self.emit(SinkSignal::Play);
        self.emit(SinkSignal::Playing);
        Ok(())
    }

    fn pause(&self) {
        {
            let mut state = self.state.lock();
            if state.paused {
                return;
            }
            state.paused = true;
        }
        self.emit(SinkSignal::Pause);
    }

    fn load(&self) {
        let failure = {
            let mut state = self.state.lock();
            state.load_count += 1;
            match state.fail_next_load.take() {
                Some(error) => {
                    state.error = Some(error.clone());
                    Some(error)
                }
                None => {
                    state.error = None;
                    state.ready_state = ReadyState::HaveEnoughData;
                    state.duration = state.media_duration;
                    None
                }
            }
        };

        self.emit(SinkSignal::LoadStart);
        match failure {
            Some(error) => self.emit(SinkSignal::Error(error)),
            None => {
                self.emit(SinkSignal::LoadedMetadata);
                self.emit(SinkSignal::LoadedData);
                self.emit(SinkSignal::DurationChange);
                self.emit(SinkSignal::CanPlay);
            }
        }
    }

    fn source(&self) -> Option<Url> {
        self.state.lock().source.clone()
    }

    fn set_source(&self, url: &Url) {
        let had_source = {
            let mut state = self.state.lock();
            let had_source = state.source.is_some();
            state.source = Some(url.clone());
            state.current_time = 0.0;
            state.duration = f64::NAN;
            state.paused = true;
            state.ended = false;
            state.ready_state = ReadyState::HaveNothing;
            had_source
        };
        if had_source {
            self.emit(SinkSignal::Emptied);
        }
    }

    fn viewport_size(&self) -> Resolution {
        self.state.lock().viewport
    }

    fn can_play_type(&self, mimetype: &str) -> Result<CanPlay> {
        let state = self.state.lock();
        if state.probe_fault {
            return Err(Error::sink("canPlayType probe failed"));
        }
        Ok(state
            .supported_types
            .get(&mimetype.to_ascii_lowercase())
            .copied()
            .unwrap_or(CanPlay::No))
    }

    fn video_tracks(&self) -> Vec<PlatformVideoTrack> {
        self.state.lock().video_tracks.clone()
    }

    fn set_video_track_selected(&self, index: usize, selected: bool) {
        if let Some(track) = self.state.lock().video_tracks.get_mut(index) {
            track.selected = selected;
        }
    }

    fn audio_tracks(&self) -> Vec<PlatformAudioTrack> {
        self.state.lock().audio_tracks.clone()
    }

    fn set_audio_track_enabled(&self, index: usize, enabled: bool) {
        if let Some(track) = self.state.lock().audio_tracks.get_mut(index) {
            track.enabled = enabled;
        }
    }

    fn text_tracks(&self) -> Vec<PlatformTextTrack> {
        self.state.lock().text_tracks.clone()
    }

    fn set_text_track_mode(&self, index: usize, mode: TextTrackMode) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if let Some(track) = state.text_tracks.get_mut(index) {
            track.mode = mode;
            state.text_mode_history.push((index, mode));
        }
    }

    fn active_cues(&self, index: usize) -> Vec<PlatformCue> {
        let state = self.state.lock();
        state
            .text_tracks
            .get(index)
            .filter(|track| track.mode.is_decoding())
            .and_then(|_| state.active_cues.get(&index))
            .cloned()
            .unwrap_or_default()
    }

    fn seekable(&self) -> TimeRanges {
        self.state.lock().seekable.clone()
    }

    fn buffered(&self) -> TimeRanges {
        self.state.lock().buffered.clone()
    }

    fn played(&self) -> TimeRanges {
        self.state.lock().played.clone()
    }

    fn set_media_keys(&self, keys: MediaKeys) -> Result<()> {
        let mut state = self.state.lock();
        if !state.key_systems.contains(&keys.system) {
            return Err(Error::DrmNotSupported {
                system: keys.system.to_string(),
            });
        }
        state.media_keys = Some(keys);
        Ok(())
    }

    fn clear_media_keys(&self) {
        self.state.lock().media_keys = None;
    }

    fn subscribe(&self) -> broadcast::Receiver<SinkSignal> {
        self.signals.subscribe()
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.paused = true;
        state.source = None;
        state.media_keys = None;
        state.ready_state = ReadyState::HaveNothing;
        state.released = true;
    }
}
