//! Playback adapters
//!
//! An adapter binds a source list to a sink: it performs the load, maps
//! platform track lists into [`TrackSnapshot`]s, handles track selection,
//! and turns platform signals into [`PlaybackEvent`]s.
//!
//! Adapters never read the sink's signal stream themselves. The engine pumps
//! signals and hands each one to [`PlaybackAdapter::handle_signal`], so all
//! adapter state is touched from a single task.

pub mod native;
pub mod switch;

pub use native::{NativeAdapter, NativeAdapterFactory};
pub use switch::{Resume, SwitchAction, SwitchMachine, SwitchState};

use crate::config::EngineConfig;
use crate::drm::DrmProtocol;
use crate::error::{Error, Result};
use crate::events::PlaybackEvent;
use crate::sink::{MediaSink, SharedSink, SinkSignal};
use crate::source::{SourceDescriptor, SourceKind};
use crate::track::{AudioTrack, TextTrack, TrackId, TrackSnapshot, VideoTrack};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

// =============================================================================
// Load handle
// =============================================================================

/// Progress of a load
#[derive(Debug, Clone)]
pub enum LoadState {
    Pending,
    Loaded(TrackSnapshot),
    Failed(Error),
}

/// Shared handle to one load.
///
/// Every caller asking for the same load gets a clone of the same handle;
/// equality is identity.
#[derive(Debug, Clone)]
pub struct LoadHandle {
    id: Uuid,
    rx: watch::Receiver<LoadState>,
}

impl LoadHandle {
    /// A pending handle and the resolver that settles it
    pub(crate) fn pending() -> (Self, LoadResolver) {
        let (tx, rx) = watch::channel(LoadState::Pending);
        (Self { id: Uuid::new_v4(), rx }, LoadResolver { tx })
    }

    /// A handle that is already loaded
    pub fn ready(tracks: TrackSnapshot) -> Self {
        let (_, rx) = watch::channel(LoadState::Loaded(tracks));
        Self { id: Uuid::new_v4(), rx }
    }

    /// A handle that has already failed
    pub fn failed(error: Error) -> Self {
        let (_, rx) = watch::channel(LoadState::Failed(error));
        Self { id: Uuid::new_v4(), rx }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.rx.borrow(), LoadState::Pending)
    }

    /// Settled outcome, without waiting
    pub fn outcome(&self) -> Option<Result<TrackSnapshot>> {
        match &*self.rx.borrow() {
            LoadState::Pending => None,
            LoadState::Loaded(tracks) => Some(Ok(tracks.clone())),
            LoadState::Failed(error) => Some(Err(error.clone())),
        }
    }

    /// Wait for the load to settle.
    ///
    /// Fails with [`Error::LoadAborted`] if the adapter is torn down first.
    pub async fn wait(&self) -> Result<TrackSnapshot> {
        let mut rx = self.rx.clone();
        let state = rx
            .wait_for(|state| !matches!(state, LoadState::Pending))
            .await
            .map_err(|_| Error::LoadAborted)?;

        match &*state {
            LoadState::Loaded(tracks) => Ok(tracks.clone()),
            LoadState::Failed(error) => Err(error.clone()),
            LoadState::Pending => Err(Error::LoadAborted),
        }
    }
}

impl PartialEq for LoadHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LoadHandle {}

/// Settles a [`LoadHandle`]. Dropping it unsettled aborts the load.
#[derive(Debug)]
pub(crate) struct LoadResolver {
    tx: watch::Sender<LoadState>,
}

impl LoadResolver {
    pub fn resolve(&self, tracks: TrackSnapshot) {
        self.tx.send_replace(LoadState::Loaded(tracks));
    }

    pub fn reject(&self, error: Error) {
        self.tx.send_replace(LoadState::Failed(error));
    }
}

// =============================================================================
// Adapter contract
// =============================================================================

/// Everything an adapter session is built from
pub struct AdapterSetup {
    pub sink: SharedSink,
    pub sources: Vec<SourceDescriptor>,
    /// Resolved once, from the primary source
    pub kind: SourceKind,
    /// Session-scoped DRM protocol, when the primary source is protected
    pub drm: Option<Box<dyn DrmProtocol>>,
    pub config: EngineConfig,
    pub events: mpsc::UnboundedSender<PlaybackEvent>,
}

/// Builds adapters; registered with the capability registry
pub trait AdapterFactory: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether adapters from this factory can play `mimetype` on `sink`
    fn can_play_type(&self, sink: &dyn MediaSink, mimetype: &str, config: &EngineConfig) -> bool;

    fn create(&self, setup: AdapterSetup) -> Box<dyn PlaybackAdapter>;
}

/// A bound playback session
pub trait PlaybackAdapter: Send {
    /// Adapter name for logs
    fn name(&self) -> &'static str;

    fn source_kind(&self) -> SourceKind;

    /// Source currently set on the sink
    fn bound_source(&self) -> Option<&SourceDescriptor>;

    /// Start the load, or return the load already underway
    fn load(&mut self, start_time: Option<f64>) -> LoadHandle;

    /// Forget a settled load so the next `load` starts over. A pending load
    /// is kept. Returns whether anything was cleared.
    fn reset_load(&mut self) -> bool;

    /// Feed one platform signal
    fn handle_signal(&mut self, signal: &SinkSignal);

    fn video_tracks(&self) -> Vec<VideoTrack>;

    fn audio_tracks(&self) -> Vec<AudioTrack>;

    fn text_tracks(&self) -> Vec<TextTrack>;

    fn tracks(&self) -> TrackSnapshot {
        TrackSnapshot {
            video: self.video_tracks(),
            audio: self.audio_tracks(),
            text: self.text_tracks(),
        }
    }

    /// Make `track` the active video track. Unknown tracks are ignored.
    fn select_video_track(&mut self, track: &VideoTrack) -> Result<()>;

    fn select_audio_track(&mut self, track: &AudioTrack);

    fn select_text_track(&mut self, track: &TextTrack);

    /// Disable every text track
    fn hide_text_track(&mut self);

    fn active_text_track(&self) -> Option<TextTrack> {
        self.text_tracks().into_iter().find(|t| t.is_active())
    }

    /// Publish the active cues of a text track
    fn sync_cues(&mut self, track: &TrackId);

    fn switch_state(&self) -> SwitchState;

    fn is_live(&self) -> bool;

    /// Latest seekable position of a live stream
    fn live_edge(&self) -> f64;

    /// Seek to the live edge; failures are swallowed
    fn seek_to_live_edge(&mut self);

    /// Media duration, or the live edge when live
    fn duration(&self) -> f64;

    /// Tear down the session. Safe to call more than once.
    fn destroy(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn test_load_handle_resolves() {
        let (handle, resolver) = LoadHandle::pending();
        let other = handle.clone();
        assert_eq!(handle, other);
        assert!(handle.is_pending());
        assert!(handle.outcome().is_none());

        resolver.resolve(TrackSnapshot::default());
        let tracks = other.wait().await.unwrap();
        assert!(tracks.is_empty());
        assert!(!handle.is_pending());
    }

    #[tokio::test]
    async fn test_load_handle_rejects() {
        let (handle, resolver) = LoadHandle::pending();
        resolver.reject(Error::Destroyed);
        assert!(matches!(handle.wait().await, Err(Error::Destroyed)));
        assert!(matches!(handle.outcome(), Some(Err(Error::Destroyed))));
    }

    #[test]
    fn test_load_handle_waits_until_settled() {
        let (handle, resolver) = LoadHandle::pending();
        let mut waiter = task::spawn(async move { handle.wait().await });

        assert_pending!(waiter.poll());
        resolver.resolve(TrackSnapshot::default());
        assert!(waiter.is_woken());
        let result = assert_ready!(waiter.poll());
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_resolver_aborts() {
        let (handle, resolver) = LoadHandle::pending();
        drop(resolver);
        assert!(matches!(handle.wait().await, Err(Error::LoadAborted)));
    }

    #[tokio::test]
    async fn test_ready_and_failed_handles() {
        assert!(LoadHandle::ready(TrackSnapshot::default()).wait().await.is_ok());
        assert!(matches!(
            LoadHandle::failed(Error::Destroyed).wait().await,
            Err(Error::Destroyed)
        ));
        assert_ne!(
            LoadHandle::ready(TrackSnapshot::default()),
            LoadHandle::ready(TrackSnapshot::default())
        );
    }
}
