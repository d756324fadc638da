//! Progressive rendition switch state machine
//!
//! Swapping the URL of a progressive source drops the playback position, so
//! a switch has to reload, seek back, and only then restore play/pause:
//!
//! ```text
//!            begin()
//!   Idle ───────────────▶ AwaitingLoad
//!                              │ loadeddata
//!              ┌───────────────┴────────────────┐
//!              │ generic                        │ safari
//!              │ (seek)                         ▼
//!              │                         AwaitingDuration
//!              │                                │ durationchange (seek)
//!              ▼                                ▼
//!         AwaitingSeek ◀────────────────────────┘
//!              │ seeked (finish)
//!              ▼
//!          Complete
//! ```
//!
//! A platform error in any awaiting state aborts back to `Idle`.

use crate::error::{Error, Result};
use crate::sink::SinkSignal;
use crate::track::TrackId;
use crate::types::{MediaError, PlatformFamily};

/// Playback state captured before the switch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resume {
    pub position: f64,
    pub paused: bool,
}

/// Switch states
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SwitchState {
    #[default]
    Idle,
    AwaitingLoad { target: TrackId, resume: Resume },
    AwaitingDuration { target: TrackId, resume: Resume },
    AwaitingSeek { target: TrackId, resume: Resume },
    Complete { target: TrackId },
}

impl SwitchState {
    /// True while the switch waits on a platform signal
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            SwitchState::AwaitingLoad { .. }
                | SwitchState::AwaitingDuration { .. }
                | SwitchState::AwaitingSeek { .. }
        )
    }

    fn pending(&self) -> Option<(&TrackId, Resume)> {
        match self {
            SwitchState::AwaitingLoad { target, resume }
            | SwitchState::AwaitingDuration { target, resume }
            | SwitchState::AwaitingSeek { target, resume } => Some((target, *resume)),
            _ => None,
        }
    }
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchAction {
    /// Seek the sink back to the captured position
    Seek(f64),
    /// Seek confirmed; restore play/pause and announce the new track
    Finish { target: TrackId, resume: Resume },
    /// The platform failed mid-switch
    Abort { target: TrackId, error: MediaError },
}

/// One switch at a time
#[derive(Debug, Default)]
pub struct SwitchMachine {
    state: SwitchState,
}

impl SwitchMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SwitchState {
        &self.state
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.is_in_flight()
    }

    /// Start a switch. Rejected while another switch is in flight.
    pub fn begin(&mut self, target: TrackId, resume: Resume) -> Result<()> {
        if self.is_in_flight() {
            return Err(Error::SwitchInProgress);
        }
        self.state = SwitchState::AwaitingLoad { target, resume };
        Ok(())
    }

    /// Feed a platform signal; returns the side effect to perform, if any
    pub fn on_signal(&mut self, signal: &SinkSignal, platform: PlatformFamily) -> Option<SwitchAction> {
        let state = std::mem::take(&mut self.state);

        let (next, action) = match (state, signal) {
            (SwitchState::AwaitingLoad { target, resume }, SinkSignal::LoadedData) => {
                if platform.waits_for_duration() {
                    (SwitchState::AwaitingDuration { target, resume }, None)
                } else {
                    (
                        SwitchState::AwaitingSeek { target, resume },
                        Some(SwitchAction::Seek(resume.position)),
                    )
                }
            }
            (SwitchState::AwaitingDuration { target, resume }, SinkSignal::DurationChange) => (
                SwitchState::AwaitingSeek { target, resume },
                Some(SwitchAction::Seek(resume.position)),
            ),
            (SwitchState::AwaitingSeek { target, resume }, SinkSignal::Seeked) => (
                SwitchState::Complete {
                    target: target.clone(),
                },
                Some(SwitchAction::Finish { target, resume }),
            ),
            (state, SinkSignal::Error(error)) if state.is_in_flight() => {
                let target = state.pending().map(|(t, _)| t.clone()).unwrap_or_else(|| TrackId::new(""));
                (
                    SwitchState::Idle,
                    Some(SwitchAction::Abort {
                        target,
                        error: error.clone(),
                    }),
                )
            }
            (state, _) => (state, None),
        };

        self.state = next;
        action
    }

    /// Abandon an in-flight switch, returning what it was waiting to restore
    pub fn cancel(&mut self) -> Option<(TrackId, Resume)> {
        let pending = self.state.pending().map(|(t, r)| (t.clone(), r));
        self.state = SwitchState::Idle;
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaErrorCode;

    fn resume() -> Resume {
        Resume {
            position: 12.5,
            paused: false,
        }
    }

    fn started() -> SwitchMachine {
        let mut machine = SwitchMachine::new();
        machine.begin(TrackId::new("sd"), resume()).unwrap();
        machine
    }

    #[test]
    fn test_generic_sequence() {
        let mut machine = started();
        let platform = PlatformFamily::Generic;

        assert_eq!(machine.on_signal(&SinkSignal::LoadedMetadata, platform), None);
        assert_eq!(
            machine.on_signal(&SinkSignal::LoadedData, platform),
            Some(SwitchAction::Seek(12.5))
        );
        // Duration is irrelevant on generic platforms
        assert_eq!(machine.on_signal(&SinkSignal::DurationChange, platform), None);
        assert_eq!(machine.on_signal(&SinkSignal::Seeking, platform), None);
        assert_eq!(
            machine.on_signal(&SinkSignal::Seeked, platform),
            Some(SwitchAction::Finish {
                target: TrackId::new("sd"),
                resume: resume()
            })
        );
        assert_eq!(machine.state(), &SwitchState::Complete { target: TrackId::new("sd") });
    }

    #[test]
    fn test_safari_waits_for_duration() {
        let mut machine = started();
        let platform = PlatformFamily::Safari;

        assert_eq!(machine.on_signal(&SinkSignal::LoadedData, platform), None);
        assert!(matches!(machine.state(), SwitchState::AwaitingDuration { .. }));
        // A seeked before the seek was issued is not ours
        assert_eq!(machine.on_signal(&SinkSignal::Seeked, platform), None);
        assert_eq!(
            machine.on_signal(&SinkSignal::DurationChange, platform),
            Some(SwitchAction::Seek(12.5))
        );
        assert!(matches!(
            machine.on_signal(&SinkSignal::Seeked, platform),
            Some(SwitchAction::Finish { .. })
        ));
    }

    #[test]
    fn test_second_switch_rejected_while_in_flight() {
        let mut machine = started();
        let err = machine.begin(TrackId::new("hd"), resume()).unwrap_err();
        assert!(matches!(err, Error::SwitchInProgress));
        assert!(matches!(machine.state(), SwitchState::AwaitingLoad { target, .. } if target.as_str() == "sd"));
    }

    #[test]
    fn test_new_switch_allowed_after_complete() {
        let mut machine = started();
        machine.on_signal(&SinkSignal::LoadedData, PlatformFamily::Generic);
        machine.on_signal(&SinkSignal::Seeked, PlatformFamily::Generic);
        assert!(machine.begin(TrackId::new("hd"), resume()).is_ok());
    }

    #[test]
    fn test_error_aborts() {
        let mut machine = started();
        let error = MediaError::new(MediaErrorCode::Network, "gone");
        let action = machine.on_signal(&SinkSignal::Error(error.clone()), PlatformFamily::Generic);
        assert_eq!(
            action,
            Some(SwitchAction::Abort {
                target: TrackId::new("sd"),
                error
            })
        );
        assert_eq!(machine.state(), &SwitchState::Idle);
    }

    #[test]
    fn test_idle_ignores_signals() {
        let mut machine = SwitchMachine::new();
        assert_eq!(machine.on_signal(&SinkSignal::LoadedData, PlatformFamily::Generic), None);
        assert_eq!(machine.on_signal(&SinkSignal::Seeked, PlatformFamily::Generic), None);
        assert_eq!(machine.state(), &SwitchState::Idle);
    }

    #[test]
    fn test_cancel() {
        let mut machine = started();
        assert_eq!(machine.cancel(), Some((TrackId::new("sd"), resume())));
        assert_eq!(machine.cancel(), None);
    }
}
