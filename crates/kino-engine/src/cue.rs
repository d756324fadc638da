//! Cue normalization
//!
//! Platforms hand out cues in different shapes. Everything the engine emits
//! is the canonical [`Cue`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Canonical timed text entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Start time in seconds
    pub start_time: f64,
    /// End time in seconds
    pub end_time: f64,
    /// Cue text content (may contain markup)
    pub text: String,
}

impl Cue {
    pub fn new(start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            text: text.into(),
        }
    }
}

/// Cue as reported by the platform
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCue {
    /// Text cue (WebVTT style)
    Vtt {
        start_time: f64,
        end_time: f64,
        text: String,
    },
    /// Data cue carrying a raw payload (in-band ID3/timed metadata style)
    Data {
        start_time: f64,
        end_time: f64,
        payload: Bytes,
    },
}

impl PlatformCue {
    /// Convert to the canonical cue
    pub fn normalize(&self) -> Cue {
        match self {
            PlatformCue::Vtt {
                start_time,
                end_time,
                text,
            } => Cue::new(*start_time, *end_time, text.clone()),
            PlatformCue::Data {
                start_time,
                end_time,
                payload,
            } => {
                let text = String::from_utf8_lossy(payload);
                // Data payloads are frequently NUL padded
                Cue::new(*start_time, *end_time, text.trim_end_matches('\0'))
            }
        }
    }
}

impl From<&PlatformCue> for Cue {
    fn from(cue: &PlatformCue) -> Self {
        cue.normalize()
    }
}

/// Normalize a batch of active cues, preserving platform order
pub fn normalize_all(cues: &[PlatformCue]) -> Vec<Cue> {
    cues.iter().map(Cue::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_shapes_normalize() {
        let vtt = PlatformCue::Vtt {
            start_time: 1.0,
            end_time: 3.5,
            text: "Hello".into(),
        };
        let data = PlatformCue::Data {
            start_time: 2.0,
            end_time: 4.0,
            payload: Bytes::from_static(b"World\0\0"),
        };

        assert_eq!(vtt.normalize(), Cue::new(1.0, 3.5, "Hello"));
        assert_eq!(data.normalize(), Cue::new(2.0, 4.0, "World"));
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let data = PlatformCue::Data {
            start_time: 0.0,
            end_time: 1.0,
            payload: Bytes::from_static(&[0x48, 0x69, 0xff]),
        };
        assert_eq!(data.normalize().text, "Hi\u{fffd}");
    }
}
