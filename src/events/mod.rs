//! Event types flowing between the hook, the capture surface and the
//! session coordinator
//!
//! `SessionEvent` is the input side: everything that may advance the capture
//! session lands on one queue and is processed strictly in order.
//! `SessionNotice` is the output side: a one-way observability feed pushed
//! to control-channel subscribers and mirrored into the log.

use serde::{Deserialize, Serialize};

/// Inputs to the session coordinator, serialized onto its single queue
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The configured hotkey was pressed
    HotkeyFired,

    /// The capture surface reported a submitted line of text
    Submitted { text: String },

    /// The capture surface became visible or was dismissed
    VisibilityChanged { visible: bool },
}

/// Result of one attempt to hand focus back to the previously active window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreOutcome {
    /// The previous window accepted foreground
    Restored,
    /// No capture session had recorded a window; nothing to do
    NoSnapshot,
    /// The platform refused the request, typically a destroyed window
    Failed,
}

/// Notices emitted by the coordinator during a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionNotice {
    /// A capture session opened and the surface was told to take focus
    CaptureOpened,

    /// The session ended without a submission
    CaptureCancelled,

    /// Focus was handed back to the snapshotted window
    FocusRestored { outcome: RestoreOutcome },

    /// A submitted line finished injecting (successfully or not)
    InjectionFinished {
        events_expected: usize,
        events_accepted: usize,
        attempts: u32,
        succeeded: bool,
    },
}

impl std::fmt::Display for SessionNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionNotice::CaptureOpened => write!(f, "CAPTURE_OPENED"),
            SessionNotice::CaptureCancelled => write!(f, "CAPTURE_CANCELLED"),
            SessionNotice::FocusRestored { outcome } => {
                write!(f, "FOCUS_RESTORED ({outcome:?})")
            }
            SessionNotice::InjectionFinished {
                events_accepted,
                events_expected,
                attempts,
                succeeded,
            } => write!(
                f,
                "INJECTION_FINISHED ({events_accepted}/{events_expected} in {attempts} attempts, succeeded={succeeded})"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_serialization() {
        let notice = SessionNotice::InjectionFinished {
            events_expected: 10,
            events_accepted: 6,
            attempts: 4,
            succeeded: false,
        };
        let json = serde_json::to_string(&notice).unwrap();
        assert!(json.contains("injection_finished"));
        assert!(json.contains("10"));
        assert!(json.contains("\"succeeded\":false"));
    }

    #[test]
    fn test_notice_deserialization() {
        let json = r#"{"type":"focus_restored","outcome":"no_snapshot"}"#;
        let notice: SessionNotice = serde_json::from_str(json).unwrap();
        assert!(matches!(
            notice,
            SessionNotice::FocusRestored {
                outcome: RestoreOutcome::NoSnapshot
            }
        ));
    }
}
