//! Control message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian
//! length. A `Subscribe` request upgrades its connection to push-only
//! notification delivery; clients send further requests over separate
//! connections.

use serde::{Deserialize, Serialize};

use crate::events::SessionNotice;

/// Requests from clients to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Subscribe to surface commands and session notices
    Subscribe,

    /// The surface client announces its top-level window
    RegisterSurface { window: isize },

    /// The surface reports a submitted line
    SubmitText { text: String },

    /// The surface became visible or was dismissed
    SurfaceVisibility { visible: bool },

    /// Rebind the hotkey; names as accepted by the settings format
    SetHotkey { modifier: String, key: String },
}

/// Responses from the daemon to a client request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Subscription confirmed
    Subscribed,

    /// Surface window recorded
    SurfaceRegistered,

    /// Event accepted onto the session queue
    Accepted,

    /// Hotkey rebound and persisted
    HotkeyChanged { modifier: String, key: String },

    /// Request failed
    Error { code: String, message: String },
}

/// Push messages to subscribed clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Present the capture surface and take input focus
    ShowSurface,

    /// Dismiss the capture surface
    HideSurface,

    /// A session notice from the coordinator
    Event(SessionNotice),
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Human-readable hotkey, e.g. `Ctrl+Backtick`
    pub hotkey: String,

    /// Whether the keyboard hook is active
    pub hook_installed: bool,

    /// Whether a capture session is currently open
    pub session_active: bool,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            hotkey: String::new(),
            hook_installed: false,
            session_active: false,
            uptime_secs: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = Request::SetHotkey {
            modifier: "Ctrl".to_string(),
            key: "Backtick".to_string(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("set_hotkey"));
        assert!(json.contains("Backtick"));
    }

    #[test]
    fn test_request_deserialization() {
        let json = r#"{"type":"submit_text","text":"héllo"}"#;
        let req: Request = serde_json::from_str(json).unwrap();
        assert!(matches!(req, Request::SubmitText { text } if text == "héllo"));
    }

    #[test]
    fn test_response_serialization() {
        let resp = Response::Status(DaemonStatus::default());
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("status"));
        assert!(json.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_notification_tags_are_disjoint_from_responses() {
        let json = serde_json::to_string(&Notification::ShowSurface).unwrap();
        assert!(json.contains("show_surface"));
        assert!(serde_json::from_str::<Response>(&json).is_err());
    }
}
