//! Global hotkey observation
//!
//! A process-wide low-level keyboard hook classifies every key-down in the
//! system against the configured hotkey and hands matches off to the
//! session queue. The hook only observes; the physical keystroke is always
//! forwarded down the platform's hook chain.

pub mod keys;
#[cfg(windows)]
mod listener;

pub use keys::{HotkeySpec, SharedHotkey};
#[cfg(windows)]
pub use listener::InputHook;

/// Failure to register the system-wide keyboard hook
///
/// Non-fatal: the daemon keeps running without hotkey capability and logs
/// the failure once.
#[derive(Debug, thiserror::Error)]
pub enum HookInstallError {
    #[error("keyboard hook registration refused by the platform (code {code})")]
    Registration { code: i32 },

    #[error("a keyboard hook is already installed in this process")]
    AlreadyInstalled,

    #[error("failed to spawn hook thread: {0}")]
    ThreadSpawn(String),
}
