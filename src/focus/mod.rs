//! Foreground-focus control
//!
//! The coordinator never touches thread-attachment state itself; it drives a
//! narrow [`ForegroundController`] capability whose Windows implementation
//! performs the attach/detach workaround internally.

mod coordinator;
#[cfg(windows)]
mod windows;

pub use coordinator::{FocusCoordinator, SessionState};
#[cfg(windows)]
pub use windows::WindowsForegroundController;

/// Opaque handle to a top-level window
///
/// Raw HWND value; `Copy + Send` so it can ride the session queue. The
/// window it names may have been destroyed by the time it is used, which is
/// why foreground requests against it are fallible and best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

/// Capability interface over the platform's foreground-window state
pub trait ForegroundController {
    /// The window currently holding foreground, if any
    fn current_foreground(&self) -> Option<WindowHandle>;

    /// Force `window` to become the active foreground window
    fn bring_to_foreground(&self, window: WindowHandle) -> Result<(), FocusError>;
}

/// Failures of a foreground-change request
///
/// Always swallowed after logging: by the time a restore fails the capture
/// surface is gone and there is nothing actionable to report.
#[derive(Debug, thiserror::Error)]
pub enum FocusError {
    #[error("window {0:?} no longer exists")]
    WindowGone(WindowHandle),

    #[error("platform refused the foreground change for {0:?}")]
    Refused(WindowHandle),
}
