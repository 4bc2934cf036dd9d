//! Capture surface contract
//!
//! The surface that actually renders the text prompt is an external
//! collaborator. The core only needs to command it up and down, learn its
//! window handle so it can be forced to foreground, and receive its
//! submitted/visibility notifications (which arrive through the control
//! channel as [`crate::events::SessionEvent`]s).

use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::focus::WindowHandle;
use crate::ipc::protocol::Notification;

/// Daemon-side interface to the capture surface
pub trait CaptureSurface {
    /// Make the surface visible and ready for text entry
    fn show_and_focus(&self);

    /// Dismiss the surface
    fn hide(&self);

    /// The surface's top-level window, once it has registered one
    fn window(&self) -> Option<WindowHandle>;
}

/// Surface client window handle shared between the control server (which
/// learns it from `RegisterSurface`) and the coordinator (which raises it)
///
/// Zero means no surface has registered yet.
#[derive(Debug, Default)]
pub struct SurfaceWindow(AtomicIsize);

impl SurfaceWindow {
    pub fn set(&self, window: WindowHandle) {
        self.0.store(window.0, Ordering::Relaxed);
    }

    pub fn get(&self) -> Option<WindowHandle> {
        match self.0.load(Ordering::Relaxed) {
            0 => None,
            raw => Some(WindowHandle(raw)),
        }
    }
}

/// Capture surface reached over the control channel
///
/// Show/hide commands are pushed to subscribed clients; a missing
/// subscriber is logged and otherwise ignored, matching the one-way nature
/// of the feed.
pub struct RemoteSurface {
    notify_tx: broadcast::Sender<Notification>,
    window: Arc<SurfaceWindow>,
}

impl RemoteSurface {
    pub fn new(notify_tx: broadcast::Sender<Notification>, window: Arc<SurfaceWindow>) -> Self {
        Self { notify_tx, window }
    }

    fn push(&self, notification: Notification) {
        if self.notify_tx.send(notification).is_err() {
            debug!("no surface client subscribed");
        }
    }
}

impl CaptureSurface for RemoteSurface {
    fn show_and_focus(&self) {
        self.push(Notification::ShowSurface);
    }

    fn hide(&self) {
        self.push(Notification::HideSurface);
    }

    fn window(&self) -> Option<WindowHandle> {
        self.window.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_window_starts_empty() {
        let window = SurfaceWindow::default();
        assert_eq!(window.get(), None);

        window.set(WindowHandle(0x5210));
        assert_eq!(window.get(), Some(WindowHandle(0x5210)));
    }

    #[tokio::test]
    async fn test_show_and_hide_reach_subscribers() {
        let (tx, mut rx) = broadcast::channel(8);
        let surface = RemoteSurface::new(tx, Arc::new(SurfaceWindow::default()));

        surface.show_and_focus();
        surface.hide();

        assert!(matches!(rx.recv().await, Ok(Notification::ShowSurface)));
        assert!(matches!(rx.recv().await, Ok(Notification::HideSurface)));
    }
}
