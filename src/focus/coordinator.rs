//! Capture session coordinator
//!
//! Owns the session state machine and the focus snapshot. All focus
//! manipulation and text injection happens here, on one task draining one
//! queue, so a session can never be entered twice and the hook thread never
//! waits on any of it.

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::config::HotkeyConfig;
use crate::events::{RestoreOutcome, SessionEvent, SessionNotice};
use crate::inject::{InjectionRequest, InputBackend, TextInjector};
use crate::surface::CaptureSurface;

use super::{ForegroundController, WindowHandle};

/// The capture session states
///
/// `CaptureActive` owns the focus snapshot, so a second snapshot cannot
/// exist while one session is live, and `Submitting` existing as its own
/// state is what keeps the cancel path's auto-restore from firing once a
/// submission has begun its own restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session, waiting for the hotkey
    Idle,
    /// Surface visible; `prior` is the window to hand focus back to
    CaptureActive { prior: Option<WindowHandle> },
    /// Submission in flight: surface hidden, focus restored, injection
    /// pending or running
    Submitting,
}

/// Orchestrates the hotkey-to-injection pipeline
pub struct FocusCoordinator<C, S, B>
where
    C: ForegroundController,
    S: CaptureSurface,
    B: InputBackend,
{
    state: SessionState,
    controller: C,
    surface: S,
    injector: TextInjector<B>,
    config: HotkeyConfig,
    notice_tx: broadcast::Sender<SessionNotice>,
}

impl<C, S, B> FocusCoordinator<C, S, B>
where
    C: ForegroundController,
    S: CaptureSurface,
    B: InputBackend,
{
    pub fn new(
        controller: C,
        surface: S,
        injector: TextInjector<B>,
        config: HotkeyConfig,
        notice_tx: broadcast::Sender<SessionNotice>,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            controller,
            surface,
            injector,
            config,
            notice_tx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drain the session queue until all senders hang up
    pub async fn run(&mut self, mut rx: mpsc::Receiver<SessionEvent>) {
        info!("session coordinator started in Idle state");

        while let Some(event) = rx.recv().await {
            self.handle_event(event).await;
        }

        info!("session coordinator stopped");
    }

    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::HotkeyFired => self.toggle(),
            SessionEvent::Submitted { text } => self.submit(text).await,
            SessionEvent::VisibilityChanged { visible } => {
                if !visible {
                    self.handle_dismissed();
                }
            }
        }
    }

    /// Hotkey semantics: open a session when idle, cancel the one that is
    /// already open otherwise
    pub fn toggle(&mut self) {
        match self.state {
            SessionState::Idle => self.show_overlay(),
            SessionState::CaptureActive { .. } => {
                info!("hotkey while capture active, cancelling session");
                self.surface.hide();
                self.restore_prior_focus();
                self.notify(SessionNotice::CaptureCancelled);
            }
            SessionState::Submitting => debug!("hotkey ignored while submitting"),
        }
    }

    /// Snapshot the current foreground window and raise the capture surface
    ///
    /// Re-entered while a session is already active, this re-commands the
    /// surface but keeps the original snapshot untouched.
    pub fn show_overlay(&mut self) {
        match self.state {
            SessionState::CaptureActive { .. } => {
                debug!("capture surface already active, re-showing");
                self.surface.show_and_focus();
            }
            SessionState::Submitting => debug!("show ignored while submitting"),
            SessionState::Idle => {
                let prior = self.controller.current_foreground();
                info!(prior = ?prior, "opening capture session");

                self.surface.show_and_focus();
                if let Some(window) = self.surface.window() {
                    if let Err(e) = self.controller.bring_to_foreground(window) {
                        warn!(error = %e, "could not force capture surface to foreground");
                    }
                }

                self.state = SessionState::CaptureActive { prior };
                self.notify(SessionNotice::CaptureOpened);
            }
        }
    }

    /// Dismissal without a submitted value is a cancel; during a submit the
    /// restore has already been taken care of
    fn handle_dismissed(&mut self) {
        match self.state {
            SessionState::CaptureActive { .. } => {
                info!("capture surface dismissed, cancelling session");
                self.restore_prior_focus();
                self.notify(SessionNotice::CaptureCancelled);
            }
            SessionState::Submitting => {
                debug!("dismissal during submit, restore already underway");
            }
            SessionState::Idle => {}
        }
    }

    /// Complete a session with a submitted line: hide, restore, settle,
    /// inject
    async fn submit(&mut self, text: String) {
        let prior = match self.state {
            SessionState::CaptureActive { prior } => prior,
            _ => {
                warn!("submission outside an active capture session, ignoring");
                return;
            }
        };

        self.state = SessionState::Submitting;
        self.surface.hide();
        self.restore(prior);

        // Give the platform time to finish the context switch before the
        // first keystroke lands.
        tokio::time::sleep(self.config.focus_restore_delay).await;

        let request = InjectionRequest {
            text,
            lead_delay: std::time::Duration::ZERO,
            retry_count: self.config.retry_count,
            retry_delay: self.config.retry_delay,
        };
        let outcome = self.injector.send_text(&request).await;

        self.notify(SessionNotice::InjectionFinished {
            events_expected: outcome.events_expected,
            events_accepted: outcome.events_accepted,
            attempts: outcome.attempts,
            succeeded: outcome.succeeded,
        });
        self.state = SessionState::Idle;
    }

    /// Hand focus back to the snapshotted window and clear the snapshot
    ///
    /// A no-op when no session holds a snapshot, so calling it again after
    /// a session completed is safe.
    pub fn restore_prior_focus(&mut self) -> RestoreOutcome {
        match self.state {
            SessionState::CaptureActive { prior } => {
                self.state = SessionState::Idle;
                self.restore(prior)
            }
            _ => {
                debug!("no live focus snapshot, restore is a no-op");
                RestoreOutcome::NoSnapshot
            }
        }
    }

    fn restore(&self, prior: Option<WindowHandle>) -> RestoreOutcome {
        let outcome = match prior {
            None => {
                debug!("snapshot empty, nothing to restore");
                RestoreOutcome::NoSnapshot
            }
            Some(window) => match self.controller.bring_to_foreground(window) {
                Ok(()) => {
                    info!(window = window.0, "restored previous foreground window");
                    RestoreOutcome::Restored
                }
                Err(e) => {
                    // Expected when the window went away while the surface
                    // was up; nothing actionable remains.
                    warn!(error = %e, "focus restore failed");
                    RestoreOutcome::Failed
                }
            },
        };
        self.notify(SessionNotice::FocusRestored { outcome });
        outcome
    }

    fn notify(&self, notice: SessionNotice) {
        debug!(%notice, "session notice");
        let _ = self.notice_tx.send(notice);
    }
}
