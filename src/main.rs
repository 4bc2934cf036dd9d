//! keyrelay: hotkey-to-injection daemon
//!
//! Watches the system for a configured hotkey, snapshots the foreground
//! window, raises an external capture surface in its place, and replays the
//! submitted line into the restored window as synthetic keystrokes.
//!
//! Core pieces:
//! - Low-level keyboard hook on a dedicated thread (classify + hand off)
//! - Session coordinator with an explicit Idle/CaptureActive/Submitting
//!   state machine
//! - Unicode text injection with whole-batch retry on partial delivery
//! - Localhost control channel for the surface client and configuration

mod config;
mod events;
mod focus;
mod hotkey;
mod inject;
mod ipc;
mod lifecycle;
mod surface;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "keyrelay starting");

    #[cfg(windows)]
    return run().await;

    #[cfg(not(windows))]
    anyhow::bail!("keyrelay needs the Win32 keyboard hook, foreground and input APIs; this build target has no platform layer");
}

#[cfg(windows)]
async fn run() -> Result<()> {
    use std::sync::Arc;

    use tokio::sync::{broadcast, mpsc};
    use tracing::{error, warn};

    use crate::config::{HotkeyConfig, Settings};
    use crate::events::SessionNotice;
    use crate::focus::{FocusCoordinator, WindowsForegroundController};
    use crate::hotkey::{InputHook, SharedHotkey};
    use crate::inject::{SendInputBackend, TextInjector};
    use crate::ipc::protocol::Notification;
    use crate::ipc::Server;
    use crate::lifecycle::ShutdownSignal;
    use crate::surface::{RemoteSurface, SurfaceWindow};

    // Load configuration
    let settings_path = config::settings_path();
    let settings = Settings::load_or_default(&settings_path);
    info!(hotkey = %settings.hotkey_label(), ?settings_path, "configuration loaded");

    let hotkey_config = HotkeyConfig::from_settings(&settings)?;
    let shared_hotkey = Arc::new(SharedHotkey::new(hotkey_config.spec()));

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Create channels for inter-component communication
    // Hook thread and surface client -> session coordinator
    let (session_tx, session_rx) = mpsc::channel(32);
    // Coordinator -> observers (control server, log mirror)
    let (notice_tx, mut notice_rx) = broadcast::channel::<SessionNotice>(64);
    // Surface commands and notices pushed to subscribed clients
    let (notify_tx, _) = broadcast::channel::<Notification>(64);

    let surface_window = Arc::new(SurfaceWindow::default());

    // Bind the control channel
    let server = Server::bind(
        settings,
        settings_path,
        session_tx.clone(),
        notify_tx.clone(),
        Arc::clone(&surface_window),
        Arc::clone(&shared_hotkey),
    )
    .await?;

    // Install the keyboard hook; failure costs only the hotkey feature
    let mut hook = match InputHook::install(Arc::clone(&shared_hotkey), session_tx.clone()) {
        Ok(hook) => {
            server.set_hook_installed(true).await;
            Some(hook)
        }
        Err(e) => {
            error!(error = %e, "failed to install keyboard hook");
            warn!("continuing without hotkey support");
            None
        }
    };

    // Assemble the pipeline
    let surface = RemoteSurface::new(notify_tx.clone(), Arc::clone(&surface_window));
    let injector = TextInjector::new(SendInputBackend::new());
    let mut coordinator = FocusCoordinator::new(
        WindowsForegroundController::new(),
        surface,
        injector,
        hotkey_config,
        notice_tx.clone(),
    );

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the session coordinator (processes hotkey and surface events)
        _ = coordinator.run(session_rx) => {
            info!("session coordinator exited");
        }

        // Run the control server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "control server error");
            }
        }

        // Mirror session notices into the control channel
        _ = async {
            loop {
                match notice_rx.recv().await {
                    Ok(notice) => {
                        info!(%notice, "session notice");
                        server.apply_notice(&notice).await;
                        let _ = notify_tx.send(Notification::Event(notice));
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "session notice receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("notice forwarder exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    if let Some(hook) = hook.as_mut() {
        hook.uninstall();
    }
    server.shutdown();

    info!("keyrelay stopped");

    Ok(())
}
