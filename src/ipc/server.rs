//! Localhost TCP server for the control channel
//!
//! Provides request-response communication plus push delivery of surface
//! commands and session notices to subscribed clients.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::events::{SessionEvent, SessionNotice};
use crate::focus::WindowHandle;
use crate::hotkey::keys::{self, HotkeySpec};
use crate::hotkey::SharedHotkey;
use crate::surface::SurfaceWindow;

use super::protocol::{DaemonStatus, Notification, Request, Response};

const MAX_MESSAGE_LEN: usize = 64 * 1024;

/// Control server handling client connections
pub struct Server {
    listener: TcpListener,
    inner: Arc<Inner>,
    shutdown_tx: broadcast::Sender<()>,
}

struct Inner {
    state: RwLock<ServerState>,
    session_tx: mpsc::Sender<SessionEvent>,
    notify_tx: broadcast::Sender<Notification>,
    surface_window: Arc<SurfaceWindow>,
    hotkey: Arc<SharedHotkey>,
    settings: RwLock<Settings>,
    settings_path: PathBuf,
    start_time: std::time::Instant,
}

/// Mutable status mirrored into `GetStatus` responses
struct ServerState {
    hook_installed: bool,
    session_active: bool,
}

impl Server {
    /// Bind the control socket on localhost
    pub async fn bind(
        settings: Settings,
        settings_path: PathBuf,
        session_tx: mpsc::Sender<SessionEvent>,
        notify_tx: broadcast::Sender<Notification>,
        surface_window: Arc<SurfaceWindow>,
        hotkey: Arc<SharedHotkey>,
    ) -> Result<Self> {
        let addr = SocketAddr::from(([127, 0, 0, 1], settings.control_port));
        let listener = TcpListener::bind(addr)
            .await
            .context("failed to bind control socket")?;
        info!(addr = %listener.local_addr()?, "control server listening");

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            listener,
            inner: Arc::new(Inner {
                state: RwLock::new(ServerState {
                    hook_installed: false,
                    session_active: false,
                }),
                session_tx,
                notify_tx,
                surface_window,
                hotkey,
                settings: RwLock::new(settings),
                settings_path,
                start_time: std::time::Instant::now(),
            }),
            shutdown_tx,
        })
    }

    /// Address the server actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Record whether the keyboard hook is active
    pub async fn set_hook_installed(&self, installed: bool) {
        self.inner.state.write().await.hook_installed = installed;
    }

    /// Track session liveness from the coordinator's notices
    pub async fn apply_notice(&self, notice: &SessionNotice) {
        let active = match notice {
            SessionNotice::CaptureOpened => true,
            SessionNotice::CaptureCancelled | SessionNotice::InjectionFinished { .. } => false,
            SessionNotice::FocusRestored { .. } => return,
        };
        self.inner.state.write().await.session_active = active;
    }

    /// Run the server, accepting connections until shutdown
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!(%addr, "client connected");
                    let inner = Arc::clone(&self.inner);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_client(stream, inner) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Stop all client handlers
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("control server shutdown complete");
    }
}

/// Handle one client connection
///
/// Request-response until a `Subscribe` arrives; that upgrades the
/// connection to push-only delivery of notifications, and the client sends
/// further requests over separate connections.
async fn handle_client(mut stream: TcpStream, inner: Arc<Inner>) -> Result<()> {
    let mut len_buf = [0u8; 4];

    loop {
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("client disconnected");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_LEN {
            warn!(len, "message too large, disconnecting");
            return Ok(());
        }

        let mut msg_buf = vec![0u8; len];
        stream.read_exact(&mut msg_buf).await?;

        let request: Request =
            serde_json::from_slice(&msg_buf).context("failed to parse request")?;
        debug!(?request, "received request");

        let (response, subscribe) = process_request(request, &inner).await;

        if subscribe {
            // Subscribe before acknowledging so nothing sent right after the
            // acknowledgement can be missed
            let rx = inner.notify_tx.subscribe();
            send_message(&mut stream, &response).await?;
            debug!("client subscribed, connection is now push-only");
            return push_loop(stream, rx).await;
        }

        send_message(&mut stream, &response).await?;
    }
}

/// Forward notifications to a subscribed client until either side goes away
async fn push_loop(
    mut stream: TcpStream,
    mut rx: broadcast::Receiver<Notification>,
) -> Result<()> {
    loop {
        match rx.recv().await {
            Ok(notification) => send_message(&mut stream, &notification).await?,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "notification receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }
}

/// Send a length-prefixed JSON message
async fn send_message<T: serde::Serialize>(stream: &mut TcpStream, msg: &T) -> Result<()> {
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    stream.write_all(&msg_len).await?;
    stream.write_all(&msg_bytes).await?;

    Ok(())
}

/// Process a request; returns (response, should_subscribe)
async fn process_request(request: Request, inner: &Inner) -> (Response, bool) {
    match request {
        Request::Ping => (Response::Pong, false),

        Request::GetStatus => {
            let state = inner.state.read().await;
            let settings = inner.settings.read().await;
            let status = DaemonStatus {
                version: env!("CARGO_PKG_VERSION").to_string(),
                hotkey: settings.hotkey_label(),
                hook_installed: state.hook_installed,
                session_active: state.session_active,
                uptime_secs: inner.start_time.elapsed().as_secs(),
            };
            (Response::Status(status), false)
        }

        Request::Subscribe => (Response::Subscribed, true),

        Request::RegisterSurface { window } => {
            inner.surface_window.set(WindowHandle(window));
            info!(window, "capture surface registered");
            (Response::SurfaceRegistered, false)
        }

        Request::SubmitText { text } => {
            let text = text.trim().to_string();
            let event = SessionEvent::Submitted { text };
            match inner.session_tx.send(event).await {
                Ok(()) => (Response::Accepted, false),
                Err(_) => (
                    Response::Error {
                        code: "queue_closed".to_string(),
                        message: "session queue is gone".to_string(),
                    },
                    false,
                ),
            }
        }

        Request::SurfaceVisibility { visible } => {
            let event = SessionEvent::VisibilityChanged { visible };
            match inner.session_tx.send(event).await {
                Ok(()) => (Response::Accepted, false),
                Err(_) => (
                    Response::Error {
                        code: "queue_closed".to_string(),
                        message: "session queue is gone".to_string(),
                    },
                    false,
                ),
            }
        }

        Request::SetHotkey { modifier, key } => set_hotkey(&modifier, &key, inner).await,
    }
}

/// Rebind the hotkey: swap the live spec the hook compares against, then
/// persist the new pair
async fn set_hotkey(modifier: &str, key: &str, inner: &Inner) -> (Response, bool) {
    let (Some(modifier_vk), Some(key_vk)) = (keys::vk_from_name(modifier), keys::vk_from_name(key))
    else {
        return (
            Response::Error {
                code: "bad_hotkey".to_string(),
                message: format!("unknown key name in {modifier}+{key}"),
            },
            false,
        );
    };
    if key_vk == 0 {
        return (
            Response::Error {
                code: "bad_hotkey".to_string(),
                message: "hotkey key code must be non-zero".to_string(),
            },
            false,
        );
    }

    inner.hotkey.store(HotkeySpec { key_vk, modifier_vk });

    let mut settings = inner.settings.write().await;
    settings.set_hotkey(modifier_vk, key_vk);
    if let Err(e) = settings.save(&inner.settings_path) {
        warn!(error = %e, "hotkey rebound but settings save failed");
    }
    info!(hotkey = %settings.hotkey_label(), "hotkey rebound");

    (
        Response::HotkeyChanged {
            modifier: settings.modifier_name.clone(),
            key: settings.hotkey_name.clone(),
        },
        false,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn roundtrip(stream: &mut TcpStream, request: &Request) -> Response {
        let bytes = serde_json::to_vec(request).unwrap();
        stream
            .write_all(&(bytes.len() as u32).to_le_bytes())
            .await
            .unwrap();
        stream.write_all(&bytes).await.unwrap();

        read_frame(stream).await
    }

    async fn read_frame<T: serde::de::DeserializeOwned>(stream: &mut TcpStream) -> T {
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.unwrap();
        let mut msg_buf = vec![0u8; u32::from_le_bytes(len_buf) as usize];
        stream.read_exact(&mut msg_buf).await.unwrap();
        serde_json::from_slice(&msg_buf).unwrap()
    }

    async fn test_server() -> (Arc<Server>, SocketAddr, mpsc::Receiver<SessionEvent>, Arc<SharedHotkey>) {
        let mut settings = Settings::default();
        settings.control_port = 0;
        let (session_tx, session_rx) = mpsc::channel(32);
        let (notify_tx, _) = broadcast::channel(32);
        let hotkey = Arc::new(SharedHotkey::new(HotkeySpec {
            key_vk: keys::vk::BACKTICK,
            modifier_vk: keys::vk::CONTROL,
        }));

        let path = std::env::temp_dir()
            .join("keyrelay-server-test")
            .join("settings.json");
        let server = Arc::new(
            Server::bind(
                settings,
                path,
                session_tx,
                notify_tx,
                Arc::new(SurfaceWindow::default()),
                Arc::clone(&hotkey),
            )
            .await
            .unwrap(),
        );
        let addr = server.local_addr().unwrap();

        let runner = Arc::clone(&server);
        tokio::spawn(async move {
            let _ = runner.run().await;
        });

        (server, addr, session_rx, hotkey)
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let (_server, addr, _rx, _hotkey) = test_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let response = roundtrip(&mut stream, &Request::Ping).await;
        assert!(matches!(response, Response::Pong));
    }

    #[tokio::test]
    async fn test_submit_reaches_session_queue() {
        let (_server, addr, mut rx, _hotkey) = test_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let response = roundtrip(
            &mut stream,
            &Request::SubmitText {
                text: "  héllo  ".to_string(),
            },
        )
        .await;
        assert!(matches!(response, Response::Accepted));

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::Submitted { text } if text == "héllo"));
    }

    #[tokio::test]
    async fn test_set_hotkey_swaps_live_spec() {
        let (_server, addr, _rx, hotkey) = test_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let response = roundtrip(
            &mut stream,
            &Request::SetHotkey {
                modifier: "none".to_string(),
                key: "f5".to_string(),
            },
        )
        .await;
        assert!(matches!(response, Response::HotkeyChanged { .. }));
        assert_eq!(
            hotkey.load(),
            HotkeySpec {
                key_vk: 0x74,
                modifier_vk: 0
            }
        );
    }

    #[tokio::test]
    async fn test_bad_hotkey_is_rejected() {
        let (_server, addr, _rx, hotkey) = test_server().await;
        let before = hotkey.load();
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let response = roundtrip(
            &mut stream,
            &Request::SetHotkey {
                modifier: "Ctrl".to_string(),
                key: "none".to_string(),
            },
        )
        .await;
        assert!(matches!(response, Response::Error { .. }));
        assert_eq!(hotkey.load(), before);
    }

    #[tokio::test]
    async fn test_subscriber_receives_notifications() {
        let (server, addr, _rx, _hotkey) = test_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let response = roundtrip(&mut stream, &Request::Subscribe).await;
        assert!(matches!(response, Response::Subscribed));

        let _ = server.inner.notify_tx.send(Notification::ShowSurface);
        let pushed: Notification = read_frame(&mut stream).await;
        assert!(matches!(pushed, Notification::ShowSurface));
    }
}
