//! Low-level keyboard hook
//!
//! Installs WH_KEYBOARD_LL on a dedicated thread and pumps messages there;
//! the hook procedure runs synchronously with system-wide input delivery,
//! so it does nothing beyond a value comparison and a non-blocking handoff
//! to the session queue. Windows silently revokes a hook whose procedure
//! overruns a few-hundred-millisecond budget, which is why no UI, focus or
//! injection work may ever run inside it.

use std::sync::atomic::{AtomicIsize, Ordering::SeqCst};
use std::sync::{Arc, OnceLock};
use std::thread;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use windows::Win32::Foundation::{HINSTANCE, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    TranslateMessage, UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL, WM_QUIT,
};

use crate::events::SessionEvent;

use super::keys::{self, KeyEventKind, SharedHotkey};
use super::HookInstallError;

/// LLKHF_INJECTED: the event was produced by SendInput, ours included
const LLKHF_INJECTED: u32 = 0x10;

/// State the hook procedure reads on every event
struct HookShared {
    hotkey: Arc<SharedHotkey>,
    tx: mpsc::Sender<SessionEvent>,
    hook: AtomicIsize,
}

static SHARED: OnceLock<Arc<HookShared>> = OnceLock::new();

/// Handle to the installed hook and its pumping thread
pub struct InputHook {
    thread_id: u32,
    thread: Option<thread::JoinHandle<()>>,
}

impl InputHook {
    /// Register the process as a system-wide keyboard observer
    ///
    /// Spawns the hook thread and blocks until it reports whether
    /// registration succeeded. At most one hook per process.
    pub fn install(
        hotkey: Arc<SharedHotkey>,
        tx: mpsc::Sender<SessionEvent>,
    ) -> Result<Self, HookInstallError> {
        let shared = Arc::new(HookShared {
            hotkey,
            tx,
            hook: AtomicIsize::new(0),
        });
        if SHARED.set(Arc::clone(&shared)).is_err() {
            return Err(HookInstallError::AlreadyInstalled);
        }

        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let thread = thread::Builder::new()
            .name("keyboard-hook".to_string())
            .spawn(move || run_hook_thread(shared, ready_tx))
            .map_err(|e| HookInstallError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                info!("low-level keyboard hook installed");
                Ok(Self {
                    thread_id,
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(HookInstallError::ThreadSpawn(
                    "hook thread exited before reporting".to_string(),
                ))
            }
        }
    }

    /// Tear the hook down; safe to call repeatedly
    pub fn uninstall(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        unsafe {
            let _ = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
        if thread.join().is_err() {
            warn!("hook thread panicked during shutdown");
        } else {
            info!("keyboard hook removed");
        }
    }
}

impl Drop for InputHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

fn run_hook_thread(
    shared: Arc<HookShared>,
    ready_tx: std::sync::mpsc::Sender<Result<u32, HookInstallError>>,
) {
    unsafe {
        let module = match GetModuleHandleW(None) {
            Ok(m) => m,
            Err(e) => {
                let _ = ready_tx.send(Err(HookInstallError::Registration { code: e.code().0 }));
                return;
            }
        };
        let hinst: HINSTANCE = module.into();

        let hook = match SetWindowsHookExW(WH_KEYBOARD_LL, Some(hook_proc), hinst, 0) {
            Ok(h) => h,
            Err(e) => {
                let _ = ready_tx.send(Err(HookInstallError::Registration { code: e.code().0 }));
                return;
            }
        };
        shared.hook.store(hook.0 as isize, SeqCst);
        let _ = ready_tx.send(Ok(GetCurrentThreadId()));

        // The hook only receives callbacks while this thread pumps.
        let mut msg = MSG::default();
        while GetMessageW(&mut msg, None, 0, 0).into() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        if let Err(e) = UnhookWindowsHookEx(hook) {
            warn!(error = %e, "failed to remove keyboard hook");
        }
    }
}

unsafe extern "system" fn hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let hook = match SHARED.get() {
        Some(s) => HHOOK(s.hook.load(SeqCst) as *mut _),
        None => HHOOK(std::ptr::null_mut()),
    };

    // Negative code must pass through per the hook contract
    if code < 0 {
        return CallNextHookEx(hook, code, wparam, lparam);
    }

    // No failure in here may disturb the input pipeline: classification is
    // fenced off and the event is forwarded no matter what happened.
    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| classify(wparam, lparam))).is_err()
    {
        error!("keyboard hook classification panicked");
    }

    CallNextHookEx(hook, code, wparam, lparam)
}

/// Compare one observed key transition against the configured hotkey and
/// hand off a trigger on a full match
fn classify(wparam: WPARAM, lparam: LPARAM) {
    let Some(shared) = SHARED.get() else {
        return;
    };
    let kbd = unsafe { &*(lparam.0 as *const KBDLLHOOKSTRUCT) };

    // Skip injected events (our own replayed text included) so synthetic
    // keystrokes can never re-trigger the hotkey.
    if kbd.flags.0 & LLKHF_INJECTED != 0 {
        return;
    }

    let Some(kind) = KeyEventKind::from_message(wparam.0 as u32) else {
        return;
    };

    let spec = shared.hotkey.load();
    if keys::matches(spec, kbd.vkCode, kind, modifier_held) {
        info!(vk = kbd.vkCode, "hotkey fired");
        // try_send: a full queue drops the trigger rather than stalling
        // system-wide input delivery
        if shared.tx.try_send(SessionEvent::HotkeyFired).is_err() {
            warn!("session queue full, hotkey trigger dropped");
        }
    }
}

fn modifier_held(vk: u32) -> bool {
    unsafe { GetAsyncKeyState(vk as i32) < 0 }
}
