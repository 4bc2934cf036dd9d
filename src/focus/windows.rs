//! Win32 foreground controller
//!
//! SetForegroundWindow is refused for a thread that does not already own the
//! foreground, so the controller temporarily attaches its input processing
//! state to the thread owning the target window, issues the request, and
//! detaches again. When the calling thread already owns the target's input
//! state the attach/detach is skipped and the request goes out directly.
//! The same dance covers both directions: raising the capture surface and
//! restoring the previously active window.

use tracing::debug;

use windows::Win32::Foundation::{FALSE, HWND, TRUE};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::AttachThreadInput;
use windows::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, GetWindowThreadProcessId, IsWindow, SetForegroundWindow,
};

use super::{FocusError, ForegroundController, WindowHandle};

#[derive(Debug, Default)]
pub struct WindowsForegroundController;

impl WindowsForegroundController {
    pub fn new() -> Self {
        Self
    }
}

impl ForegroundController for WindowsForegroundController {
    fn current_foreground(&self) -> Option<WindowHandle> {
        let hwnd = unsafe { GetForegroundWindow() };
        if hwnd.0.is_null() {
            None
        } else {
            Some(WindowHandle(hwnd.0 as isize))
        }
    }

    fn bring_to_foreground(&self, window: WindowHandle) -> Result<(), FocusError> {
        let hwnd = HWND(window.0 as *mut _);

        unsafe {
            if !IsWindow(hwnd).as_bool() {
                return Err(FocusError::WindowGone(window));
            }

            let target_thread = GetWindowThreadProcessId(hwnd, None);
            let own_thread = GetCurrentThreadId();

            let ok = if target_thread != 0 && target_thread != own_thread {
                let _ = AttachThreadInput(own_thread, target_thread, TRUE);
                let ok = SetForegroundWindow(hwnd).as_bool();
                let _ = AttachThreadInput(own_thread, target_thread, FALSE);
                ok
            } else {
                SetForegroundWindow(hwnd).as_bool()
            };

            if ok {
                debug!(window = window.0, "foreground change accepted");
                Ok(())
            } else {
                Err(FocusError::Refused(window))
            }
        }
    }
}
