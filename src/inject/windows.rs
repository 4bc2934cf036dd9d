//! SendInput-backed injection
//!
//! Every event carries its code unit in `wScan` with KEYEVENTF_UNICODE and
//! a zero virtual key, which bypasses keyboard-layout mapping. The whole
//! batch goes down in a single SendInput call so the returned count can be
//! compared against the expected total.

use std::mem;

use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_KEYUP, KEYEVENTF_UNICODE,
    VIRTUAL_KEY,
};

use super::{InputBackend, KeyDirection, SyntheticKey};

/// Injects keystrokes through the Win32 SendInput primitive
#[derive(Debug, Default)]
pub struct SendInputBackend;

impl SendInputBackend {
    pub fn new() -> Self {
        Self
    }
}

impl InputBackend for SendInputBackend {
    fn submit(&self, batch: &[SyntheticKey]) -> usize {
        if batch.is_empty() {
            return 0;
        }

        let inputs: Vec<INPUT> = batch.iter().map(to_input).collect();
        let accepted = unsafe { SendInput(&inputs, mem::size_of::<INPUT>() as i32) };
        accepted as usize
    }
}

fn to_input(key: &SyntheticKey) -> INPUT {
    let flags = match key.direction {
        KeyDirection::Press => KEYEVENTF_UNICODE,
        KeyDirection::Release => KEYEVENTF_UNICODE | KEYEVENTF_KEYUP,
    };
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(0),
                wScan: key.code_unit,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}
