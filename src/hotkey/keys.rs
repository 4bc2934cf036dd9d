//! Virtual-key definitions and hotkey classification
//!
//! Provides Windows virtual-key constants, name lookup for the persisted
//! settings format, and the pure classifier the low-level hook runs for
//! every observed keystroke.

use std::sync::atomic::{AtomicU32, Ordering};

/// Virtual-key codes referenced by the daemon
///
/// Raw values rather than `windows` crate constants so the classifier and
/// its tests build on every host.
pub mod vk {
    /// Shift key (either side)
    pub const SHIFT: u32 = 0x10;
    /// Control key (either side)
    pub const CONTROL: u32 = 0x11;
    /// Alt key (VK_MENU)
    pub const ALT: u32 = 0x12;
    /// Left Windows key
    pub const LWIN: u32 = 0x5B;
    /// Backtick / tilde key (VK_OEM_3)
    pub const BACKTICK: u32 = 0xC0;
    /// Space bar
    pub const SPACE: u32 = 0x20;
}

/// Key transition kinds observable by a low-level keyboard hook
///
/// `SysKeyDown`/`SysKeyUp` are the variants delivered while an Alt chord is
/// held; the hotkey must match on both plain and chorded key-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    KeyDown,
    KeyUp,
    SysKeyDown,
    SysKeyUp,
}

impl KeyEventKind {
    /// Decode a hook `wParam` message identifier (WM_KEYDOWN family)
    pub fn from_message(msg: u32) -> Option<Self> {
        match msg {
            0x0100 => Some(Self::KeyDown),
            0x0101 => Some(Self::KeyUp),
            0x0104 => Some(Self::SysKeyDown),
            0x0105 => Some(Self::SysKeyUp),
            _ => None,
        }
    }

    /// True for the transitions the hotkey may fire on
    pub fn is_down(self) -> bool {
        matches!(self, Self::KeyDown | Self::SysKeyDown)
    }
}

/// The key/modifier value pair a keystroke is compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeySpec {
    /// Main key, required
    pub key_vk: u32,
    /// Modifier that must be held, 0 for none
    pub modifier_vk: u32,
}

/// Classify one observed key transition against the configured hotkey
///
/// Pure value comparison: `modifier_held` is queried only when the spec
/// carries a modifier and the main key already matched, so the common
/// non-matching path costs two integer compares.
pub fn matches<F>(spec: HotkeySpec, vk: u32, kind: KeyEventKind, modifier_held: F) -> bool
where
    F: FnOnce(u32) -> bool,
{
    if !kind.is_down() || vk != spec.key_vk {
        return false;
    }
    spec.modifier_vk == 0 || modifier_held(spec.modifier_vk)
}

/// Hot-swappable hotkey cell shared between the hook thread and the
/// coordinator side
///
/// The hook re-reads it on every event, so replacing the pair takes effect
/// immediately without reinstalling the hook. The two fields are swapped
/// independently; a torn read across a rebind can at worst match the old
/// key with the new modifier for a single keystroke.
#[derive(Debug)]
pub struct SharedHotkey {
    key: AtomicU32,
    modifier: AtomicU32,
}

impl SharedHotkey {
    pub fn new(spec: HotkeySpec) -> Self {
        Self {
            key: AtomicU32::new(spec.key_vk),
            modifier: AtomicU32::new(spec.modifier_vk),
        }
    }

    pub fn load(&self) -> HotkeySpec {
        HotkeySpec {
            key_vk: self.key.load(Ordering::Relaxed),
            modifier_vk: self.modifier.load(Ordering::Relaxed),
        }
    }

    pub fn store(&self, spec: HotkeySpec) {
        self.key.store(spec.key_vk, Ordering::Relaxed);
        self.modifier.store(spec.modifier_vk, Ordering::Relaxed);
    }
}

/// Resolve a settings key name to a virtual-key code
///
/// Accepts the names the configuration UI writes: modifier names, letters,
/// digits, function keys and a few named punctuation keys.
pub fn vk_from_name(name: &str) -> Option<u32> {
    let lower = name.trim().to_ascii_lowercase();
    match lower.as_str() {
        "" | "none" => Some(0),
        "ctrl" | "control" => Some(vk::CONTROL),
        "alt" => Some(vk::ALT),
        "shift" => Some(vk::SHIFT),
        "win" => Some(vk::LWIN),
        "space" => Some(vk::SPACE),
        "backtick" | "`" | "tilde" => Some(vk::BACKTICK),
        _ => {
            let mut chars = lower.chars();
            match (chars.next(), chars.next()) {
                (Some(c @ 'a'..='z'), None) => Some(c as u32 - 'a' as u32 + 0x41),
                (Some(c @ '0'..='9'), None) => Some(c as u32 - '0' as u32 + 0x30),
                (Some('f'), Some(_)) => match lower[1..].parse::<u32>() {
                    Ok(n @ 1..=12) => Some(0x6F + n),
                    _ => None,
                },
                _ => None,
            }
        }
    }
}

/// Human-readable name for a virtual-key code, for status output and logs
pub fn vk_name(vk_code: u32) -> String {
    match vk_code {
        0 => "None".to_string(),
        vk::SHIFT => "Shift".to_string(),
        vk::CONTROL => "Ctrl".to_string(),
        vk::ALT => "Alt".to_string(),
        vk::LWIN => "Win".to_string(),
        vk::SPACE => "Space".to_string(),
        vk::BACKTICK => "Backtick".to_string(),
        0x30..=0x39 | 0x41..=0x5A => ((vk_code as u8) as char).to_string(),
        0x70..=0x7B => format!("F{}", vk_code - 0x6F),
        _ => format!("VK_{vk_code:02X}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTRL_BACKTICK: HotkeySpec = HotkeySpec {
        key_vk: vk::BACKTICK,
        modifier_vk: vk::CONTROL,
    };

    #[test]
    fn test_matches_with_modifier_held() {
        assert!(matches(CTRL_BACKTICK, vk::BACKTICK, KeyEventKind::KeyDown, |m| {
            m == vk::CONTROL
        }));
    }

    #[test]
    fn test_no_match_when_modifier_released() {
        assert!(!matches(CTRL_BACKTICK, vk::BACKTICK, KeyEventKind::KeyDown, |_| false));
    }

    #[test]
    fn test_no_match_on_key_up() {
        assert!(!matches(CTRL_BACKTICK, vk::BACKTICK, KeyEventKind::KeyUp, |_| true));
        assert!(!matches(CTRL_BACKTICK, vk::BACKTICK, KeyEventKind::SysKeyUp, |_| true));
    }

    #[test]
    fn test_matches_alt_chorded_key_down() {
        // SYSKEYDOWN is what the hook sees while Alt is held
        let spec = HotkeySpec {
            key_vk: vk::BACKTICK,
            modifier_vk: vk::ALT,
        };
        assert!(matches(spec, vk::BACKTICK, KeyEventKind::SysKeyDown, |m| m == vk::ALT));
    }

    #[test]
    fn test_modifierless_spec_skips_modifier_query() {
        let spec = HotkeySpec {
            key_vk: 0x70,
            modifier_vk: 0,
        };
        assert!(matches(spec, 0x70, KeyEventKind::KeyDown, |_| {
            panic!("modifier query must not run for a modifierless hotkey")
        }));
    }

    #[test]
    fn test_no_match_on_other_key() {
        assert!(!matches(CTRL_BACKTICK, 0x41, KeyEventKind::KeyDown, |_| true));
    }

    #[test]
    fn test_event_kind_decoding() {
        assert_eq!(KeyEventKind::from_message(0x0100), Some(KeyEventKind::KeyDown));
        assert_eq!(KeyEventKind::from_message(0x0104), Some(KeyEventKind::SysKeyDown));
        assert_eq!(KeyEventKind::from_message(0x0101), Some(KeyEventKind::KeyUp));
        assert_eq!(KeyEventKind::from_message(0x0200), None);
    }

    #[test]
    fn test_shared_hotkey_swap() {
        let shared = SharedHotkey::new(CTRL_BACKTICK);
        assert_eq!(shared.load(), CTRL_BACKTICK);

        let rebound = HotkeySpec {
            key_vk: 0x71,
            modifier_vk: 0,
        };
        shared.store(rebound);
        assert_eq!(shared.load(), rebound);
    }

    #[test]
    fn test_name_round_trips() {
        assert_eq!(vk_from_name("Ctrl"), Some(vk::CONTROL));
        assert_eq!(vk_from_name("none"), Some(0));
        assert_eq!(vk_from_name("backtick"), Some(vk::BACKTICK));
        assert_eq!(vk_from_name("f5"), Some(0x74));
        assert_eq!(vk_from_name("q"), Some(0x51));
        assert_eq!(vk_from_name("7"), Some(0x37));
        assert_eq!(vk_from_name("f13"), None);
        assert_eq!(vk_from_name("bogus"), None);

        assert_eq!(vk_name(vk::CONTROL), "Ctrl");
        assert_eq!(vk_name(0x51), "Q");
        assert_eq!(vk_name(0x74), "F5");
        assert_eq!(vk_name(0), "None");
    }
}
