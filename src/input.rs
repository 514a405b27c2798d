//! Input simulation and key names using rdev
//!
//! Provides the copy/paste keystrokes that bracket a reply session, and the
//! key-name vocabulary used by hotkey bindings.

use crate::error::{ReplyError, ReplyResult};
use rdev::{simulate, EventType, Key};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Modifier held for clipboard shortcuts
#[cfg(target_os = "macos")]
const SHORTCUT_MODIFIER: Key = Key::MetaLeft;
#[cfg(not(target_os = "macos"))]
const SHORTCUT_MODIFIER: Key = Key::ControlLeft;

/// Keystroke collaborator
pub trait KeySimulator: Send + Sync {
    /// Copy the current selection (Ctrl+C)
    fn copy_selection(&self) -> ReplyResult<()>;

    /// Paste the clipboard at the focused location (Ctrl+V)
    fn paste(&self) -> ReplyResult<()>;
}

/// Fixed settle delays around the simulated shortcuts
#[derive(Debug, Clone, Copy)]
pub struct SettleDelays {
    pub copy: Duration,
    pub paste: Duration,
}

impl SettleDelays {
    pub fn from_millis(copy_ms: u64, paste_ms: u64) -> Self {
        Self {
            copy: Duration::from_millis(copy_ms),
            paste: Duration::from_millis(paste_ms),
        }
    }

    pub fn none() -> Self {
        Self::from_millis(0, 0)
    }
}

/// Wait, copy, wait. Blocking: run off the event thread.
pub fn copy_interaction(sim: &dyn KeySimulator, delays: SettleDelays) -> ReplyResult<()> {
    thread::sleep(delays.copy);
    sim.copy_selection()?;
    thread::sleep(delays.copy);
    Ok(())
}

/// Wait for the click to land focus, then paste. Blocking.
pub fn paste_interaction(sim: &dyn KeySimulator, delays: SettleDelays) -> ReplyResult<()> {
    thread::sleep(delays.paste);
    sim.paste()
}

/// Virtual keyboard backed by `rdev::simulate`
#[derive(Debug, Default)]
pub struct RdevKeyboard;

impl RdevKeyboard {
    pub fn new() -> Self {
        Self
    }

    fn send(&self, event: &EventType) -> ReplyResult<()> {
        debug!("Simulating {:?}", event);
        simulate(event).map_err(|_| ReplyError::Input(format!("could not simulate {:?}", event)))?;
        // Some platforms drop events that arrive back to back.
        thread::sleep(Duration::from_millis(20));
        Ok(())
    }

    /// Type a key combination (e.g., Ctrl+C)
    pub fn key_combo(&self, modifiers: &[Key], key: Key) -> ReplyResult<()> {
        for modifier in modifiers {
            self.send(&EventType::KeyPress(*modifier))?;
        }

        let tapped = self
            .send(&EventType::KeyPress(key))
            .and_then(|_| self.send(&EventType::KeyRelease(key)));

        // Release modifiers in reverse order even if the tap failed
        for modifier in modifiers.iter().rev() {
            self.send(&EventType::KeyRelease(*modifier))?;
        }
        tapped
    }
}

impl KeySimulator for RdevKeyboard {
    fn copy_selection(&self) -> ReplyResult<()> {
        self.key_combo(&[SHORTCUT_MODIFIER], Key::KeyC)
    }

    fn paste(&self) -> ReplyResult<()> {
        self.key_combo(&[SHORTCUT_MODIFIER], Key::KeyV)
    }
}

/// Parse a key name string to an rdev Key (modifiers excluded)
pub fn parse_key(name: &str) -> Option<Key> {
    match name.to_uppercase().as_str() {
        // Letters
        "A" => Some(Key::KeyA),
        "B" => Some(Key::KeyB),
        "C" => Some(Key::KeyC),
        "D" => Some(Key::KeyD),
        "E" => Some(Key::KeyE),
        "F" => Some(Key::KeyF),
        "G" => Some(Key::KeyG),
        "H" => Some(Key::KeyH),
        "I" => Some(Key::KeyI),
        "J" => Some(Key::KeyJ),
        "K" => Some(Key::KeyK),
        "L" => Some(Key::KeyL),
        "M" => Some(Key::KeyM),
        "N" => Some(Key::KeyN),
        "O" => Some(Key::KeyO),
        "P" => Some(Key::KeyP),
        "Q" => Some(Key::KeyQ),
        "R" => Some(Key::KeyR),
        "S" => Some(Key::KeyS),
        "T" => Some(Key::KeyT),
        "U" => Some(Key::KeyU),
        "V" => Some(Key::KeyV),
        "W" => Some(Key::KeyW),
        "X" => Some(Key::KeyX),
        "Y" => Some(Key::KeyY),
        "Z" => Some(Key::KeyZ),
        // Numbers
        "0" => Some(Key::Num0),
        "1" => Some(Key::Num1),
        "2" => Some(Key::Num2),
        "3" => Some(Key::Num3),
        "4" => Some(Key::Num4),
        "5" => Some(Key::Num5),
        "6" => Some(Key::Num6),
        "7" => Some(Key::Num7),
        "8" => Some(Key::Num8),
        "9" => Some(Key::Num9),
        // Function keys
        "F1" => Some(Key::F1),
        "F2" => Some(Key::F2),
        "F3" => Some(Key::F3),
        "F4" => Some(Key::F4),
        "F5" => Some(Key::F5),
        "F6" => Some(Key::F6),
        "F7" => Some(Key::F7),
        "F8" => Some(Key::F8),
        "F9" => Some(Key::F9),
        "F10" => Some(Key::F10),
        "F11" => Some(Key::F11),
        "F12" => Some(Key::F12),
        // Navigation
        "UP" => Some(Key::UpArrow),
        "DOWN" => Some(Key::DownArrow),
        "LEFT" => Some(Key::LeftArrow),
        "RIGHT" => Some(Key::RightArrow),
        "HOME" => Some(Key::Home),
        "END" => Some(Key::End),
        "PAGEUP" | "PGUP" => Some(Key::PageUp),
        "PAGEDOWN" | "PGDN" => Some(Key::PageDown),
        // Common
        "SPACE" => Some(Key::Space),
        "ENTER" | "RETURN" => Some(Key::Return),
        "TAB" => Some(Key::Tab),
        "ESC" | "ESCAPE" => Some(Key::Escape),
        "BACKSPACE" => Some(Key::Backspace),
        "DELETE" | "DEL" => Some(Key::Delete),
        "INSERT" | "INS" => Some(Key::Insert),
        "PAUSE" => Some(Key::Pause),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Default)]
    struct CountingKeys {
        copies: AtomicUsize,
        pastes: AtomicUsize,
    }

    impl KeySimulator for CountingKeys {
        fn copy_selection(&self) -> ReplyResult<()> {
            self.copies.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn paste(&self) -> ReplyResult<()> {
            self.pastes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("a"), Some(Key::KeyA));
        assert_eq!(parse_key("X"), Some(Key::KeyX));
        assert_eq!(parse_key("F1"), Some(Key::F1));
        assert_eq!(parse_key("space"), Some(Key::Space));
        assert_eq!(parse_key("ctrl"), None);
        assert_eq!(parse_key("unknown"), None);
    }

    #[test]
    fn test_copy_interaction_waits_on_both_sides() {
        let keys = CountingKeys::default();
        let start = Instant::now();
        copy_interaction(&keys, SettleDelays::from_millis(20, 0)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(keys.copies.load(Ordering::SeqCst), 1);
        assert_eq!(keys.pastes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_paste_interaction() {
        let keys = CountingKeys::default();
        paste_interaction(&keys, SettleDelays::none()).unwrap();
        assert_eq!(keys.pastes.load(Ordering::SeqCst), 1);
    }
}
