//! Global input listeners
//!
//! One OS hook (`rdev::listen`) feeds every key and button event into a
//! channel. `ListenerLifecycle` turns that stream into two kinds of
//! subscription:
//!
//! - hotkeys: long-lived, fire on every matching chord while the controller
//!   is idle, and run the copy interaction before asking for a session
//! - the pointer: single-shot, armed only while a reply waits for delivery;
//!   the first left click disarms it, pastes, then reports back

use crate::config::HotkeyBinding;
use crate::error::{ReplyError, ReplyResult};
use crate::input::{copy_interaction, parse_key, paste_interaction, KeySimulator, SettleDelays};
use crate::notify::{Notifier, NotifyIcon};
use crate::session::{ControlMessage, SessionGate};
use rdev::{Button, EventType, Key};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

/// Called once the paste has been attempted
pub type DeliveryCallback = Box<dyn FnOnce(ReplyResult<()>) + Send>;

/// Modifier keys, folding left/right variants together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
    Meta,
}

impl Modifier {
    pub fn from_key(key: Key) -> Option<Self> {
        match key {
            Key::ControlLeft | Key::ControlRight => Some(Modifier::Ctrl),
            Key::ShiftLeft | Key::ShiftRight => Some(Modifier::Shift),
            Key::Alt | Key::AltGr => Some(Modifier::Alt),
            Key::MetaLeft | Key::MetaRight => Some(Modifier::Meta),
            _ => None,
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "CTRL" | "CONTROL" | "LCTRL" | "RCTRL" => Some(Modifier::Ctrl),
            "SHIFT" | "LSHIFT" | "RSHIFT" => Some(Modifier::Shift),
            "ALT" | "LALT" | "RALT" | "OPTION" => Some(Modifier::Alt),
            "META" | "SUPER" | "WIN" | "CMD" => Some(Modifier::Meta),
            _ => None,
        }
    }
}

/// A key chord such as `ctrl+shift+x`
#[derive(Debug, Clone, PartialEq)]
pub struct Hotkey {
    pub modifiers: Vec<Modifier>,
    pub key: Key,
}

impl Hotkey {
    /// Parse `ctrl+shift+x`; `<ctrl>+<shift>+x` is accepted too.
    pub fn parse(combo: &str) -> ReplyResult<Self> {
        let mut modifiers = Vec::new();
        let mut key = None;

        for part in combo.split('+') {
            let name = part
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_uppercase();
            if name.is_empty() {
                return Err(ReplyError::Config(format!("empty key in hotkey '{combo}'")));
            }
            if let Some(modifier) = Modifier::parse(&name) {
                if !modifiers.contains(&modifier) {
                    modifiers.push(modifier);
                }
                continue;
            }
            let parsed = parse_key(&name)
                .ok_or_else(|| ReplyError::Config(format!("unknown key '{name}' in '{combo}'")))?;
            if key.replace(parsed).is_some() {
                return Err(ReplyError::Config(format!(
                    "hotkey '{combo}' has more than one non-modifier key"
                )));
            }
        }

        let key = key.ok_or_else(|| ReplyError::Config(format!("hotkey '{combo}' has no key")))?;
        Ok(Self { modifiers, key })
    }

    /// The held modifiers must be exactly the chord's modifiers; an extra
    /// one (say Alt on top of Ctrl+Shift) is a different chord.
    fn matches(&self, key: Key, held: &[Key]) -> bool {
        if key != self.key {
            return false;
        }
        let pressed: Vec<Modifier> = held.iter().filter_map(|k| Modifier::from_key(*k)).collect();
        pressed.iter().all(|m| self.modifiers.contains(m))
            && self.modifiers.iter().all(|m| pressed.contains(m))
    }
}

/// What a subscription listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    Hotkey,
    Pointer,
}

/// One armed-or-not hook
#[derive(Debug)]
pub struct Subscription {
    kind: ListenerKind,
    armed: AtomicBool,
    single_shot: bool,
}

impl Subscription {
    pub fn persistent(kind: ListenerKind) -> Self {
        Self {
            kind,
            armed: AtomicBool::new(false),
            single_shot: false,
        }
    }

    pub fn single_shot(kind: ListenerKind) -> Self {
        Self {
            kind,
            armed: AtomicBool::new(false),
            single_shot: true,
        }
    }

    pub fn kind(&self) -> ListenerKind {
        self.kind
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Returns whether it was armed
    pub fn disarm(&self) -> bool {
        self.armed.swap(false, Ordering::SeqCst)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn is_single_shot(&self) -> bool {
        self.single_shot
    }

    /// Claim a firing. Single-shot subscriptions disarm atomically, so only
    /// one caller ever wins.
    pub fn try_fire(&self) -> bool {
        if self.single_shot {
            self.armed.swap(false, Ordering::SeqCst)
        } else {
            self.is_armed()
        }
    }
}

struct HotkeySubscription {
    combo: String,
    hotkey: Hotkey,
    method: String,
    subscription: Subscription,
}

struct PendingDelivery {
    session_id: u64,
    on_complete: DeliveryCallback,
}

pub struct ListenerLifecycle {
    hotkeys: Vec<HotkeySubscription>,
    pointer: Subscription,
    pending: Mutex<Option<PendingDelivery>>,
    control: mpsc::UnboundedSender<ControlMessage>,
    keys: Arc<dyn KeySimulator>,
    notifier: Arc<dyn Notifier>,
    gate: SessionGate,
    delays: SettleDelays,
    stop: Notify,
}

impl ListenerLifecycle {
    pub fn new(
        bindings: &[HotkeyBinding],
        control: mpsc::UnboundedSender<ControlMessage>,
        keys: Arc<dyn KeySimulator>,
        notifier: Arc<dyn Notifier>,
        gate: SessionGate,
        delays: SettleDelays,
    ) -> ReplyResult<Self> {
        let mut hotkeys = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let hotkey = Hotkey::parse(&binding.combo)?;
            let subscription = Subscription::persistent(ListenerKind::Hotkey);
            subscription.arm();
            info!("⌨️ Hotkey {} → '{}'", binding.combo, binding.method);
            hotkeys.push(HotkeySubscription {
                combo: binding.combo.clone(),
                hotkey,
                method: binding.method.clone(),
                subscription,
            });
        }

        Ok(Self {
            hotkeys,
            pointer: Subscription::single_shot(ListenerKind::Pointer),
            pending: Mutex::new(None),
            control,
            keys,
            notifier,
            gate,
            delays,
            stop: Notify::new(),
        })
    }

    /// Arm the pointer for one delivery
    pub fn arm_pointer(&self, session_id: u64, on_complete: DeliveryCallback) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(stale) = pending.replace(PendingDelivery {
            session_id,
            on_complete,
        }) {
            warn!("Replacing pointer subscription of session {}", stale.session_id);
        }
        self.pointer.arm();
        debug!("🖱️ Pointer armed for session {}", session_id);
    }

    /// Drop the pointer subscription without firing it
    pub fn disarm_pointer(&self) {
        let was_armed = self.pointer.disarm();
        let dropped = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if was_armed || dropped.is_some() {
            debug!("🖱️ Pointer disarmed");
        }
    }

    pub fn pointer_armed(&self) -> bool {
        self.pointer.is_armed()
    }

    /// Disarm everything and stop the dispatch loop
    pub fn shutdown(&self) {
        for hk in &self.hotkeys {
            if hk.subscription.disarm() {
                debug!("Hotkey {} unregistered", hk.combo);
            }
        }
        self.disarm_pointer();
        self.stop.notify_one();
        info!("Listeners shut down");
    }

    /// Dispatch loop; runs until `shutdown` or the event source goes away
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<EventType>) {
        let mut held: Vec<Key> = Vec::new();
        loop {
            tokio::select! {
                _ = self.stop.notified() => break,
                event = events.recv() => match event {
                    Some(event) => self.dispatch(&mut held, event),
                    None => break,
                },
            }
        }
        debug!("Listener dispatch loop ended");
    }

    fn dispatch(&self, held: &mut Vec<Key>, event: EventType) {
        match event {
            EventType::KeyPress(key) => {
                // Auto-repeat sends presses without releases
                if held.contains(&key) {
                    return;
                }
                held.push(key);
                if Modifier::from_key(key).is_some() {
                    return;
                }
                if let Some(hk) = self.hotkeys.iter().find(|hk| hk.hotkey.matches(key, held)) {
                    if hk.subscription.try_fire() {
                        self.on_hotkey(hk.method.clone());
                    }
                }
            }
            EventType::KeyRelease(key) => held.retain(|k| *k != key),
            EventType::ButtonPress(Button::Left) => self.on_pointer_down(),
            _ => {}
        }
    }

    fn on_hotkey(&self, method: String) {
        if !self.gate.is_idle() {
            debug!("Hotkey ignored: a reply is in progress");
            self.notifier
                .notify(&ReplyError::ConcurrentSession.to_string(), Some(NotifyIcon::Busy));
            return;
        }

        info!("Hotkey triggered for '{}'", method);
        let keys = self.keys.clone();
        let delays = self.delays;
        let control = self.control.clone();
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            let copied = tokio::task::spawn_blocking(move || copy_interaction(keys.as_ref(), delays))
                .await
                .unwrap_or_else(|e| Err(ReplyError::Input(e.to_string())));
            match copied {
                Ok(()) => {
                    let _ = control.send(ControlMessage::CaptureRequested { method });
                }
                Err(e) => {
                    warn!("Copy interaction failed: {}", e);
                    notifier.notify(&e.to_string(), Some(NotifyIcon::Error));
                }
            }
        });
    }

    fn on_pointer_down(&self) {
        if !self.pointer.try_fire() {
            return;
        }
        let Some(pending) = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return;
        };

        info!("🖱️ Click received, pasting reply");
        let _ = self.control.send(ControlMessage::PointerFired {
            session_id: pending.session_id,
        });

        let keys = self.keys.clone();
        let delays = self.delays;
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || paste_interaction(keys.as_ref(), delays))
                .await
                .unwrap_or_else(|e| Err(ReplyError::Input(e.to_string())));
            (pending.on_complete)(result);
        });
    }
}

/// Start the OS-level hook on its own thread.
///
/// `rdev::listen` never returns while the hook is alive, so the thread is not
/// joined; it ends with the process.
pub fn spawn_event_source(
    tx: mpsc::UnboundedSender<EventType>,
) -> ReplyResult<std::thread::JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("input-hook".to_string())
        .spawn(move || {
            let result = rdev::listen(move |event| {
                if matches!(
                    event.event_type,
                    EventType::KeyPress(_)
                        | EventType::KeyRelease(_)
                        | EventType::ButtonPress(_)
                ) {
                    let _ = tx.send(event.event_type);
                }
            });
            if let Err(e) = result {
                error!("❌ Global input hook failed: {:?}", e);
            }
        })?;
    Ok(handle)
}
