//! Notification and UI collaborators
//!
//! Toasts and the reply menu live outside this crate; the controller only
//! talks to them through these traits.

use tracing::{info, warn};

/// Icon hint for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyIcon {
    /// Reply staged, waiting for the click
    Ready,
    Busy,
    Error,
}

/// Fire-and-forget user notification
pub trait Notifier: Send + Sync {
    fn notify(&self, text: &str, icon: Option<NotifyIcon>);
}

/// Enables/disables the reply menu while a session runs
pub trait UiControl: Send + Sync {
    fn set_enabled(&self, enabled: bool);
}

/// Headless notifier that writes to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, text: &str, icon: Option<NotifyIcon>) {
        match icon {
            Some(NotifyIcon::Error) => warn!("🔔 {}", text),
            _ => info!("🔔 {}", text),
        }
    }
}

/// No menu to toggle
#[derive(Debug, Default)]
pub struct HeadlessUi;

impl UiControl for HeadlessUi {
    fn set_enabled(&self, _enabled: bool) {}
}
