//! Mock desktop collaborators: clipboard, keyboard, notifications, menu.

use quickreply::clipboard::{Bitmap, Clipboard};
use quickreply::error::{ReplyError, ReplyResult};
use quickreply::input::KeySimulator;
use quickreply::notify::{Notifier, NotifyIcon, UiControl};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// What was written to the clipboard
#[derive(Debug, Clone, PartialEq)]
pub enum ClipboardWrite {
    Text(String),
    Image { width: usize, height: usize },
}

#[derive(Default)]
pub struct MockClipboard {
    text: Mutex<Option<String>>,
    image: Mutex<Option<Bitmap>>,
    pub writes: Mutex<Vec<ClipboardWrite>>,
}

impl MockClipboard {
    pub fn with_text(text: &str) -> Self {
        let clip = Self::default();
        *clip.text.lock().unwrap() = Some(text.to_string());
        clip
    }

    pub fn with_image(image: Bitmap) -> Self {
        let clip = Self::default();
        *clip.image.lock().unwrap() = Some(image);
        clip
    }

    pub fn writes(&self) -> Vec<ClipboardWrite> {
        self.writes.lock().unwrap().clone()
    }
}

impl Clipboard for MockClipboard {
    fn read_text(&self) -> ReplyResult<Option<String>> {
        Ok(self.text.lock().unwrap().clone())
    }

    fn read_image(&self) -> ReplyResult<Option<Bitmap>> {
        Ok(self.image.lock().unwrap().clone())
    }

    fn write_text(&self, text: &str) -> ReplyResult<()> {
        *self.text.lock().unwrap() = Some(text.to_string());
        self.writes
            .lock()
            .unwrap()
            .push(ClipboardWrite::Text(text.to_string()));
        Ok(())
    }

    fn write_image(&self, image: &Bitmap) -> ReplyResult<()> {
        *self.image.lock().unwrap() = Some(image.clone());
        self.writes.lock().unwrap().push(ClipboardWrite::Image {
            width: image.width,
            height: image.height,
        });
        Ok(())
    }
}

/// Counts simulated shortcuts
#[derive(Default)]
pub struct MockKeys {
    pub copies: AtomicUsize,
    pub pastes: AtomicUsize,
    pub fail_paste: AtomicBool,
}

impl MockKeys {
    pub fn copies(&self) -> usize {
        self.copies.load(Ordering::SeqCst)
    }

    pub fn pastes(&self) -> usize {
        self.pastes.load(Ordering::SeqCst)
    }
}

impl KeySimulator for MockKeys {
    fn copy_selection(&self) -> ReplyResult<()> {
        self.copies.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn paste(&self) -> ReplyResult<()> {
        self.pastes.fetch_add(1, Ordering::SeqCst);
        if self.fail_paste.load(Ordering::SeqCst) {
            return Err(ReplyError::Input("paste rejected".to_string()));
        }
        Ok(())
    }
}

/// Records every notification
#[derive(Default)]
pub struct MockNotifier {
    pub sent: Mutex<Vec<(String, Option<NotifyIcon>)>>,
}

impl MockNotifier {
    pub fn with_icon(&self, icon: NotifyIcon) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, i)| *i == Some(icon))
            .map(|(text, _)| text.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.with_icon(NotifyIcon::Error)
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, text: &str, icon: Option<NotifyIcon>) {
        self.sent.lock().unwrap().push((text.to_string(), icon));
    }
}

/// Records enable/disable calls
#[derive(Default)]
pub struct MockUi {
    pub calls: Mutex<Vec<bool>>,
}

impl MockUi {
    pub fn calls(&self) -> Vec<bool> {
        self.calls.lock().unwrap().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.calls().last().copied().unwrap_or(true)
    }
}

impl UiControl for MockUi {
    fn set_enabled(&self, enabled: bool) {
        self.calls.lock().unwrap().push(enabled);
    }
}
