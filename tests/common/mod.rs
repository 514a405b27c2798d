#![allow(dead_code)]

pub mod mock_backend;
pub mod mock_desktop;

use mock_backend::MockBackend;
use mock_desktop::{MockClipboard, MockKeys, MockNotifier, MockUi};
use quickreply::clipboard::NoTextExtractor;
use quickreply::config::HotkeyBinding;
use quickreply::history::AntiRepeatWindow;
use quickreply::input::SettleDelays;
use quickreply::listener::ListenerLifecycle;
use quickreply::media::MediaLibrary;
use quickreply::method::{default_methods, MethodCatalog};
use quickreply::prompts::PromptCatalog;
use quickreply::resolver::ArtifactResolver;
use quickreply::session::{
    control_channel, ControllerHandle, SessionController, SessionGate, SessionState,
};
use quickreply::worker::{GenerationSettings, ReplyPipeline, SessionWorker};
use rdev::{Button, EventType, Key};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(5);

/// Pool used by the `mygo` media method
pub const MEDIA_POOL: [&str; 3] = ["a.jpg", "b.jpg", "c.jpg"];

/// Assets laid out the way the daemon expects them
pub fn write_assets(root: &std::path::Path) {
    let prompts = root.join("prompts");
    std::fs::create_dir_all(&prompts).unwrap();
    for id in ["normal", "refute", "toxic"] {
        std::fs::write(prompts.join(format!("{id}.txt")), format!("Reply in a {id} tone.")).unwrap();
    }
    std::fs::write(
        prompts.join("mygo.txt"),
        "Pick one of: {pics}\nAnswer as {{\"meme_file\": \"<name>\"}}",
    )
    .unwrap();

    let media = root.join("mygo");
    std::fs::create_dir_all(&media).unwrap();
    for name in MEDIA_POOL {
        image::RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 30]))
            .save(media.join(name))
            .unwrap();
    }
}

pub struct HarnessOptions {
    pub settings: GenerationSettings,
    pub hotkeys: Vec<HotkeyBinding>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            settings: GenerationSettings::default(),
            hotkeys: vec![HotkeyBinding {
                combo: "ctrl+shift+x".to_string(),
                method: "normal".to_string(),
            }],
        }
    }
}

/// A fully wired controller with mocked desktop collaborators
pub struct Harness {
    pub dir: TempDir,
    pub backend: Arc<MockBackend>,
    pub clipboard: Arc<MockClipboard>,
    pub keys: Arc<MockKeys>,
    pub notifier: Arc<MockNotifier>,
    pub ui: Arc<MockUi>,
    pub window: Arc<AntiRepeatWindow>,
    pub listeners: Arc<ListenerLifecycle>,
    pub handle: ControllerHandle,
    pub events: mpsc::UnboundedSender<EventType>,
    pub actor: JoinHandle<()>,
}

impl Harness {
    pub fn start(backend: MockBackend, clipboard: MockClipboard) -> Self {
        Self::start_with(backend, clipboard, HarnessOptions::default())
    }

    pub fn start_with(backend: MockBackend, clipboard: MockClipboard, opts: HarnessOptions) -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_assets(dir.path());

        let backend = Arc::new(backend);
        let clipboard = Arc::new(clipboard);
        let keys = Arc::new(MockKeys::default());
        let notifier = Arc::new(MockNotifier::default());
        let ui = Arc::new(MockUi::default());
        let window = Arc::new(AntiRepeatWindow::new());

        let library = MediaLibrary::new(dir.path());
        let pipeline = ReplyPipeline::new(
            PromptCatalog::new(dir.path().join("prompts"), library.clone()),
            backend.clone(),
            ArtifactResolver::new(library, window.clone()),
            window.clone(),
            opts.settings,
        );
        let worker = Arc::new(SessionWorker::new(
            clipboard.clone(),
            Arc::new(NoTextExtractor),
            pipeline,
        ));

        let gate = SessionGate::new();
        let (control, inbox) = control_channel();
        let listeners = Arc::new(
            ListenerLifecycle::new(
                &opts.hotkeys,
                control.clone(),
                keys.clone(),
                notifier.clone(),
                gate.clone(),
                SettleDelays::none(),
            )
            .unwrap(),
        );

        let controller = SessionController::new(
            MethodCatalog::new(default_methods()).unwrap(),
            worker,
            listeners.clone(),
            notifier.clone(),
            ui.clone(),
            gate,
            (control, inbox),
        )
        .with_shutdown_grace(Duration::from_millis(200));
        let handle = controller.handle();
        let actor = tokio::spawn(controller.run());

        let (events, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(listeners.clone().run(events_rx));

        Self {
            dir,
            backend,
            clipboard,
            keys,
            notifier,
            ui,
            window,
            listeners,
            handle,
            events,
            actor,
        }
    }

    pub fn media_path(&self, name: &str) -> PathBuf {
        self.dir.path().join("mygo").join(name)
    }

    pub fn click(&self) {
        self.events.send(EventType::ButtonPress(Button::Left)).unwrap();
    }

    /// Press and release a chord, modifiers first
    pub fn chord(&self, keys: &[Key]) {
        for key in keys {
            self.events.send(EventType::KeyPress(*key)).unwrap();
        }
        for key in keys.iter().rev() {
            self.events.send(EventType::KeyRelease(*key)).unwrap();
        }
    }

    pub async fn wait_for_state(&self, state: SessionState) {
        let mut rx = self.handle.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {:?}", state))
            .unwrap();
    }
}

/// Poll until `cond` holds or the wait expires
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let start = tokio::time::Instant::now();
    while !cond() {
        assert!(start.elapsed() < WAIT, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
