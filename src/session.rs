//! Session Controller
//!
//! A tokio actor that owns the one in-flight reply session. Listeners and the
//! worker task only ever talk to it through `ControlMessage`s; the actor is
//! the single place where admission, state transitions and the user-facing
//! side effects (notifications, menu enable/disable) happen.
//!
//! ```text
//! Idle → Capturing → Generating → Resolving → AwaitingDelivery → Delivering → Idle
//!                      (any non-Idle state) → Failed → Idle
//! ```

use crate::error::{ReplyError, ReplyResult};
use crate::listener::ListenerLifecycle;
use crate::method::{MethodCatalog, ReplyMethod};
use crate::notify::{Notifier, NotifyIcon, UiControl};
use crate::resolver::ResolvedArtifact;
use crate::worker::SessionWorker;
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

/// How long shutdown waits for an in-flight worker
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Capturing,
    Generating,
    Resolving,
    AwaitingDelivery,
    Delivering,
    Failed,
}

impl SessionState {
    pub fn is_idle(self) -> bool {
        self == SessionState::Idle
    }
}

/// One capture → generate → resolve → deliver cycle
#[derive(Debug, Clone)]
pub struct Session {
    pub id: u64,
    pub state: SessionState,
    pub method: ReplyMethod,
    pub started_at: DateTime<Local>,
}

/// Read-only busy flag shared with the listeners.
///
/// Only the controller writes it; everyone else uses it to skip work early.
/// Admission itself is always decided by the actor.
#[derive(Debug, Clone, Default)]
pub struct SessionGate(Arc<AtomicBool>);

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        !self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.0.store(active, Ordering::SeqCst);
    }
}

/// Everything the controller reacts to
#[derive(Debug)]
pub enum ControlMessage {
    /// A hotkey fired and the selection has been copied
    CaptureRequested { method: String },
    /// Worker moved on to another stage
    Progress { session_id: u64, state: SessionState },
    /// Worker finished; on success the deliverable is on the clipboard
    Staged {
        session_id: u64,
        result: ReplyResult<ResolvedArtifact>,
    },
    PointerFired { session_id: u64 },
    Delivered {
        session_id: u64,
        result: ReplyResult<()>,
    },
    Shutdown,
}

pub type ControlSender = mpsc::UnboundedSender<ControlMessage>;
pub type ControlReceiver = mpsc::UnboundedReceiver<ControlMessage>;

/// The controller's mailbox. Create it first so listeners can hold a sender.
pub fn control_channel() -> (ControlSender, ControlReceiver) {
    mpsc::unbounded_channel()
}

/// Cheap, cloneable access to a running controller
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    control: ControlSender,
    state: watch::Receiver<SessionState>,
}

impl ControllerHandle {
    /// Ask for a session without the copy interaction (the selection is
    /// expected to be on the clipboard already)
    pub fn trigger(&self, method: &str) -> ReplyResult<()> {
        self.send(ControlMessage::CaptureRequested {
            method: method.to_string(),
        })
    }

    pub fn shutdown(&self) -> ReplyResult<()> {
        self.send(ControlMessage::Shutdown)
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    fn send(&self, msg: ControlMessage) -> ReplyResult<()> {
        self.control
            .send(msg)
            .map_err(|_| ReplyError::Other(anyhow::anyhow!("session controller has stopped")))
    }
}

pub struct SessionController {
    catalog: MethodCatalog,
    worker: Arc<SessionWorker>,
    listeners: Arc<ListenerLifecycle>,
    notifier: Arc<dyn Notifier>,
    ui: Arc<dyn UiControl>,
    gate: SessionGate,
    control: ControlSender,
    inbox: ControlReceiver,
    state: watch::Sender<SessionState>,
    session: Option<Session>,
    task: Option<JoinHandle<()>>,
    worker_task: Option<AbortHandle>,
    next_id: u64,
    shutdown_grace: Duration,
}

impl SessionController {
    pub fn new(
        catalog: MethodCatalog,
        worker: Arc<SessionWorker>,
        listeners: Arc<ListenerLifecycle>,
        notifier: Arc<dyn Notifier>,
        ui: Arc<dyn UiControl>,
        gate: SessionGate,
        (control, inbox): (ControlSender, ControlReceiver),
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            catalog,
            worker,
            listeners,
            notifier,
            ui,
            gate,
            control,
            inbox,
            state,
            session: None,
            task: None,
            worker_task: None,
            next_id: 1,
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            control: self.control.clone(),
            state: self.state.subscribe(),
        }
    }

    /// Actor loop; returns after a `Shutdown` message has been handled
    pub async fn run(mut self) {
        info!("🚦 Session controller ready ({} reply methods)", self.catalog.len());
        while let Some(msg) = self.inbox.recv().await {
            match msg {
                ControlMessage::CaptureRequested { method } => self.admit(&method),
                ControlMessage::Progress { session_id, state } => {
                    if self.is_current(session_id) {
                        self.transition(state);
                    }
                }
                ControlMessage::Staged { session_id, result } => {
                    if !self.is_current(session_id) {
                        continue;
                    }
                    match result {
                        Ok(artifact) => self.await_delivery(&artifact),
                        Err(e) => self.fail(e),
                    }
                }
                ControlMessage::PointerFired { session_id } => {
                    if self.is_current(session_id) {
                        self.transition(SessionState::Delivering);
                    }
                }
                ControlMessage::Delivered { session_id, result } => {
                    if !self.is_current(session_id) {
                        continue;
                    }
                    match result {
                        Ok(()) => self.finish(),
                        Err(e) => self.fail(e),
                    }
                }
                ControlMessage::Shutdown => {
                    self.shutdown().await;
                    break;
                }
            }
        }
        debug!("Session controller stopped");
    }

    fn is_current(&self, session_id: u64) -> bool {
        match &self.session {
            Some(session) if session.id == session_id => true,
            _ => {
                debug!("Ignoring message for stale session {}", session_id);
                false
            }
        }
    }

    fn admit(&mut self, method_id: &str) {
        if let Some(current) = &self.session {
            warn!(
                "Rejected '{}': session {} is {:?}",
                method_id, current.id, current.state
            );
            self.notifier
                .notify(&ReplyError::ConcurrentSession.to_string(), Some(NotifyIcon::Busy));
            return;
        }

        let method = match self.catalog.get(method_id) {
            Ok(method) => method.clone(),
            Err(e) => {
                warn!("{}", e);
                self.notifier.notify(&e.to_string(), Some(NotifyIcon::Error));
                return;
            }
        };

        let id = self.next_id;
        self.next_id += 1;
        info!("▶️ Session {} started: {}", id, method.display_label);

        self.session = Some(Session {
            id,
            state: SessionState::Idle,
            method: method.clone(),
            started_at: Local::now(),
        });
        self.gate.set_active(true);
        self.ui.set_enabled(false);
        self.transition(SessionState::Capturing);
        self.notifier.notify(
            &format!("Generating {} reply...", method.display_label),
            Some(NotifyIcon::Busy),
        );

        let worker = self.worker.clone();
        let control = self.control.clone();
        let progress_tx = control.clone();
        // The worker runs in its own task so a panic still ends in `Staged`
        let run = tokio::spawn(async move {
            let progress = move |state| {
                let _ = progress_tx.send(ControlMessage::Progress {
                    session_id: id,
                    state,
                });
            };
            worker.run(&method, &progress).await
        });
        self.worker_task = Some(run.abort_handle());
        self.task = Some(tokio::spawn(async move {
            let result = run.await.unwrap_or_else(|e| {
                Err(ReplyError::Other(anyhow::anyhow!("reply worker crashed: {e}")))
            });
            let _ = control.send(ControlMessage::Staged {
                session_id: id,
                result,
            });
        }));
    }

    fn transition(&mut self, next: SessionState) {
        if let Some(session) = self.session.as_mut() {
            if session.state == next {
                return;
            }
            debug!("Session {}: {:?} → {:?}", session.id, session.state, next);
            session.state = next;
        }
        self.state.send_replace(next);
    }

    fn await_delivery(&mut self, artifact: &ResolvedArtifact) {
        let Some(id) = self.session.as_ref().map(|s| s.id) else {
            return;
        };
        let control = self.control.clone();
        self.listeners.arm_pointer(
            id,
            Box::new(move |result| {
                let _ = control.send(ControlMessage::Delivered {
                    session_id: id,
                    result,
                });
            }),
        );
        self.transition(SessionState::AwaitingDelivery);

        let what = match artifact {
            ResolvedArtifact::Text(_) => "Reply",
            ResolvedArtifact::Image(_) => "Image",
        };
        self.notifier.notify(
            &format!("{what} ready. Click where it should be pasted."),
            Some(NotifyIcon::Ready),
        );
    }

    fn finish(&mut self) {
        if let Some(session) = &self.session {
            let elapsed = Local::now() - session.started_at;
            info!(
                "✅ Session {} delivered in {}ms",
                session.id,
                elapsed.num_milliseconds()
            );
        }
        self.reset();
    }

    /// Any failure ends the session: disarm, tell the user, back to Idle
    fn fail(&mut self, err: ReplyError) {
        if let Some(session) = &self.session {
            warn!("❌ Session {} failed in {:?}: {}", session.id, session.state, err);
        }
        self.transition(SessionState::Failed);
        self.listeners.disarm_pointer();
        self.notifier.notify(&err.to_string(), Some(NotifyIcon::Error));
        self.reset();
    }

    fn reset(&mut self) {
        self.session = None;
        self.task = None;
        self.worker_task = None;
        self.gate.set_active(false);
        self.ui.set_enabled(true);
        self.state.send_replace(SessionState::Idle);
    }

    async fn shutdown(&mut self) {
        info!("Shutting down session controller");
        self.listeners.shutdown();

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_grace, &mut task).await {
                Ok(_) => debug!("In-flight worker finished"),
                Err(_) => {
                    warn!(
                        "Worker still busy after {:?}, abandoning it",
                        self.shutdown_grace
                    );
                    task.abort();
                    if let Some(worker) = self.worker_task.take() {
                        worker.abort();
                    }
                }
            }
        }

        if self.session.is_some() {
            self.reset();
        }
    }
}
