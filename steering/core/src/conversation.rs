//! Conversation Manager
//!
//! Lets callers queue prompts for a session while earlier prompts are still
//! being processed. One background task drains the queue in priority order and
//! sends each prompt to the session, waiting for every send to finish before
//! starting the next.
//!
//! # Lifecycle
//!
//! ```text
//!          start() / first queue_message()
//!   Idle ───────────────────────────────────▶ Running
//!    ▲                                           │
//!    │   task finished or cancelled              │ stop()
//!    └──────────────────────────── Stopping ◀────┘
//! ```
//!
//! Each `Running` period owns a fresh [`MessageQueue`] and consumption task.
//! Request IDs keep counting across periods.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SteeringConfig;
use crate::error::{Result, SteeringError};
use crate::messages::{Attachment, Metadata, QueuedMessage, RequestId};
use crate::priority::Priority;
use crate::queue::MessageQueue;
use crate::session::ConversationSession;
use crate::streaming::StreamingInput;

// ============================================================================
// Queue Options
// ============================================================================

/// Per-message options for [`ConversationManager::queue_message`]
///
/// A bare [`Priority`] converts into options with everything else defaulted.
#[derive(Clone, Debug, Default)]
pub struct QueueOptions {
    /// Service priority
    pub priority: Priority,
    /// Request ID to use instead of a generated `req-<n>`
    pub request_id: Option<RequestId>,
    /// Attachments forwarded with the prompt
    pub attachments: Vec<Attachment>,
    /// Extra metadata for the outgoing record
    pub metadata: Metadata,
}

impl QueueOptions {
    /// Options with normal priority
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set priority
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set a caller-chosen request ID
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<RequestId>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Set attachments
    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Set metadata
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Add one metadata entry
    #[must_use]
    pub fn with_metadata_entry(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl From<Priority> for QueueOptions {
    fn from(priority: Priority) -> Self {
        Self::new().with_priority(priority)
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Observable state of a [`ConversationManager`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManagerState {
    /// No queue and no consumption task
    Idle,
    /// Accepting messages and sending them
    Running,
    /// Draining the queue; new messages are refused
    Stopping,
}

impl ManagerState {
    /// Whether `start` would create a new pipeline
    #[must_use]
    pub fn can_start(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether `stop` has anything to do
    #[must_use]
    pub fn can_stop(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether new messages are accepted (starting the manager if needed)
    #[must_use]
    pub fn accepts_messages(self) -> bool {
        !matches!(self, Self::Stopping)
    }
}

/// Queue and consumer of one running period
struct Pipeline {
    queue: Arc<MessageQueue>,
    consumer: JoinHandle<()>,
}

enum Lifecycle {
    Idle,
    Running(Pipeline),
    /// The queue stays reachable so it can still be observed and cleared
    Stopping(Arc<MessageQueue>),
}

impl Lifecycle {
    fn state(&self) -> ManagerState {
        match self {
            Self::Idle => ManagerState::Idle,
            Self::Running(_) => ManagerState::Running,
            Self::Stopping(_) => ManagerState::Stopping,
        }
    }

    fn queue(&self) -> Option<&Arc<MessageQueue>> {
        match self {
            Self::Idle => None,
            Self::Running(pipeline) => Some(&pipeline.queue),
            Self::Stopping(queue) => Some(queue),
        }
    }

    /// Running -> Stopping, handing the pipeline to the caller
    fn begin_stop(&mut self) -> Option<Pipeline> {
        let queue = match self {
            Self::Running(pipeline) => Arc::clone(&pipeline.queue),
            Self::Idle | Self::Stopping(_) => return None,
        };
        match std::mem::replace(self, Self::Stopping(queue)) {
            Self::Running(pipeline) => Some(pipeline),
            Self::Idle | Self::Stopping(_) => None,
        }
    }
}

/// Holds the consumer while `stop` waits for it
///
/// The lifecycle only returns to `Idle` once the consumer has exited. If the
/// `stop` future is dropped first, a watcher task takes over the handle so no
/// second consumer can start while the old one still runs.
struct StopGuard {
    lifecycle: Arc<Mutex<Lifecycle>>,
    consumer: Option<JoinHandle<()>>,
    /// When the consumer gets cancelled, if the stop had a timeout
    deadline: Option<Instant>,
}

impl StopGuard {
    fn finish(mut self) {
        self.consumer = None;
    }
}

impl Drop for StopGuard {
    fn drop(&mut self) {
        let Some(mut consumer) = self.consumer.take() else {
            *self.lifecycle.lock() = Lifecycle::Idle;
            return;
        };
        if consumer.is_finished() {
            *self.lifecycle.lock() = Lifecycle::Idle;
            return;
        }

        match Handle::try_current() {
            Ok(runtime) => {
                debug!("Stop abandoned, waiting for consumption task in the background");
                let lifecycle = Arc::clone(&self.lifecycle);
                let deadline = self.deadline;
                runtime.spawn(async move {
                    if let Some(deadline) = deadline {
                        if tokio::time::timeout_at(deadline, &mut consumer).await.is_err() {
                            consumer.abort();
                        }
                    }
                    let _ = consumer.await;
                    *lifecycle.lock() = Lifecycle::Idle;
                    debug!("Consumption task finished after abandoned stop");
                });
            }
            Err(_) => {
                // Nothing left to poll the watcher; cancel outright
                consumer.abort();
                *self.lifecycle.lock() = Lifecycle::Idle;
            }
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicU64,
    rejected: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    cleared: AtomicU64,
}

/// Message counts over the lifetime of a manager
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ManagerStats {
    /// Messages admitted to a queue
    pub queued: u64,
    /// Messages refused with `QueueFull`
    pub rejected: u64,
    /// Prompts the session accepted
    pub sent: u64,
    /// Prompts whose send failed
    pub failed: u64,
    /// Messages discarded by `clear_queue`
    pub cleared: u64,
}

// ============================================================================
// Conversation Manager
// ============================================================================

struct ManagerInner {
    session: Arc<dyn ConversationSession>,
    config: SteeringConfig,
    lifecycle: Arc<Mutex<Lifecycle>>,
    request_counter: AtomicU64,
    counters: Arc<Counters>,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        // Let the task drain on its own; it holds everything it needs
        if let Some(pipeline) = self.lifecycle.lock().begin_stop() {
            warn!(
                session_id = %self.session.session_id(),
                pending = pipeline.queue.len(),
                "Conversation manager dropped while running, draining in background"
            );
            pipeline.queue.signal_shutdown();
        }
    }
}

/// Orchestrates message flow from callers to a [`ConversationSession`]
///
/// Cloning is cheap; clones share the same queue and task.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use steering_core::{ConversationManager, Priority};
///
/// let manager = ConversationManager::new(Arc::new(session));
///
/// // Returns immediately even while the session is busy
/// manager.queue_message("What is Rust?", Priority::Normal)?;
/// manager.queue_message("URGENT: fix the build", Priority::Urgent)?;
///
/// // Serve everything still queued, then stop
/// manager.stop(None).await;
/// ```
#[derive(Clone)]
pub struct ConversationManager {
    inner: Arc<ManagerInner>,
}

impl ConversationManager {
    /// Create a manager with the default configuration
    #[must_use]
    pub fn new(session: Arc<dyn ConversationSession>) -> Self {
        Self::with_config(session, SteeringConfig::default())
    }

    /// Create a manager with the given configuration
    #[must_use]
    pub fn with_config(session: Arc<dyn ConversationSession>, config: SteeringConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                session,
                config,
                lifecycle: Arc::new(Mutex::new(Lifecycle::Idle)),
                request_counter: AtomicU64::new(0),
                counters: Arc::new(Counters::default()),
            }),
        }
    }

    /// The session messages are sent to
    #[must_use]
    pub fn session(&self) -> &Arc<dyn ConversationSession> {
        &self.inner.session
    }

    /// The configuration this manager was built with
    #[must_use]
    pub fn config(&self) -> &SteeringConfig {
        &self.inner.config
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ManagerState {
        self.inner.lifecycle.lock().state()
    }

    /// Whether a queue and consumption task exist
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state() != ManagerState::Idle
    }

    /// Number of items currently queued (0 when idle)
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.inner.lifecycle.lock().queue().map_or(0, |q| q.len())
    }

    /// Message counts so far
    #[must_use]
    pub fn stats(&self) -> ManagerStats {
        let c = &self.inner.counters;
        ManagerStats {
            queued: c.queued.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            sent: c.sent.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            cleared: c.cleared.load(Ordering::Relaxed),
        }
    }

    /// Create the queue and consumption task
    ///
    /// Does nothing if already running. `queue_message` calls this on demand.
    ///
    /// # Errors
    ///
    /// [`SteeringError::ShuttingDown`] while a stop is in progress, and
    /// [`SteeringError::NoRuntime`] outside a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.inner.lifecycle.lock();
        self.ensure_running(&mut lifecycle).map(|_| ())
    }

    fn ensure_running(&self, lifecycle: &mut Lifecycle) -> Result<Arc<MessageQueue>> {
        match lifecycle {
            Lifecycle::Running(pipeline) => return Ok(Arc::clone(&pipeline.queue)),
            Lifecycle::Stopping(_) => return Err(SteeringError::ShuttingDown),
            Lifecycle::Idle => {}
        }

        let runtime = Handle::try_current().map_err(|_| SteeringError::NoRuntime)?;
        let queue = Arc::new(MessageQueue::new(self.inner.config.max_queue_depth));
        let input = StreamingInput::new(Arc::clone(&queue));
        let consumer = runtime.spawn(consume(
            input,
            Arc::clone(&self.inner.session),
            Arc::clone(&self.inner.counters),
        ));

        info!(
            session_id = %self.inner.session.session_id(),
            max_depth = queue.max_depth(),
            "Conversation manager started"
        );

        *lifecycle = Lifecycle::Running(Pipeline {
            queue: Arc::clone(&queue),
            consumer,
        });
        Ok(queue)
    }

    /// Queue a prompt for the session
    ///
    /// Never waits for the session: the message is either admitted or
    /// refused right away. Starts the manager if it is idle.
    ///
    /// Capacity is not the only refusal: a message queued while a stop is
    /// draining gets [`SteeringError::ShuttingDown`] rather than being
    /// accepted into a queue that will never be served again.
    ///
    /// # Errors
    ///
    /// [`SteeringError::QueueFull`] when the queue is at capacity, plus the
    /// errors of [`start`](Self::start).
    pub fn queue_message(
        &self,
        content: impl Into<String>,
        options: impl Into<QueueOptions>,
    ) -> Result<RequestId> {
        let options = options.into();
        let mut lifecycle = self.inner.lifecycle.lock();
        let queue = self.ensure_running(&mut lifecycle)?;

        let request_id = options
            .request_id
            .unwrap_or_else(|| self.next_request_id());
        let message = QueuedMessage::new(
            request_id.clone(),
            content,
            options.priority,
            self.inner.session.session_id().clone(),
        )
        .with_attachments(options.attachments)
        .with_metadata(options.metadata);

        // Admitted under the lifecycle lock so a concurrent stop() always
        // places its terminal marker after this message
        match queue.put(message) {
            Ok(sequence) => {
                self.inner.counters.queued.fetch_add(1, Ordering::Relaxed);
                debug!(
                    request_id = %request_id,
                    priority = %options.priority,
                    sequence,
                    depth = queue.len(),
                    "Message queued"
                );
                Ok(request_id)
            }
            Err(e) => {
                self.inner.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    fn next_request_id(&self) -> RequestId {
        let n = self.inner.request_counter.fetch_add(1, Ordering::SeqCst) + 1;
        RequestId::numbered(n)
    }

    /// Serve everything queued, then stop
    ///
    /// Waits for the consumption task to reach the terminal marker. With a
    /// `timeout`, the task is cancelled once it elapses; the cancellation is
    /// not reported. Returns the manager to idle either way. Does nothing
    /// unless running.
    ///
    /// If this future is dropped before it completes, the manager stays
    /// `Stopping` until the consumption task has exited. The `timeout` still
    /// applies to it.
    pub async fn stop(&self, timeout: Option<Duration>) {
        let Some(Pipeline { queue, consumer }) = self.inner.lifecycle.lock().begin_stop() else {
            debug!("Stop requested while not running");
            return;
        };
        let mut guard = StopGuard {
            lifecycle: Arc::clone(&self.inner.lifecycle),
            consumer: Some(consumer),
            deadline: timeout.and_then(|limit| Instant::now().checked_add(limit)),
        };
        let Some(consumer) = guard.consumer.as_mut() else {
            return;
        };

        debug!(pending = queue.len(), "Signaling shutdown");
        queue.signal_shutdown();

        let joined = match timeout {
            None => consumer.await,
            Some(limit) => match tokio::time::timeout(limit, &mut *consumer).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        pending = queue.len(),
                        "Drain timed out, cancelling consumption task"
                    );
                    consumer.abort();
                    consumer.await
                }
            },
        };

        match joined {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => debug!("Consumption task cancelled"),
            Err(e) => error!(error = %e, "Consumption task failed"),
        }
        guard.finish();

        info!(
            session_id = %self.inner.session.session_id(),
            remaining = queue.len(),
            "Conversation manager stopped"
        );
    }

    /// Stop using the configured drain timeout
    pub async fn shutdown(&self) {
        self.stop(self.inner.config.stop_timeout).await;
    }

    /// Discard messages that have not been picked up yet
    ///
    /// Returns how many were discarded; 0 when idle. A pending terminal
    /// marker is kept and never counted.
    pub fn clear_queue(&self) -> usize {
        let lifecycle = self.inner.lifecycle.lock();
        let Some(queue) = lifecycle.queue() else {
            return 0;
        };

        let cleared = queue.clear();
        if cleared > 0 {
            self.inner
                .counters
                .cleared
                .fetch_add(cleared as u64, Ordering::Relaxed);
            info!(cleared, "Cleared queued messages");
        }
        cleared
    }

    /// Run `f` with this manager, then stop it
    ///
    /// `stop(None)` runs however `f` finishes: with a value, an error value,
    /// or a panic, which is resumed once the manager has stopped. A panic
    /// while `f` builds its future counts too.
    pub async fn scoped<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce(ConversationManager) -> Fut,
        Fut: Future<Output = T>,
    {
        let manager = self.clone();
        let outcome = AssertUnwindSafe(async move { f(manager).await })
            .catch_unwind()
            .await;
        self.stop(None).await;
        match outcome {
            Ok(value) => value,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl std::fmt::Debug for ConversationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationManager")
            .field("session_id", self.inner.session.session_id())
            .field("state", &self.state())
            .field("queue_size", &self.queue_size())
            .finish_non_exhaustive()
    }
}

/// Consumption task: one record at a time, in service order
async fn consume(
    mut input: StreamingInput,
    session: Arc<dyn ConversationSession>,
    counters: Arc<Counters>,
) {
    while let Some(record) = input.next_record().await {
        let request_id = record.request_id().unwrap_or("unknown").to_string();
        let send = AssertUnwindSafe(session.send(record.to_send_request())).catch_unwind();

        match send.await {
            Ok(Ok(message_id)) => {
                counters.sent.fetch_add(1, Ordering::Relaxed);
                debug!(request_id = %request_id, message_id = %message_id, "Message sent");
            }
            Ok(Err(e)) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(request_id = %request_id, error = %e, "Error processing message");
            }
            Err(_) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(request_id = %request_id, "Session panicked while sending message");
            }
        }
    }

    debug!(records = input.records_yielded(), "Consumption task finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::SessionId;
    use crate::session::SendRequest;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Records prompts; optionally blocks every send until released
    struct MockSession {
        id: SessionId,
        sent: parking_lot::Mutex<Vec<SendRequest>>,
        gate: Option<Arc<Notify>>,
        started: Notify,
    }

    impl MockSession {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                id: "test-session".into(),
                sent: parking_lot::Mutex::new(Vec::new()),
                gate: None,
                started: Notify::new(),
            })
        }

        fn gated(gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                id: "test-session".into(),
                sent: parking_lot::Mutex::new(Vec::new()),
                gate: Some(gate),
                started: Notify::new(),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.sent.lock().iter().map(|r| r.prompt.clone()).collect()
        }
    }

    #[async_trait]
    impl ConversationSession for MockSession {
        fn session_id(&self) -> &SessionId {
            &self.id
        }

        async fn send(&self, request: SendRequest) -> anyhow::Result<String> {
            self.sent.lock().push(request);
            self.started.notify_one();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok("msg-id".to_string())
        }
    }

    #[test]
    fn test_state_guards() {
        assert!(ManagerState::Idle.can_start());
        assert!(!ManagerState::Running.can_start());
        assert!(!ManagerState::Stopping.can_start());

        assert!(ManagerState::Running.can_stop());
        assert!(!ManagerState::Idle.can_stop());
        assert!(!ManagerState::Stopping.can_stop());

        assert!(ManagerState::Idle.accepts_messages());
        assert!(ManagerState::Running.accepts_messages());
        assert!(!ManagerState::Stopping.accepts_messages());
    }

    #[test]
    fn test_start_outside_runtime() {
        let manager = ConversationManager::new(MockSession::new());
        assert_eq!(manager.start(), Err(SteeringError::NoRuntime));
        assert_eq!(
            manager.queue_message("hi", Priority::Normal),
            Err(SteeringError::NoRuntime)
        );
        assert_eq!(manager.state(), ManagerState::Idle);
    }

    #[tokio::test]
    async fn test_explicit_start_and_stop() {
        let manager = ConversationManager::new(MockSession::new());
        assert_eq!(manager.state(), ManagerState::Idle);

        manager.start().unwrap();
        assert_eq!(manager.state(), ManagerState::Running);
        manager.start().unwrap();
        assert_eq!(manager.state(), ManagerState::Running);

        manager.stop(None).await;
        assert_eq!(manager.state(), ManagerState::Idle);
    }

    #[tokio::test]
    async fn test_queue_message_auto_starts() {
        let session = MockSession::new();
        let manager = ConversationManager::new(session.clone());

        let id = manager.queue_message("Hello", Priority::Normal).unwrap();
        assert_eq!(id.as_str(), "req-1");
        assert!(manager.is_started());

        manager.stop(None).await;
        assert!(!manager.is_started());
        assert_eq!(session.prompts(), vec!["Hello"]);
    }

    #[tokio::test]
    async fn test_custom_request_id() {
        let manager = ConversationManager::new(MockSession::new());
        let id = manager
            .queue_message("Hello", QueueOptions::new().with_request_id("custom-id"))
            .unwrap();
        assert_eq!(id.as_str(), "custom-id");

        // Custom IDs do not advance the counter
        let next = manager.queue_message("Again", Priority::Low).unwrap();
        assert_eq!(next.as_str(), "req-1");
        manager.stop(None).await;
    }

    #[tokio::test]
    async fn test_stop_while_stopping_is_noop() {
        let gate = Arc::new(Notify::new());
        let session = MockSession::gated(Arc::clone(&gate));
        let manager = ConversationManager::new(session.clone());

        manager.queue_message("busy", Priority::Normal).unwrap();
        session.started.notified().await;

        let stopper = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.stop(None).await })
        };
        while manager.state() != ManagerState::Stopping {
            tokio::task::yield_now().await;
        }

        manager.stop(None).await;
        assert_eq!(manager.state(), ManagerState::Stopping);
        assert_eq!(
            manager.queue_message("late", Priority::Urgent),
            Err(SteeringError::ShuttingDown)
        );
        assert_eq!(manager.start(), Err(SteeringError::ShuttingDown));

        gate.notify_one();
        stopper.await.unwrap();
        assert_eq!(manager.state(), ManagerState::Idle);
        assert_eq!(session.prompts(), vec!["busy"]);
    }

    #[tokio::test]
    async fn test_stats_track_outcomes() {
        let manager = ConversationManager::with_config(
            MockSession::new(),
            SteeringConfig::default().with_max_queue_depth(1),
        );

        // The consumer cannot run before the next await, so the queue stays full
        manager.queue_message("a", Priority::Normal).unwrap();
        let err = manager.queue_message("b", Priority::Normal).unwrap_err();
        assert!(err.is_queue_full());

        manager.stop(None).await;
        assert_eq!(
            manager.stats(),
            ManagerStats {
                queued: 1,
                rejected: 1,
                sent: 1,
                failed: 0,
                cleared: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_drop_while_running_drains() {
        let session = MockSession::new();
        {
            let manager = ConversationManager::new(session.clone());
            manager.queue_message("one", Priority::Normal).unwrap();
            manager.queue_message("two", Priority::Normal).unwrap();
        }

        tokio::time::timeout(Duration::from_secs(1), async {
            while session.prompts().len() < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("dropped manager should still drain");
        assert_eq!(session.prompts(), vec!["one", "two"]);
    }
}
