use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, bounded};
use parking_lot::Mutex;
use tracing::warn;

use crate::error::{TaskError, panic_message};

use super::work_item::{WorkItem, WorkItemPool};

/// Backlog depth above which single-item pools trigger a diagnostic.
const BACKLOG_WARN_DEPTH: usize = 10;

/// Options for a [`WorkItemThread`].
#[derive(Clone, Debug)]
pub struct ThreadOptions {
    /// Identifier used in diagnostics.
    pub id: String,
    /// Abandon a single execution that exceeds this; zero means never.
    pub abort_timeout: Duration,
    /// Executions at least this long emit a slow-runnable warning.
    pub warn_after: Duration,
    /// Fixed sleep between cycles, nominally one frame.
    pub interval: Duration,
}

impl Default for ThreadOptions {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            abort_timeout: Duration::ZERO,
            warn_after: Duration::from_millis(500),
            interval: Duration::from_millis(16),
        }
    }
}

impl ThreadOptions {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_abort_timeout(mut self, timeout: Duration) -> Self {
        self.abort_timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Free-running execution loop over a [`WorkItemPool`].
///
/// `Idle -> Running -> Idle`; stopping is cooperative, the loop exits only
/// after completing its current cycle. Each cycle sleeps the fixed
/// interval, then executes whatever the pool hands back, with panic
/// containment and optional per-item abort timeouts.
pub struct WorkItemThread {
    options: ThreadOptions,
    pool: Arc<dyn WorkItemPool>,
    shutdown: AtomicBool,
    running: Mutex<bool>,
    last_start: Mutex<Option<Instant>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WorkItemThread {
    pub fn new(pool: Arc<dyn WorkItemPool>, options: ThreadOptions) -> Arc<Self> {
        Arc::new(Self {
            options,
            pool,
            shutdown: AtomicBool::new(false),
            running: Mutex::new(false),
            last_start: Mutex::new(None),
            handle: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &str {
        &self.options.id
    }

    /// Start time of the most recent work-item execution.
    pub fn last_start(&self) -> Option<Instant> {
        *self.last_start.lock()
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    /// Spawns the loop thread. Idempotent while already running.
    pub fn start(self: &Arc<Self>) {
        let mut running = self.running.lock();
        if *running {
            return;
        }
        *running = true;
        self.shutdown.store(false, Ordering::Release);

        let cloned = Arc::clone(self);
        let handle = thread::Builder::new()
            .name(format!("tickline-work-{}", self.options.id))
            .spawn(move || cloned.run())
            .expect("failed to spawn work item thread");
        self.handle.lock().replace(handle);
    }

    /// Requests cooperative shutdown; the current cycle finishes first.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Waits for the loop thread to exit after [`stop`](Self::stop).
    pub fn join(&self) {
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }

    fn run(self: Arc<Self>) {
        while !self.shutdown.load(Ordering::Acquire) {
            thread::sleep(self.options.interval);

            let mut items = self.pool.next_items();
            loop {
                if items.is_empty() {
                    break;
                }
                if self.pool.batch_mode() {
                    for item in &items {
                        if self.shutdown.load(Ordering::Acquire) {
                            break;
                        }
                        self.run_item(item);
                    }
                    break;
                }

                let depth = self.pool.queue_len();
                if depth > BACKLOG_WARN_DEPTH {
                    warn!(
                        id = %self.options.id,
                        depth,
                        "work item backlog exceeds threshold"
                    );
                }
                if self.shutdown.load(Ordering::Acquire) {
                    break;
                }
                self.run_item(&items[0]);
                items = self.pool.next_items();
            }
        }

        *self.running.lock() = false;
    }

    fn run_item(&self, item: &Arc<dyn WorkItem>) {
        let start = Instant::now();
        self.last_start.lock().replace(start);

        if self.options.abort_timeout.is_zero() {
            run_contained(item);
        } else if let Err(err) = run_with_timeout(Arc::clone(item), self.options.abort_timeout) {
            warn!(
                id = %self.options.id,
                timeout_ms = self.options.abort_timeout.as_millis() as u64,
                error = %err,
                "work item abandoned"
            );
        }

        let elapsed = start.elapsed();
        if elapsed >= self.options.warn_after {
            warn!(
                id = %self.options.id,
                item = item.description(),
                elapsed_ms = elapsed.as_millis() as u64,
                "slow work item"
            );
        }
    }
}

fn run_contained(item: &Arc<dyn WorkItem>) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| item.run())) {
        warn!(
            item = item.description(),
            message = %panic_message(payload.as_ref()),
            "work item panicked"
        );
    }
}

/// Executes `item` on a helper thread, waiting at most `timeout`. On
/// expiry the execution is abandoned: the helper thread is left to finish
/// (or never finish) on its own, it is never retried.
fn run_with_timeout(item: Arc<dyn WorkItem>, timeout: Duration) -> Result<(), TaskError> {
    let description = item.description().to_string();
    let (tx, rx) = bounded::<()>(1);
    thread::Builder::new()
        .name("tickline-work-abortable".into())
        .spawn(move || {
            run_contained(&item);
            let _ = tx.send(());
        })
        .expect("failed to spawn abortable work item thread");

    match rx.recv_timeout(timeout) {
        Ok(()) => Ok(()),
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
            Err(TaskError::AbortTimeout(description))
        }
    }
}
