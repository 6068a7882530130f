use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::BoxError;
use crate::scheduler::item::{ItemValue, TaskItem};
use crate::wheel::{IntervalPlan, WheelTimer};

/// Outcome of stopping a scheduled entry.
///
/// The stop-vs-fire race is explicit: `Cancelled` means the pending fire
/// was preempted, `AlreadyFired` means cancellation lost the race (an
/// in-flight invocation may still complete), `NotFound` means the key had
/// no live entry and the call was a pure no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Cancelled,
    AlreadyFired,
    NotFound,
}

impl StopOutcome {
    /// True when a live entry was found, whatever the race outcome.
    pub fn found(self) -> bool {
        !matches!(self, StopOutcome::NotFound)
    }

    /// True only when cancellation preempted the pending fire.
    pub fn did_cancel(self) -> bool {
        matches!(self, StopOutcome::Cancelled)
    }
}

/// Fixed-period [`IntervalPlan`] with an atomic stop gate.
///
/// `next` returns `prev + interval` until [`stop`](Self::stop) is called,
/// after which it permanently declines. The one-by-one chain checks the
/// same gate before re-arming.
pub struct FixedIntervalPlan {
    interval: Duration,
    stopped: AtomicBool,
}

impl FixedIntervalPlan {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl IntervalPlan for FixedIntervalPlan {
    fn next(&self, prev: Instant) -> Option<Instant> {
        if self.is_stopped() {
            return None;
        }
        Some(prev + self.interval)
    }
}

pub(crate) type Registry = Arc<DashMap<String, Arc<ScheduleObserver>>>;

/// Completion callback; always invoked after the user callback, whether or
/// not it errored.
pub type CompleteCallback = Arc<dyn Fn(&ScheduleObserver) + Send + Sync>;

/// One observer per armed scheduling call: exposes status, the last
/// callback error, and stop.
///
/// An observer is reachable from the scheduler's registry exactly while it
/// can still fire; removal happens together with the timer being stopped
/// or the one-shot firing completing.
pub struct ScheduleObserver {
    item: Arc<TaskItem>,
    registry: Registry,
    timer: Mutex<Option<WheelTimer>>,
    plan: Option<Arc<FixedIntervalPlan>>,
    complete_callbacks: Mutex<Vec<CompleteCallback>>,
    last_error: Mutex<Option<Arc<BoxError>>>,
}

impl ScheduleObserver {
    pub(crate) fn new(
        item: Arc<TaskItem>,
        registry: Registry,
        plan: Option<Arc<FixedIntervalPlan>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            item,
            registry,
            timer: Mutex::new(None),
            plan,
            complete_callbacks: Mutex::new(Vec::new()),
            last_error: Mutex::new(None),
        })
    }

    pub fn key(&self) -> &str {
        self.item.key()
    }

    pub fn item(&self) -> &Arc<TaskItem> {
        &self.item
    }

    /// The item's payload, if any.
    pub fn value(&self) -> Option<ItemValue> {
        self.item.value().cloned()
    }

    /// The most recent error recorded from the user callback, either a
    /// returned error or a rendered panic.
    pub fn error(&self) -> Option<Arc<BoxError>> {
        self.last_error.lock().clone()
    }

    /// Whether the recurring plan has been stopped. One-shot observers have
    /// no plan and always read as stopped, mirroring the fact that no
    /// re-arm can happen for them.
    pub fn is_stopped(&self) -> bool {
        self.plan.as_ref().is_none_or(|p| p.is_stopped())
    }

    /// Stops this entry: the plan is gated off so no further re-arm
    /// occurs, and the pending one-shot timer (if any) is cancelled.
    ///
    /// The registry entry is removed when cancellation preempted the fire
    /// or when there was no live timer; a lost race leaves removal to the
    /// fire path.
    pub fn stop(&self) -> StopOutcome {
        if let Some(plan) = &self.plan {
            plan.stop();
        }

        let timer = self.timer.lock().clone();
        match timer {
            None => {
                self.registry.remove(self.item.key());
                StopOutcome::Cancelled
            }
            Some(timer) => {
                if timer.stop() {
                    self.registry.remove(self.item.key());
                    StopOutcome::Cancelled
                } else {
                    StopOutcome::AlreadyFired
                }
            }
        }
    }

    pub fn add_complete_callback(&self, callback: CompleteCallback) {
        self.complete_callbacks.lock().push(callback);
    }

    pub(crate) fn set_timer(&self, timer: WheelTimer) {
        self.timer.lock().replace(timer);
    }

    pub(crate) fn record_error(&self, err: BoxError) {
        self.last_error.lock().replace(Arc::new(err));
    }

    pub(crate) fn remove_from_registry(&self) {
        self.registry.remove(self.item.key());
    }

    /// Runs every completion callback in registration order. Callbacks are
    /// snapshotted first so one of them may add further callbacks without
    /// deadlocking.
    pub(crate) fn notify_completed(self: &Arc<Self>) {
        let callbacks = self.complete_callbacks.lock().clone();
        for callback in callbacks {
            crate::scheduler::run_isolated(|| callback(self));
        }
    }
}
