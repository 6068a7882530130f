//! Timing-wheel-backed task scheduler.
//!
//! Turns delays and intervals into callback invocations with
//! at-most-one-in-flight registry semantics per scheduled key. Three
//! scheduling modes:
//!
//! - [`TaskScheduler::after_func`] — one-shot, fires exactly once.
//! - [`TaskScheduler::scheduler_func`] — recurring on the wheel's own
//!   plan; a callback slower than the interval overlaps its successor.
//! - [`TaskScheduler::scheduler_func_one_by_one`] — recurring as a chain
//!   of one-shots re-armed from the completion callback, so firings never
//!   overlap and the effective period is `interval + callback duration`.

mod item;
mod observer;

pub use item::{ItemValue, TaskItem};
pub use observer::{CompleteCallback, FixedIntervalPlan, ScheduleObserver, StopOutcome};

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::error;

use crate::error::{BoxError, TaskError, panic_message};
use crate::wheel::{IntervalPlan, TimingWheel, WheelConfig};

use observer::Registry;

/// User callback for a scheduled task. A returned error is recorded on the
/// observer and retrievable via [`ScheduleObserver::error`].
pub type TaskCallback = Arc<dyn Fn(&TaskItem) -> Result<(), BoxError> + Send + Sync>;

/// Runs `f` with panic containment; a panic is logged and swallowed so it
/// never unwinds into the wheel's firing thread.
pub(crate) fn run_isolated(f: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        error!(
            message = %panic_message(payload.as_ref()),
            "contained panic in scheduler callback"
        );
    }
}

pub struct TaskScheduler {
    wheel: Arc<TimingWheel>,
    registry: Registry,
}

impl TaskScheduler {
    pub fn new() -> Arc<Self> {
        Self::with_config(WheelConfig::default())
    }

    pub fn with_config(config: WheelConfig) -> Arc<Self> {
        Arc::new(Self {
            wheel: TimingWheel::start(config),
            registry: Arc::new(DashMap::new()),
        })
    }

    /// Schedules `callback` to fire exactly once after `delay`. The
    /// registry entry lives until the firing completes or the observer is
    /// stopped first.
    pub fn after_func(
        &self,
        delay: Duration,
        mut item: TaskItem,
        callback: impl Fn(&TaskItem) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Arc<ScheduleObserver> {
        item.ensure_key();
        let item = Arc::new(item);
        let observer = ScheduleObserver::new(Arc::clone(&item), Arc::clone(&self.registry), None);
        arm_one_shot(&self.wheel, &self.registry, delay, item, Arc::new(callback), &observer);
        observer
    }

    /// Schedules `callback` to fire every `interval` on the wheel's own
    /// plan, independent of callback duration. Firings are not mutually
    /// exclusive.
    pub fn scheduler_func(
        &self,
        interval: Duration,
        mut item: TaskItem,
        callback: impl Fn(&TaskItem) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Arc<ScheduleObserver> {
        item.ensure_key();
        let item = Arc::new(item);
        let plan = Arc::new(FixedIntervalPlan::new(interval));
        let observer = ScheduleObserver::new(
            Arc::clone(&item),
            Arc::clone(&self.registry),
            Some(Arc::clone(&plan)),
        );

        let key = item.key().to_string();
        self.registry.insert(key.clone(), Arc::clone(&observer));

        let callback: TaskCallback = Arc::new(callback);
        let fire = {
            let item = Arc::clone(&item);
            let observer = Arc::clone(&observer);
            Arc::new(move || {
                run_task_callback(&callback, &item, &observer);
                observer.notify_completed();
            })
        };
        match self
            .wheel
            .schedule_with(plan as Arc<dyn IntervalPlan>, key.clone(), fire)
        {
            Some(timer) => observer.set_timer(timer),
            None => {
                self.registry.remove(&key);
            }
        }
        observer
    }

    /// Schedules `callback` every `interval` as a chain of one-shot arms:
    /// the next timer is armed only from the completion callback of the
    /// previous firing, after checking the stop gate.
    pub fn scheduler_func_one_by_one(
        &self,
        interval: Duration,
        mut item: TaskItem,
        callback: impl Fn(&TaskItem) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Arc<ScheduleObserver> {
        item.ensure_key();
        let item = Arc::new(item);
        let plan = Arc::new(FixedIntervalPlan::new(interval));
        let observer = ScheduleObserver::new(
            Arc::clone(&item),
            Arc::clone(&self.registry),
            Some(plan),
        );

        let callback: TaskCallback = Arc::new(callback);
        let rearm = {
            let wheel = Arc::clone(&self.wheel);
            let registry = Arc::clone(&self.registry);
            let item = Arc::clone(&item);
            let callback = Arc::clone(&callback);
            // The completion callback lives on the observer; holding a weak
            // reference back avoids an Arc cycle.
            let observer = Arc::downgrade(&observer);
            Arc::new(move |current: &ScheduleObserver| {
                if current.is_stopped() {
                    return;
                }
                if let Some(observer) = observer.upgrade() {
                    arm_one_shot(
                        &wheel,
                        &registry,
                        interval,
                        Arc::clone(&item),
                        Arc::clone(&callback),
                        &observer,
                    );
                }
            })
        };
        observer.add_complete_callback(rearm);

        arm_one_shot(&self.wheel, &self.registry, interval, item, callback, &observer);
        observer
    }

    /// Stops the entry registered under `key`. Unknown keys are a no-op
    /// reported as [`StopOutcome::NotFound`].
    pub fn stop_scheduler(&self, key: &str) -> StopOutcome {
        let observer = match self.registry.get(key) {
            Some(entry) => Arc::clone(entry.value()),
            None => return StopOutcome::NotFound,
        };
        observer.stop()
    }

    /// Number of live registry entries; used by diagnostics and tests.
    pub fn live_count(&self) -> usize {
        self.registry.len()
    }

    /// Stops the wheel driver. Pending timers are dropped without firing.
    pub fn shutdown(&self) {
        self.wheel.shutdown();
    }
}

/// Arms one one-shot wheel entry for `observer`, inserting the registry
/// entry before the timer so the key is resolvable the moment the timer is
/// live. The fire path removes the entry after the user callback and
/// before completion callbacks run, which is what lets a one-by-one chain
/// re-insert under the same key.
fn arm_one_shot(
    wheel: &Arc<TimingWheel>,
    registry: &Registry,
    delay: Duration,
    item: Arc<TaskItem>,
    callback: TaskCallback,
    observer: &Arc<ScheduleObserver>,
) {
    let key = item.key().to_string();
    registry.insert(key.clone(), Arc::clone(observer));

    let fire = {
        let observer = Arc::clone(observer);
        Arc::new(move || {
            run_task_callback(&callback, &item, &observer);
            observer.remove_from_registry();
            observer.notify_completed();
        })
    };
    let timer = wheel.after(delay, fire);
    timer.set_key(&key);
    observer.set_timer(timer);
}

fn run_task_callback(callback: &TaskCallback, item: &TaskItem, observer: &ScheduleObserver) {
    match panic::catch_unwind(AssertUnwindSafe(|| callback(item))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => observer.record_error(err),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(key = item.key(), message = %message, "task callback panicked");
            observer.record_error(Box::new(TaskError::Panicked(message)));
        }
    }
}
