//! Thin policy layer over the scheduler: fired callbacks are redirected
//! onto the timeline's one-shot queue by default, funneling timer-driven
//! logic onto the logic thread; a per-call option runs the callback inline
//! on the wheel's firing thread instead.

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use tracing::warn;

use crate::scheduler::{StopOutcome, TaskItem, TaskScheduler};
use crate::timeline::{Timeline, TimelineObserver};

/// Property marking an item's callback as inline (no timeline redirect).
const PROP_INLINE: &str = "inline";

/// Per-call options for scene-timer scheduling.
#[derive(Default, Clone, Debug)]
pub struct TimerOpts {
    key: Option<String>,
    inline: bool,
}

impl TimerOpts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies an explicit scheduling key for deterministic removal;
    /// otherwise one is generated.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Runs the callback inline on the wheel's firing context instead of
    /// redirecting it onto the timeline. Useful for work that touches no
    /// shared game state.
    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    fn apply(&self, item: &mut TaskItem) {
        if let Some(key) = &self.key {
            item.set_key(key.clone());
        }
        if self.inline {
            item.set_property(PROP_INLINE, Arc::new(true));
        }
    }
}

pub struct SceneTimer {
    scheduler: Arc<TaskScheduler>,
    /// Shared with fire-path closures so wiring is read at fire time.
    timeline: Arc<OnceLock<Weak<Timeline>>>,
}

impl SceneTimer {
    pub fn new(scheduler: Arc<TaskScheduler>) -> Arc<Self> {
        Arc::new(Self {
            scheduler,
            timeline: Arc::new(OnceLock::new()),
        })
    }

    /// Wires the timeline that redirected callbacks are enqueued onto.
    /// Single-construction lifecycle; later calls are ignored.
    pub fn set_timeline(&self, timeline: &Arc<Timeline>) {
        let _ = self.timeline.set(Arc::downgrade(timeline));
    }

    pub fn scheduler(&self) -> &Arc<TaskScheduler> {
        &self.scheduler
    }

    /// Arms a one-shot timer; returns its scheduling key.
    pub fn start_one_timer(
        &self,
        delay: Duration,
        action: impl Fn() + Send + Sync + 'static,
        opts: TimerOpts,
    ) -> String {
        let mut item = TaskItem::new();
        opts.apply(&mut item);
        let fire = self.dispatcher(Arc::new(action));
        let observer = self.scheduler.after_func(delay, item, move |item| {
            fire(item);
            Ok(())
        });
        observer.key().to_string()
    }

    /// Arms a one-shot timer whose action is bound to `data`.
    pub fn start_one_timer_with_data<T: Send + Sync + 'static>(
        &self,
        delay: Duration,
        action: impl Fn(&T) + Send + Sync + 'static,
        data: T,
        opts: TimerOpts,
    ) -> String {
        let data = Arc::new(data);
        self.start_one_timer(delay, move || action(&data), opts)
    }

    /// Arms a recurring timer in one-by-one mode (strictly non-overlapping
    /// firings); returns its scheduling key.
    pub fn start_recur_timer(
        &self,
        interval: Duration,
        action: impl Fn() + Send + Sync + 'static,
        opts: TimerOpts,
    ) -> String {
        let mut item = TaskItem::new();
        opts.apply(&mut item);
        let fire = self.dispatcher(Arc::new(action));
        let observer = self
            .scheduler
            .scheduler_func_one_by_one(interval, item, move |item| {
                fire(item);
                Ok(())
            });
        observer.key().to_string()
    }

    /// Stops the timer registered under `key`; unknown keys are a no-op.
    pub fn remove_timer(&self, key: &str) -> StopOutcome {
        self.scheduler.stop_scheduler(key)
    }

    /// Builds the fire-path closure: inline items run on the calling
    /// (wheel) context, everything else is enqueued onto the timeline as a
    /// one-shot observer.
    fn dispatcher(
        &self,
        action: Arc<dyn Fn() + Send + Sync>,
    ) -> impl Fn(&TaskItem) + Send + Sync + 'static {
        let timeline = Arc::clone(&self.timeline);
        move |item: &TaskItem| {
            if item.bool_property(PROP_INLINE) {
                action();
                return;
            }
            match timeline.get().and_then(Weak::upgrade) {
                Some(timeline) => {
                    let action = Arc::clone(&action);
                    timeline.subscribe_as_one_time(
                        TimelineObserver::from_action(move || action()),
                        None,
                    );
                }
                None => {
                    warn!("no timeline wired; scene timer callback running inline");
                    action();
                }
            }
        }
    }
}
