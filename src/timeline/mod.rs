//! The frame dispatcher: notifies persistent and one-shot observers once
//! per tick with the elapsed milliseconds since the previous tick.
//!
//! Subscription mutates a lock-guarded canonical list and sets a dirty
//! flag; the notify pass reads an immutable snapshot rebuilt only when
//! dirty, so delivery itself never holds the subscription lock.

mod observer;

pub use observer::TimelineObserver;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::{Mutex, RwLock};
use tracing::{error, warn};

use crate::error::panic_message;
use crate::scene_timer::SceneTimer;
use crate::threading::WorkItem;

/// Default capacity of the one-shot observer queue.
pub const DEFAULT_ONE_SHOT_CAPACITY: usize = 10;

pub struct Timeline {
    description: String,
    /// Canonical persistent observer list; insertion order is preserved
    /// and is the notification order within a snapshot.
    registered: Mutex<Vec<TimelineObserver>>,
    /// Snapshot consumed by the notify pass, rebuilt from `registered`
    /// while holding its lock whenever `dirty` is set.
    working: RwLock<Arc<[TimelineObserver]>>,
    dirty: AtomicBool,
    one_shot_tx: Sender<TimelineObserver>,
    one_shot_rx: Receiver<TimelineObserver>,
    previous_tick: Mutex<Option<Instant>>,
    scene_timer: OnceLock<Weak<SceneTimer>>,
}

impl Timeline {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_ONE_SHOT_CAPACITY)
    }

    /// `capacity` bounds the one-shot queue; `subscribe_as_one_time`
    /// applies the queue's backpressure when full.
    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        let (one_shot_tx, one_shot_rx) = bounded(capacity);
        let working: Arc<[TimelineObserver]> = Arc::from(Vec::new());
        Arc::new(Self {
            description: "timeline".to_string(),
            registered: Mutex::new(Vec::new()),
            working: RwLock::new(working),
            dirty: AtomicBool::new(false),
            one_shot_tx,
            one_shot_rx,
            previous_tick: Mutex::new(None),
            scene_timer: OnceLock::new(),
        })
    }

    /// Wires the scene timer used for delayed one-time subscriptions.
    /// Single-construction lifecycle; later calls are ignored.
    pub fn set_scene_timer(&self, scene_timer: &Arc<SceneTimer>) {
        let _ = self.scene_timer.set(Arc::downgrade(scene_timer));
    }

    /// Appends a persistent observer. The returned clone shares identity
    /// with `observer` and can be passed to [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe(&self, observer: &TimelineObserver) -> TimelineObserver {
        let mut registered = self.registered.lock();
        registered.push(observer.clone());
        self.dirty.store(true, Ordering::Release);
        observer.clone()
    }

    /// Enqueues `observer` for exactly one notification.
    ///
    /// With no delay (or a zero one) the observer lands directly on the
    /// bounded one-shot queue and is drained on the next tick. A positive
    /// delay arms a scene-timer one-shot whose callback performs the
    /// enqueue; this is how delayed and scheduler-sourced callbacks rejoin
    /// the logic thread.
    pub fn subscribe_as_one_time(&self, observer: TimelineObserver, delay: Option<Duration>) {
        match delay {
            None => self.enqueue_one_shot(observer),
            Some(delay) if delay.is_zero() => self.enqueue_one_shot(observer),
            Some(delay) => {
                let Some(scene_timer) = self.scene_timer.get().and_then(Weak::upgrade) else {
                    warn!("no scene timer wired; delayed one-time subscription enqueued immediately");
                    self.enqueue_one_shot(observer);
                    return;
                };
                let tx = self.one_shot_tx.clone();
                scene_timer.start_one_timer(
                    delay,
                    move || {
                        if tx.send(observer.clone()).is_err() {
                            warn!("one-shot observer queue disconnected");
                        }
                    },
                    Default::default(),
                );
            }
        }
    }

    /// Removes the first observer sharing identity with `observer`.
    ///
    /// Removal is eventual: a tick already notifying the current snapshot
    /// may deliver one final notification before the rebuilt snapshot takes
    /// effect.
    pub fn unsubscribe(&self, observer: &TimelineObserver) {
        let mut registered = self.registered.lock();
        if let Some(index) = registered.iter().position(|o| o.same_observer(observer)) {
            registered.remove(index);
            self.dirty.store(true, Ordering::Release);
        }
    }

    /// One notify pass. Computes the elapsed milliseconds since the
    /// previous tick (0 on the very first), drains the one-shot queue
    /// completely, then notifies the persistent snapshot in registration
    /// order. Every notify call is panic-isolated.
    pub fn tick(&self) {
        let now = Instant::now();
        let delta_ms = {
            let mut previous = self.previous_tick.lock();
            let delta = previous
                .map(|prev| now.saturating_duration_since(prev).as_secs_f64() * 1e3)
                .unwrap_or(0.0);
            previous.replace(now);
            delta
        };

        if self.dirty.load(Ordering::Acquire) {
            let registered = self.registered.lock();
            *self.working.write() = Arc::from(registered.as_slice());
            self.dirty.store(false, Ordering::Release);
        }

        while let Ok(observer) = self.one_shot_rx.try_recv() {
            notify_isolated(&observer, delta_ms);
        }

        let working = self.working.read().clone();
        for observer in working.iter() {
            notify_isolated(observer, delta_ms);
        }
    }

    fn enqueue_one_shot(&self, observer: TimelineObserver) {
        // Bounded queue: blocks when full, which is the queue's documented
        // backpressure contract.
        if self.one_shot_tx.send(observer).is_err() {
            warn!("one-shot observer queue disconnected");
        }
    }

    /// Number of persistent observers currently registered.
    pub fn persistent_count(&self) -> usize {
        self.registered.lock().len()
    }
}

impl WorkItem for Timeline {
    fn description(&self) -> &str {
        &self.description
    }

    fn run(&self) {
        self.tick();
    }
}

fn notify_isolated(observer: &TimelineObserver, delta_ms: f64) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| observer.notify(delta_ms))) {
        error!(
            message = %panic_message(payload.as_ref()),
            "timeline observer panicked"
        );
    }
}
