//! Hashed timing wheel driven by a dedicated driver thread.
//!
//! Each slot holds the timers whose deadline tick hashes onto it
//! (`deadline_tick & mask`); the driver advances once per tick resolution
//! and fires every entry in the current slot that is actually due, leaving
//! future-lap entries in place. Fired callbacks run on their own thread so
//! a slow callback never delays the wheel or its sibling timers.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::error;

use crate::error::panic_message;

/// Computes recurring fire times for a wheel entry.
///
/// Returning `None` permanently stops rescheduling.
pub trait IntervalPlan: Send + Sync {
    fn next(&self, prev: Instant) -> Option<Instant>;
}

/// Callback invoked when a wheel entry fires.
pub type WheelCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Copy, Debug)]
pub struct WheelConfig {
    /// Tick resolution of the wheel.
    pub tick: Duration,
    /// Number of slots; must be a power of two.
    pub slots: usize,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(1),
            slots: 512,
        }
    }
}

/// Lifecycle states for a wheel entry.
///
/// One-shot entries move `Pending -> Fired` exactly once; recurring entries
/// stay `Pending` across re-arms so cancellation works between fires.
const STATE_PENDING: u8 = 0;
const STATE_FIRED: u8 = 1;
const STATE_CANCELLED: u8 = 2;

struct TimerEntry {
    key: Mutex<String>,
    state: AtomicU8,
    callback: WheelCallback,
    plan: Option<Arc<dyn IntervalPlan>>,
}

/// Cancelable handle for a wheel entry.
///
/// Clones share the underlying entry, so any clone can stop it.
#[derive(Clone)]
pub struct WheelTimer {
    entry: Arc<TimerEntry>,
}

impl WheelTimer {
    /// Associates an opaque key with this timer.
    pub fn set_key(&self, key: impl Into<String>) {
        *self.entry.key.lock() = key.into();
    }

    pub fn key(&self) -> String {
        self.entry.key.lock().clone()
    }

    /// Attempts to cancel the pending fire.
    ///
    /// Returns `true` iff cancellation preempted the firing; `false` means
    /// the entry already fired (or is mid-fire, which is allowed to
    /// complete). For recurring entries a successful stop also suppresses
    /// every future re-arm.
    pub fn stop(&self) -> bool {
        self.entry
            .state
            .compare_exchange(
                STATE_PENDING,
                STATE_CANCELLED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

struct Armed {
    deadline_tick: u64,
    entry: Arc<TimerEntry>,
}

struct WheelState {
    slots: Vec<Vec<Armed>>,
    /// Last tick fully processed by the driver.
    current_tick: u64,
}

/// The wheel itself. Construct with [`TimingWheel::start`]; all arming
/// calls are non-blocking registrations, actual firing happens on the
/// driver's schedule.
pub struct TimingWheel {
    config: WheelConfig,
    epoch: Instant,
    mask: u64,
    state: Mutex<WheelState>,
    shutdown: AtomicBool,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl TimingWheel {
    /// Starts the wheel and its driver thread.
    pub fn start(config: WheelConfig) -> Arc<Self> {
        assert!(config.slots.is_power_of_two(), "slots must be a power of two");
        assert!(!config.tick.is_zero(), "tick resolution must be non-zero");

        let mut slots = Vec::with_capacity(config.slots);
        slots.resize_with(config.slots, Vec::new);

        let wheel = Arc::new(Self {
            config,
            epoch: Instant::now(),
            mask: (config.slots - 1) as u64,
            state: Mutex::new(WheelState {
                slots,
                current_tick: 0,
            }),
            shutdown: AtomicBool::new(false),
            driver: Mutex::new(None),
        });

        let cloned = Arc::clone(&wheel);
        let handle = thread::Builder::new()
            .name("tickline-wheel".into())
            .spawn(move || cloned.run())
            .expect("failed to spawn wheel driver thread");
        wheel.driver.lock().replace(handle);
        wheel
    }

    /// Arms a one-shot entry that fires `callback` exactly once, no earlier
    /// than `delay` from now.
    pub fn after(&self, delay: Duration, callback: WheelCallback) -> WheelTimer {
        let entry = Arc::new(TimerEntry {
            key: Mutex::new(String::new()),
            state: AtomicU8::new(STATE_PENDING),
            callback,
            plan: None,
        });
        self.insert(Instant::now() + delay, Arc::clone(&entry));
        WheelTimer { entry }
    }

    /// Arms a recurring entry whose fire times come from `plan`.
    ///
    /// Returns `None` if the plan declines the first fire time. The entry is
    /// re-armed before its callback runs, so a callback that outlasts the
    /// interval overlaps its successor.
    pub fn schedule_with(
        &self,
        plan: Arc<dyn IntervalPlan>,
        key: impl Into<String>,
        callback: WheelCallback,
    ) -> Option<WheelTimer> {
        let first = plan.next(Instant::now())?;
        let entry = Arc::new(TimerEntry {
            key: Mutex::new(key.into()),
            state: AtomicU8::new(STATE_PENDING),
            callback,
            plan: Some(plan),
        });
        self.insert(first, Arc::clone(&entry));
        Some(WheelTimer { entry })
    }

    /// Requests cooperative shutdown and joins the driver thread.
    /// Idempotent; pending timers are dropped without firing.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::Release) {
            return;
        }
        if let Some(handle) = self.driver.lock().take() {
            let _ = handle.join();
        }
    }

    fn tick_of(&self, when: Instant) -> u64 {
        let elapsed = when.saturating_duration_since(self.epoch);
        // Round up so an entry never fires earlier than its deadline.
        elapsed.as_nanos().div_ceil(self.config.tick.as_nanos()) as u64
    }

    fn insert(&self, deadline: Instant, entry: Arc<TimerEntry>) {
        let mut deadline_tick = self.tick_of(deadline);
        let mut state = self.state.lock();
        // The slot for an already-processed tick would wait a full lap.
        if deadline_tick <= state.current_tick {
            deadline_tick = state.current_tick + 1;
        }
        let slot = (deadline_tick & self.mask) as usize;
        state.slots[slot].push(Armed {
            deadline_tick,
            entry,
        });
    }

    fn run(self: Arc<Self>) {
        let tick_duration = self.config.tick;
        let mut next_tick = Instant::now() + tick_duration;

        while !self.shutdown.load(Ordering::Acquire) {
            let now = Instant::now();
            if now < next_tick {
                thread::sleep(next_tick - now);
                continue;
            }

            self.advance(now);

            next_tick += tick_duration;
            if next_tick <= now {
                next_tick = now + tick_duration;
            }
        }
    }

    /// Processes every tick that elapsed since the last advance, firing the
    /// due entries of each visited slot.
    fn advance(&self, now: Instant) {
        let target_tick =
            (now.saturating_duration_since(self.epoch).as_nanos() / self.config.tick.as_nanos()) as u64;

        let due = {
            let mut state = self.state.lock();
            let mut due = Vec::new();
            while state.current_tick < target_tick {
                let tick = state.current_tick + 1;
                let slot = (tick & self.mask) as usize;
                let bucket = &mut state.slots[slot];
                let mut i = 0;
                while i < bucket.len() {
                    if bucket[i].deadline_tick <= target_tick {
                        due.push(bucket.swap_remove(i));
                    } else {
                        i += 1;
                    }
                }
                state.current_tick = tick;
            }
            due
        };

        for armed in due {
            self.fire(armed);
        }
    }

    fn fire(&self, armed: Armed) {
        let entry = armed.entry;
        match &entry.plan {
            None => {
                // One-shot: losing the CAS means a racing stop() won.
                if entry
                    .state
                    .compare_exchange(
                        STATE_PENDING,
                        STATE_FIRED,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_err()
                {
                    return;
                }
            }
            Some(plan) => {
                if entry.state.load(Ordering::Acquire) != STATE_PENDING {
                    return;
                }
                // Re-arm before running the callback so firings of a slow
                // callback may overlap.
                let prev = self.epoch
                    + Duration::from_nanos(
                        (self.config.tick.as_nanos() as u64).saturating_mul(armed.deadline_tick),
                    );
                if let Some(next) = plan.next(prev) {
                    self.insert(next, Arc::clone(&entry));
                }
            }
        }

        let callback = Arc::clone(&entry.callback);
        thread::Builder::new()
            .name("tickline-wheel-fire".into())
            .spawn(move || {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback())) {
                    error!(
                        message = %panic_message(payload.as_ref()),
                        "wheel callback panicked"
                    );
                }
            })
            .expect("failed to spawn wheel fire thread");
    }
}

impl Drop for TimingWheel {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
