//! Fixed-rate tick engine for game-style server runtimes.
//!
//! Three coupled subsystems:
//!
//! - a timing-wheel [`scheduler`] that turns delays and intervals into
//!   callback invocations, with a key-addressed registry and best-effort
//!   cancellation;
//! - a [`timeline`] frame dispatcher notifying persistent and one-shot
//!   observers once per tick with the elapsed time, using copy-on-write
//!   snapshots to keep the hot notify path lock-light;
//! - a [`threading`] execution-loop abstraction whose batch-mode
//!   [`LogicThread`](threading::LogicThread) is the single thread that
//!   normally drives the timeline.
//!
//! The [`scene_timer`] policy layer closes the loop: timer callbacks are
//! redirected onto the timeline by default, so arbitrary timer-driven
//! logic executes on the logic thread and shared game state needs no
//! locking. [`context::TicklineContext`] wires the default instances
//! together.
//!
//! ```no_run
//! use std::time::Duration;
//! use tickline::context::TicklineContext;
//! use tickline::scene_timer::TimerOpts;
//! use tickline::timeline::TimelineObserver;
//!
//! let ctx = TicklineContext::new();
//! ctx.start();
//!
//! ctx.timeline()
//!     .subscribe(&TimelineObserver::from_delta(|delta_ms| {
//!         // runs every tick on the logic thread
//!         let _ = delta_ms;
//!     }));
//!
//! ctx.scene_timer()
//!     .start_one_timer(Duration::from_millis(50), || {
//!         // runs on the logic thread, one tick after the timer fires
//!     }, TimerOpts::new());
//!
//! ctx.shutdown();
//! ```

pub mod context;
pub mod error;
pub mod scene_timer;
pub mod scheduler;
pub mod threading;
pub mod timeline;
pub mod wheel;

pub use context::TicklineContext;
pub use error::{BoxError, TaskError};
pub use scene_timer::{SceneTimer, TimerOpts};
pub use scheduler::{ScheduleObserver, StopOutcome, TaskItem, TaskScheduler};
pub use threading::{LogicThread, WorkItem, WorkItemPool, WorkItemThread};
pub use timeline::{Timeline, TimelineObserver};
