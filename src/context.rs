//! Process-wide wiring for the default timeline, scene timer, and logic
//! thread.
//!
//! Constructed once by the host application and passed by handle to
//! anything needing scheduling; there is no hidden module-level state.

use std::sync::Arc;

use crate::scene_timer::SceneTimer;
use crate::scheduler::TaskScheduler;
use crate::threading::{LogicThread, ThreadOptions, WorkItem};
use crate::timeline::Timeline;
use crate::wheel::WheelConfig;

/// Construction knobs for [`TicklineContext`].
#[derive(Clone, Debug)]
pub struct ContextConfig {
    pub wheel: WheelConfig,
    pub logic_thread: ThreadOptions,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            wheel: WheelConfig::default(),
            logic_thread: ThreadOptions::default().with_id("logic-thread"),
        }
    }
}

/// The wired-together core: one timeline, one scene timer (with its own
/// scheduler and wheel), and one logic thread with the timeline attached
/// as a work item.
pub struct TicklineContext {
    timeline: Arc<Timeline>,
    scene_timer: Arc<SceneTimer>,
    logic_thread: Arc<LogicThread>,
}

impl TicklineContext {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    pub fn with_config(config: ContextConfig) -> Self {
        let timeline = Timeline::new();
        let scheduler = TaskScheduler::with_config(config.wheel);
        let scene_timer = SceneTimer::new(scheduler);
        let logic_thread = LogicThread::with_options(config.logic_thread);

        timeline.set_scene_timer(&scene_timer);
        scene_timer.set_timeline(&timeline);
        logic_thread.attach_work_item(Arc::clone(&timeline) as Arc<dyn WorkItem>);

        Self {
            timeline,
            scene_timer,
            logic_thread,
        }
    }

    /// Starts the logic thread; the timeline begins ticking once per
    /// cycle.
    pub fn start(&self) {
        self.logic_thread.start();
    }

    /// Stops the logic thread and the scheduler's wheel, joining both
    /// driver threads.
    pub fn shutdown(&self) {
        self.logic_thread.stop();
        self.logic_thread.join();
        self.scene_timer.scheduler().shutdown();
    }

    pub fn timeline(&self) -> &Arc<Timeline> {
        &self.timeline
    }

    pub fn scene_timer(&self) -> &Arc<SceneTimer> {
        &self.scene_timer
    }

    pub fn logic_thread(&self) -> &Arc<LogicThread> {
        &self.logic_thread
    }

    pub fn scheduler(&self) -> &Arc<TaskScheduler> {
        self.scene_timer.scheduler()
    }
}

impl Default for TicklineContext {
    fn default() -> Self {
        Self::new()
    }
}
