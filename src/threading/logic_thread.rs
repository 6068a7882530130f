use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::thread::{ThreadOptions, WorkItemThread};
use super::work_item::{WorkItem, WorkItemPool};

/// Batch-mode working set with copy-on-write snapshots.
///
/// Mutations rewrite the canonical list under the lock and immediately
/// republish a fresh snapshot, so the execution loop never observes a
/// half-mutated set.
struct WorkSet {
    canonical: Mutex<Vec<Arc<dyn WorkItem>>>,
    working: RwLock<Arc<[Arc<dyn WorkItem>]>>,
}

impl WorkSet {
    fn new() -> Self {
        let working: Arc<[Arc<dyn WorkItem>]> = Arc::from(Vec::new());
        Self {
            canonical: Mutex::new(Vec::new()),
            working: RwLock::new(working),
        }
    }

    fn attach(&self, item: Arc<dyn WorkItem>) {
        let mut canonical = self.canonical.lock();
        canonical.push(item);
        *self.working.write() = Arc::from(canonical.as_slice());
    }

    fn detach(&self, item: &Arc<dyn WorkItem>) {
        let mut canonical = self.canonical.lock();
        canonical.retain(|existing| !Arc::ptr_eq(existing, item));
        *self.working.write() = Arc::from(canonical.as_slice());
    }
}

impl WorkItemPool for WorkSet {
    fn batch_mode(&self) -> bool {
        true
    }

    fn queue_len(&self) -> usize {
        self.working.read().len()
    }

    fn next_items(&self) -> Vec<Arc<dyn WorkItem>> {
        self.working.read().to_vec()
    }
}

/// The single execution context intended to own all game-state mutation.
///
/// A batch-mode pool wrapping a [`WorkItemThread`]: every cycle executes
/// the whole live set once. The timeline is normally attached as one of
/// its work items, making it tick once per cycle.
pub struct LogicThread {
    set: Arc<WorkSet>,
    thread: Arc<WorkItemThread>,
}

impl LogicThread {
    pub fn new() -> Arc<Self> {
        Self::with_options(ThreadOptions::default().with_id("logic-thread"))
    }

    pub fn with_options(options: ThreadOptions) -> Arc<Self> {
        let set = Arc::new(WorkSet::new());
        let thread = WorkItemThread::new(Arc::clone(&set) as Arc<dyn WorkItemPool>, options);
        Arc::new(Self { set, thread })
    }

    pub fn start(&self) {
        self.thread.start();
    }

    pub fn stop(&self) {
        self.thread.stop();
    }

    pub fn join(&self) {
        self.thread.join();
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_running()
    }

    /// Adds `item` to the live set; visible from the next cycle's snapshot.
    pub fn attach_work_item(&self, item: Arc<dyn WorkItem>) {
        self.set.attach(item);
    }

    /// Removes `item` (by identity) from the live set; a cycle already
    /// holding the previous snapshot may execute it one final time.
    pub fn detach_work_item(&self, item: &Arc<dyn WorkItem>) {
        self.set.detach(item);
    }

    pub fn work_item_count(&self) -> usize {
        self.set.queue_len()
    }
}
