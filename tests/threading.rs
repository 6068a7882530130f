use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use tickline::threading::{
    LogicThread, ThreadOptions, WorkItem, WorkItemPool, WorkItemThread, work_item, work_item_with,
};

fn fast_options() -> ThreadOptions {
    ThreadOptions::default().with_interval(Duration::from_millis(5))
}

#[test]
fn batch_pool_runs_every_item_each_cycle() {
    let logic = LogicThread::with_options(fast_options());
    let a = Arc::new(AtomicUsize::new(0));
    let b = Arc::new(AtomicUsize::new(0));

    let a2 = Arc::clone(&a);
    logic.attach_work_item(work_item("count-a", move || {
        a2.fetch_add(1, Ordering::SeqCst);
    }));
    let b2 = Arc::clone(&b);
    logic.attach_work_item(work_item("count-b", move || {
        b2.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(logic.work_item_count(), 2);

    logic.start();
    thread::sleep(Duration::from_millis(100));
    logic.stop();
    logic.join();

    assert!(a.load(Ordering::SeqCst) >= 3);
    assert!(b.load(Ordering::SeqCst) >= 3);
    assert!(!logic.is_running());
}

#[test]
fn a_panicking_item_does_not_stop_the_loop() {
    let logic = LogicThread::with_options(fast_options());
    let healthy = Arc::new(AtomicUsize::new(0));

    logic.attach_work_item(work_item("always-panics", || {
        panic!("scripted failure");
    }));
    let healthy2 = Arc::clone(&healthy);
    logic.attach_work_item(work_item("healthy", move || {
        healthy2.fetch_add(1, Ordering::SeqCst);
    }));

    logic.start();
    thread::sleep(Duration::from_millis(100));
    logic.stop();
    logic.join();

    assert!(
        healthy.load(Ordering::SeqCst) >= 3,
        "healthy item keeps running across cycles"
    );
}

#[test]
fn start_is_idempotent_while_running() {
    let logic = LogicThread::with_options(fast_options());
    let counter = Arc::new(AtomicUsize::new(0));
    let counter2 = Arc::clone(&counter);
    logic.attach_work_item(work_item("counter", move || {
        counter2.fetch_add(1, Ordering::SeqCst);
    }));

    logic.start();
    logic.start();
    logic.start();
    thread::sleep(Duration::from_millis(60));
    logic.stop();
    logic.join();
    assert!(counter.load(Ordering::SeqCst) >= 1);
}

#[test]
fn detached_items_leave_the_next_snapshot() {
    let logic = LogicThread::with_options(fast_options());
    let counter = Arc::new(AtomicUsize::new(0));
    let counter2 = Arc::clone(&counter);
    let item = work_item("detachable", move || {
        counter2.fetch_add(1, Ordering::SeqCst);
    });
    logic.attach_work_item(Arc::clone(&item));

    logic.start();
    thread::sleep(Duration::from_millis(60));
    logic.detach_work_item(&item);
    assert_eq!(logic.work_item_count(), 0);

    // One in-flight cycle may still hold the old snapshot.
    thread::sleep(Duration::from_millis(20));
    let frozen = counter.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(60));
    assert_eq!(counter.load(Ordering::SeqCst), frozen);

    logic.stop();
    logic.join();
}

#[test]
fn data_bound_work_items_see_their_value() {
    let logic = LogicThread::with_options(fast_options());
    let seen = Arc::new(AtomicUsize::new(0));
    let seen2 = Arc::clone(&seen);
    logic.attach_work_item(work_item_with(
        "bound",
        move |v: &usize| {
            seen2.store(*v, Ordering::SeqCst);
        },
        99usize,
    ));

    logic.start();
    thread::sleep(Duration::from_millis(50));
    logic.stop();
    logic.join();
    assert_eq!(seen.load(Ordering::SeqCst), 99);
}

#[test]
fn abort_timeout_abandons_a_stuck_item_without_stalling_the_loop() {
    let options = ThreadOptions::default()
        .with_interval(Duration::from_millis(5))
        .with_abort_timeout(Duration::from_millis(20));
    let logic = LogicThread::with_options(options);
    let healthy = Arc::new(AtomicUsize::new(0));

    logic.attach_work_item(work_item("stuck", || {
        thread::sleep(Duration::from_millis(500));
    }));
    let healthy2 = Arc::clone(&healthy);
    logic.attach_work_item(work_item("healthy", move || {
        healthy2.fetch_add(1, Ordering::SeqCst);
    }));

    logic.start();
    thread::sleep(Duration::from_millis(200));
    logic.stop();
    logic.join();

    assert!(
        healthy.load(Ordering::SeqCst) >= 3,
        "abandoning the stuck item keeps the cadence for the rest"
    );
}

/// Single-item pool used to exercise the non-batch retrieval mode.
struct QueuePool {
    queue: Mutex<VecDeque<Arc<dyn WorkItem>>>,
}

impl QueuePool {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    fn push(&self, item: Arc<dyn WorkItem>) {
        self.queue.lock().push_back(item);
    }
}

impl WorkItemPool for QueuePool {
    fn batch_mode(&self) -> bool {
        false
    }

    fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    fn next_items(&self) -> Vec<Arc<dyn WorkItem>> {
        match self.queue.lock().pop_front() {
            Some(item) => vec![item],
            None => Vec::new(),
        }
    }
}

#[test]
fn single_item_pool_drains_its_backlog_within_one_cycle() {
    let pool = Arc::new(QueuePool::new());
    let executed = Arc::new(AtomicUsize::new(0));

    // Deep enough to cross the backlog warning threshold.
    for i in 0..15 {
        let executed2 = Arc::clone(&executed);
        pool.push(work_item(format!("job-{i}"), move || {
            executed2.fetch_add(1, Ordering::SeqCst);
        }));
    }

    let thread = WorkItemThread::new(
        Arc::clone(&pool) as Arc<dyn WorkItemPool>,
        fast_options().with_id("queue-drainer"),
    );
    thread.start();
    thread::sleep(Duration::from_millis(100));
    thread.stop();
    thread.join();

    assert_eq!(executed.load(Ordering::SeqCst), 15);
    assert_eq!(pool.queue_len(), 0);
    assert!(thread.last_start().is_some());
}
