use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use tickline::scene_timer::{SceneTimer, TimerOpts};
use tickline::scheduler::TaskScheduler;
use tickline::timeline::Timeline;

struct Wired {
    scheduler: Arc<TaskScheduler>,
    scene_timer: Arc<SceneTimer>,
    timeline: Arc<Timeline>,
}

fn wire() -> Wired {
    let scheduler = TaskScheduler::new();
    let scene_timer = SceneTimer::new(Arc::clone(&scheduler));
    let timeline = Timeline::new();
    timeline.set_scene_timer(&scene_timer);
    scene_timer.set_timeline(&timeline);
    Wired {
        scheduler,
        scene_timer,
        timeline,
    }
}

#[test]
fn default_redirect_runs_the_action_only_on_a_tick() {
    let wired = wire();
    let ran = Arc::new(AtomicBool::new(false));

    let ran2 = Arc::clone(&ran);
    wired.scene_timer.start_one_timer(
        Duration::from_millis(30),
        move || {
            ran2.store(true, Ordering::SeqCst);
        },
        TimerOpts::new(),
    );

    // The timer has fired, but the action sits on the one-shot queue
    // until the timeline ticks.
    thread::sleep(Duration::from_millis(120));
    assert!(!ran.load(Ordering::SeqCst), "must not run on the wheel's context");

    wired.timeline.tick();
    assert!(ran.load(Ordering::SeqCst), "delivered through the tick");
    wired.scheduler.shutdown();
}

#[test]
fn inline_option_disables_the_redirect() {
    let wired = wire();
    let ran = Arc::new(AtomicBool::new(false));

    let ran2 = Arc::clone(&ran);
    wired.scene_timer.start_one_timer(
        Duration::from_millis(20),
        move || {
            ran2.store(true, Ordering::SeqCst);
        },
        TimerOpts::new().inline(),
    );

    thread::sleep(Duration::from_millis(120));
    assert!(
        ran.load(Ordering::SeqCst),
        "inline actions run without any tick"
    );
    wired.scheduler.shutdown();
}

#[test]
fn explicit_key_allows_deterministic_removal() {
    let wired = wire();
    let ran_a = Arc::new(AtomicBool::new(false));
    let ran_b = Arc::new(AtomicBool::new(false));

    let ran = Arc::clone(&ran_a);
    let key_a = wired.scene_timer.start_one_timer(
        Duration::from_millis(100),
        move || {
            ran.store(true, Ordering::SeqCst);
        },
        TimerOpts::new().with_key("a").inline(),
    );
    assert_eq!(key_a, "a");

    let ran = Arc::clone(&ran_b);
    let key_b = wired.scene_timer.start_one_timer(
        Duration::from_millis(100),
        move || {
            ran.store(true, Ordering::SeqCst);
        },
        TimerOpts::new().with_key("b").inline(),
    );
    assert_eq!(key_b, "b");

    thread::sleep(Duration::from_millis(10));
    assert!(wired.scene_timer.remove_timer("a").did_cancel());

    thread::sleep(Duration::from_millis(150));
    assert!(!ran_a.load(Ordering::SeqCst), "timer a was removed in time");
    assert!(ran_b.load(Ordering::SeqCst), "timer b fired");
    wired.scheduler.shutdown();
}

#[test]
fn generated_keys_are_unique() {
    let wired = wire();
    let k1 = wired
        .scene_timer
        .start_one_timer(Duration::from_secs(5), || {}, TimerOpts::new());
    let k2 = wired
        .scene_timer
        .start_one_timer(Duration::from_secs(5), || {}, TimerOpts::new());
    assert!(!k1.is_empty());
    assert_ne!(k1, k2);
    assert!(wired.scene_timer.remove_timer(&k1).did_cancel());
    assert!(wired.scene_timer.remove_timer(&k2).did_cancel());
    wired.scheduler.shutdown();
}

#[test]
fn data_bound_one_timer_delivers_its_payload() {
    let wired = wire();
    let seen = Arc::new(AtomicUsize::new(0));

    let seen2 = Arc::clone(&seen);
    wired.scene_timer.start_one_timer_with_data(
        Duration::from_millis(20),
        move |hp: &usize| {
            seen2.store(*hp, Ordering::SeqCst);
        },
        250usize,
        TimerOpts::new(),
    );

    thread::sleep(Duration::from_millis(100));
    wired.timeline.tick();
    assert_eq!(seen.load(Ordering::SeqCst), 250);
    wired.scheduler.shutdown();
}

#[test]
fn recurring_timer_delivers_through_successive_ticks() {
    let wired = wire();
    let count = Arc::new(AtomicUsize::new(0));

    let count2 = Arc::clone(&count);
    let key = wired.scene_timer.start_recur_timer(
        Duration::from_millis(25),
        move || {
            count2.fetch_add(1, Ordering::SeqCst);
        },
        TimerOpts::new(),
    );

    for _ in 0..10 {
        thread::sleep(Duration::from_millis(30));
        wired.timeline.tick();
    }
    assert!(count.load(Ordering::SeqCst) >= 3);

    assert!(wired.scene_timer.remove_timer(&key).found());
    thread::sleep(Duration::from_millis(60));
    wired.timeline.tick();
    let frozen = count.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(100));
    wired.timeline.tick();
    assert_eq!(count.load(Ordering::SeqCst), frozen);
    wired.scheduler.shutdown();
}
