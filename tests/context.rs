use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use tickline::context::TicklineContext;
use tickline::scene_timer::TimerOpts;
use tickline::timeline::TimelineObserver;

#[test]
fn the_logic_thread_ticks_the_timeline() {
    let ctx = TicklineContext::new();
    let deltas: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));

    let deltas2 = Arc::clone(&deltas);
    ctx.timeline()
        .subscribe(&TimelineObserver::from_delta(move |delta| {
            deltas2.lock().push(delta);
        }));

    ctx.start();
    thread::sleep(Duration::from_millis(300));
    ctx.shutdown();

    let deltas = deltas.lock();
    assert!(
        deltas.len() >= 5,
        "expected a steady tick cadence, saw {} ticks",
        deltas.len()
    );
    assert!(deltas.iter().all(|d| *d >= 0.0));
    assert!(!ctx.logic_thread().is_running());
}

#[test]
fn scene_timer_actions_land_on_the_logic_thread_cadence() {
    let ctx = TicklineContext::new();
    let ran = Arc::new(AtomicUsize::new(0));

    ctx.start();
    let ran2 = Arc::clone(&ran);
    ctx.scene_timer().start_one_timer(
        Duration::from_millis(40),
        move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        },
        TimerOpts::new(),
    );

    thread::sleep(Duration::from_millis(300));
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    ctx.shutdown();
}

#[test]
fn timers_scheduled_from_a_tick_close_the_loop() {
    let ctx = TicklineContext::new();
    let second_hop = Arc::new(AtomicUsize::new(0));

    ctx.start();
    let scene_timer = Arc::clone(ctx.scene_timer());
    let second_hop2 = Arc::clone(&second_hop);
    ctx.scene_timer().start_one_timer(
        Duration::from_millis(20),
        move || {
            // Runs on a tick; schedules the next hop from inside it.
            let second_hop3 = Arc::clone(&second_hop2);
            scene_timer.start_one_timer(
                Duration::from_millis(20),
                move || {
                    second_hop3.fetch_add(1, Ordering::SeqCst);
                },
                TimerOpts::new(),
            );
        },
        TimerOpts::new(),
    );

    thread::sleep(Duration::from_millis(400));
    assert_eq!(second_hop.load(Ordering::SeqCst), 1);
    ctx.shutdown();
}

#[test]
fn shutdown_is_clean_and_stops_future_firings() {
    let ctx = TicklineContext::new();
    let ran = Arc::new(AtomicUsize::new(0));

    ctx.start();
    let ran2 = Arc::clone(&ran);
    ctx.scene_timer().start_one_timer(
        Duration::from_secs(2),
        move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        },
        TimerOpts::new().inline(),
    );

    ctx.shutdown();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(ran.load(Ordering::SeqCst), 0, "pending timers die with the wheel");
}
