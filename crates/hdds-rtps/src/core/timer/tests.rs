// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::*;

fn wait_for(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

fn counter_event(
    scheduler: &TimedEventScheduler,
    interval: Duration,
    action: EventAction,
) -> (TimedEvent, Arc<AtomicU32>) {
    let fired = Arc::new(AtomicU32::new(0));
    let fired_clone = Arc::clone(&fired);
    let event = scheduler.create_event(interval, move || {
        fired_clone.fetch_add(1, Ordering::SeqCst);
        action
    });
    (event, fired)
}

#[test]
fn test_one_shot_fires_once() {
    let scheduler = TimedEventScheduler::new().unwrap();
    let (event, fired) = counter_event(&scheduler, Duration::from_millis(5), EventAction::Stop);
    assert!(!event.is_armed());
    assert!(event.restart_timer());
    assert!(wait_for(Duration::from_secs(1), || fired.load(Ordering::SeqCst) == 1));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!event.is_armed());
}

#[test]
fn test_periodic_restarts() {
    let scheduler = TimedEventScheduler::new().unwrap();
    let (event, fired) =
        counter_event(&scheduler, Duration::from_millis(5), EventAction::Restart);
    event.restart_timer();
    assert!(wait_for(Duration::from_secs(2), || fired.load(Ordering::SeqCst) >= 3));
    assert!(event.cancel_timer());
    let after_cancel = fired.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(40));
    // At most one firing already in flight when cancel landed.
    assert!(fired.load(Ordering::SeqCst) <= after_cancel + 1);
}

#[test]
fn test_cancel_is_idempotent() {
    let scheduler = TimedEventScheduler::new().unwrap();
    let (event, fired) = counter_event(&scheduler, Duration::from_millis(20), EventAction::Stop);
    event.restart_timer();
    assert!(event.cancel_timer());
    assert!(!event.cancel_timer());
    thread::sleep(Duration::from_millis(50));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn test_restart_supersedes_pending() {
    let scheduler = TimedEventScheduler::new().unwrap();
    let (event, fired) = counter_event(&scheduler, Duration::from_millis(20), EventAction::Stop);
    event.restart_timer();
    event.restart_timer_after(Duration::from_millis(60));
    thread::sleep(Duration::from_millis(35));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert!(wait_for(Duration::from_secs(1), || fired.load(Ordering::SeqCst) == 1));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn test_events_fire_in_due_order() {
    let scheduler = TimedEventScheduler::new().unwrap();
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let mut events = Vec::new();
    for (tag, ms) in [(3u32, 45u64), (1, 5), (2, 25)] {
        let order = Arc::clone(&order);
        let event = scheduler.create_event(Duration::from_millis(ms), move || {
            order.lock().push(tag);
            EventAction::Stop
        });
        event.restart_timer();
        events.push(event);
    }
    assert!(wait_for(Duration::from_secs(1), || order.lock().len() == 3));
    assert_eq!(*order.lock(), vec![1, 2, 3]);
}

#[test]
fn test_recreate_waits_for_running_callback() {
    let scheduler = TimedEventScheduler::new().unwrap();
    let entered = Arc::new(AtomicU32::new(0));
    let finished = Arc::new(AtomicU32::new(0));
    let (e, f) = (Arc::clone(&entered), Arc::clone(&finished));
    let event = scheduler.create_event(Duration::from_millis(1), move || {
        e.store(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        f.store(1, Ordering::SeqCst);
        EventAction::Stop
    });
    event.restart_timer();
    assert!(wait_for(Duration::from_secs(1), || entered.load(Ordering::SeqCst) == 1));
    event.recreate_timer();
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[test]
fn test_infinite_interval_never_arms() {
    let scheduler = TimedEventScheduler::new().unwrap();
    let (event, _fired) = counter_event(
        &scheduler,
        crate::core::time::DURATION_INFINITE,
        EventAction::Stop,
    );
    assert!(!event.restart_timer());
    assert!(!event.is_armed());
    assert_eq!(scheduler.armed_count(), 0);
}

#[test]
fn test_event_outliving_scheduler_is_inert() {
    let scheduler = TimedEventScheduler::new().unwrap();
    let (event, fired) = counter_event(&scheduler, Duration::from_millis(1), EventAction::Stop);
    drop(scheduler);
    thread::sleep(Duration::from_millis(10));
    assert!(!event.restart_timer());
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn test_restart_after_from_callback() {
    let scheduler = TimedEventScheduler::new().unwrap();
    let fired = Arc::new(AtomicU32::new(0));
    let fired_clone = Arc::clone(&fired);
    let event = scheduler.create_event(Duration::from_secs(60), move || {
        if fired_clone.fetch_add(1, Ordering::SeqCst) < 2 {
            EventAction::RestartAfter(Duration::from_millis(5))
        } else {
            EventAction::Stop
        }
    });
    event.restart_timer_after(Duration::from_millis(1));
    assert!(wait_for(Duration::from_secs(1), || fired.load(Ordering::SeqCst) == 3));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(fired.load(Ordering::SeqCst), 3);
    assert_eq!(event.interval(), Some(Duration::from_secs(60)));
}
