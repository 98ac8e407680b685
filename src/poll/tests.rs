//! 轮询调度器测试
//! Poll scheduler tests

use super::*;
use crate::testing::{init_tracing, ms};
use crate::timer::ManualScheduler;
use std::cell::Cell;
use std::io;

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// A refresh that counts its invocations and settles immediately.
fn counting_refresh(count: &Rc<Cell<u32>>) -> impl Refresh + 'static + use<> {
    let count = count.clone();
    move || {
        let count = count.clone();
        async move {
            count.set(count.get() + 1);
            Ok::<(), RefreshError>(())
        }
    }
}

/// A refresh that takes `duration` of virtual time to settle.
fn slow_refresh(
    clock: &ManualScheduler,
    duration: Duration,
    count: &Rc<Cell<u32>>,
) -> impl Refresh + 'static + use<> {
    let clock = clock.clone();
    let count = count.clone();
    move || {
        count.set(count.get() + 1);
        let sleep = clock.sleep(duration);
        async move {
            sleep.await;
            Ok::<(), RefreshError>(())
        }
    }
}

fn config(interval_secs: u32, enabled: bool) -> PollConfig {
    PollConfig {
        interval_secs,
        enabled,
    }
}

#[test]
fn test_basic_cycle() {
    init_tracing();
    let clock = ManualScheduler::new();
    let count = Rc::new(Cell::new(0));
    let poll = PollScheduler::new(
        clock.clone(),
        config(5, true),
        counting_refresh(&count),
    )
    .unwrap();

    assert_eq!(poll.phase(), PollPhase::Counting);
    assert_eq!(poll.remaining(), 5);

    clock.advance(secs(4));
    assert_eq!(poll.remaining(), 1);
    assert_eq!(count.get(), 0);

    clock.advance(secs(1));
    assert_eq!(count.get(), 1);
    assert_eq!(poll.countdown(), Countdown { remaining: 5, phase: PollPhase::Counting });

    clock.advance(secs(5));
    assert_eq!(count.get(), 2);
    assert_eq!(poll.stats().refreshes_succeeded, 2);
    assert_eq!(poll.stats().ticks, 10);
}

#[test]
fn test_disable_mid_countdown_never_refreshes() {
    let clock = ManualScheduler::new();
    let count = Rc::new(Cell::new(0));
    let poll = PollScheduler::new(
        clock.clone(),
        config(5, true),
        counting_refresh(&count),
    )
    .unwrap();

    clock.advance(secs(3));
    assert_eq!(poll.remaining(), 2);

    poll.set_enabled(false).unwrap();
    assert_eq!(poll.phase(), PollPhase::Idle);
    assert_eq!(clock.pending_timers(), 0);

    clock.advance(secs(60));
    assert_eq!(count.get(), 0);

    // 重新启用时从完整的间隔开始
    poll.set_enabled(true).unwrap();
    assert_eq!(poll.remaining(), 5);
    clock.advance(secs(4));
    assert_eq!(count.get(), 0);
    clock.advance(secs(1));
    assert_eq!(count.get(), 1);
}

#[test]
fn test_slow_refresh_is_never_reentered() {
    let clock = ManualScheduler::new();
    let count = Rc::new(Cell::new(0));
    let poll = PollScheduler::new(
        clock.clone(),
        config(5, true),
        slow_refresh(&clock, secs(8), &count),
    )
    .unwrap();

    clock.advance(secs(5));
    assert_eq!(count.get(), 1);
    assert_eq!(poll.phase(), PollPhase::Refreshing);
    assert!(poll.is_refreshing());

    // 跨越第二个5秒边界时仍在刷新
    clock.advance(ms(7999));
    assert_eq!(count.get(), 1);
    assert_eq!(poll.countdown(), Countdown { remaining: 0, phase: PollPhase::Refreshing });

    clock.advance(ms(1));
    assert!(!poll.is_refreshing());
    assert_eq!(poll.countdown(), Countdown { remaining: 5, phase: PollPhase::Counting });

    clock.advance(secs(5));
    assert_eq!(count.get(), 2);
}

#[test]
fn test_failed_refresh_resets_countdown() {
    let clock = ManualScheduler::new();
    let poll = PollScheduler::new(clock.clone(), config(3, true), || async {
        Err::<(), RefreshError>(Box::new(io::Error::other("backend unavailable")))
    })
    .unwrap();

    clock.advance(secs(3));
    let stats = poll.stats();
    assert_eq!(stats.refreshes_failed, 1);
    assert_eq!(
        stats.last_error,
        Some(Error::Refresh("backend unavailable".to_string()))
    );
    assert_eq!(poll.countdown(), Countdown { remaining: 3, phase: PollPhase::Counting });
    assert!(!poll.is_refreshing());

    clock.advance(secs(3));
    assert_eq!(poll.stats().refreshes_failed, 2);
}

#[test]
fn test_external_busy_suspends_and_restarts_full() {
    let clock = ManualScheduler::new();
    let count = Rc::new(Cell::new(0));
    let poll = PollScheduler::new(
        clock.clone(),
        config(5, true),
        counting_refresh(&count),
    )
    .unwrap();

    clock.advance(secs(2));
    poll.set_loading_state(false, true).unwrap();
    assert_eq!(poll.phase(), PollPhase::Idle);

    clock.advance(secs(30));
    assert_eq!(count.get(), 0);

    poll.set_loading_state(false, false).unwrap();
    assert_eq!(poll.remaining(), 5);
    clock.advance(secs(5));
    assert_eq!(count.get(), 1);
}

#[test]
fn test_interval_change_restarts_countdown() {
    let clock = ManualScheduler::new();
    let count = Rc::new(Cell::new(0));
    let poll = PollScheduler::new(
        clock.clone(),
        config(10, true),
        counting_refresh(&count),
    )
    .unwrap();

    clock.advance(ms(7500));
    assert_eq!(poll.remaining(), 3);

    poll.set_interval(4).unwrap();
    assert_eq!(poll.remaining(), 4);
    // 部分经过的一秒不会被保留
    clock.advance(ms(3999));
    assert_eq!(count.get(), 0);
    clock.advance(ms(1));
    assert_eq!(count.get(), 1);

    assert_eq!(poll.set_interval(0), Err(Error::InvalidInterval));
    assert_eq!(poll.interval_secs(), 4);
}

#[test]
fn test_boundary_absorbed_while_old_refresh_in_flight() {
    let clock = ManualScheduler::new();
    let count = Rc::new(Cell::new(0));
    let poll = PollScheduler::new(
        clock.clone(),
        config(5, true),
        slow_refresh(&clock, secs(8), &count),
    )
    .unwrap();

    clock.advance(secs(6));
    assert_eq!(count.get(), 1);

    poll.set_enabled(false).unwrap();
    poll.set_enabled(true).unwrap();
    assert_eq!(poll.phase(), PollPhase::Counting);

    // t=11 归零，但 t=5 开始的刷新要到 t=13 才结算
    clock.advance(secs(5));
    assert_eq!(count.get(), 1);
    assert_eq!(poll.stats().absorbed, 1);
    assert_eq!(poll.remaining(), 5);

    // t=13 旧刷新结算，倒计时从完整间隔重新开始
    clock.advance(secs(2));
    assert!(!poll.is_refreshing());
    assert_eq!(poll.remaining(), 5);

    clock.advance(secs(4));
    assert_eq!(count.get(), 1);
    clock.advance(secs(1));
    assert_eq!(count.get(), 2);
}

#[test]
fn test_reconfigured_during_refresh_waits_full_interval_after_settle() {
    let clock = ManualScheduler::new();
    let count = Rc::new(Cell::new(0));
    let poll = PollScheduler::new(
        clock.clone(),
        config(5, true),
        slow_refresh(&clock, secs(3), &count),
    )
    .unwrap();

    clock.advance(secs(6));
    assert_eq!(count.get(), 1);
    poll.set_interval(2).unwrap();
    poll.set_external_busy(true).unwrap();
    poll.set_external_busy(false).unwrap();

    // t=8 结算后需要再等完整的2秒
    clock.advance(secs(2));
    assert!(!poll.is_refreshing());
    assert_eq!(poll.countdown(), Countdown { remaining: 2, phase: PollPhase::Counting });

    clock.advance(ms(1999));
    assert_eq!(count.get(), 1);
    clock.advance(ms(1));
    assert_eq!(count.get(), 2);
}

#[test]
fn test_teardown_while_refreshing_is_inert() {
    let clock = ManualScheduler::new();
    let count = Rc::new(Cell::new(0));
    let poll = PollScheduler::new(
        clock.clone(),
        config(5, true),
        slow_refresh(&clock, secs(8), &count),
    )
    .unwrap();
    let rx = poll.subscribe();

    clock.advance(secs(6));
    drop(poll);

    clock.advance(secs(60));
    assert_eq!(count.get(), 1);
    assert_eq!(clock.pending_timers(), 0);
    // 拆除后不再发布倒计时
    assert_eq!(rx.borrow().phase, PollPhase::Idle);
}

#[test]
fn test_shutdown_rejects_further_operations() {
    let clock = ManualScheduler::new();
    let count = Rc::new(Cell::new(0));
    let poll = PollScheduler::new(
        clock.clone(),
        config(5, true),
        counting_refresh(&count),
    )
    .unwrap();

    poll.shutdown();
    assert_eq!(clock.pending_timers(), 0);
    assert_eq!(poll.set_enabled(true), Err(Error::ShutDown));
    assert_eq!(poll.trigger(), Err(Error::ShutDown));

    clock.advance(secs(30));
    assert_eq!(count.get(), 0);
}

#[test]
fn test_manual_trigger_respects_guard() {
    let clock = ManualScheduler::new();
    let count = Rc::new(Cell::new(0));
    let poll = PollScheduler::new(
        clock.clone(),
        config(30, false),
        slow_refresh(&clock, secs(2), &count),
    )
    .unwrap();

    assert_eq!(poll.trigger(), Ok(true));
    assert_eq!(poll.trigger(), Ok(false));
    clock.run_pending();
    assert_eq!(count.get(), 1);

    clock.advance(secs(2));
    assert!(!poll.is_refreshing());
    // 未启用时手动刷新结算后保持空闲
    assert_eq!(poll.phase(), PollPhase::Idle);
    assert_eq!(poll.trigger(), Ok(true));
}

#[test]
fn test_refresh_callback_read_at_fire_time() {
    let clock = ManualScheduler::new();
    let old = Rc::new(Cell::new(0));
    let new = Rc::new(Cell::new(0));
    let poll = PollScheduler::new(clock.clone(), config(5, true), counting_refresh(&old)).unwrap();

    clock.advance(secs(3));
    poll.set_refresh(counting_refresh(&new));
    assert_eq!(poll.remaining(), 2);

    clock.advance(secs(2));
    assert_eq!(old.get(), 0);
    assert_eq!(new.get(), 1);
}

#[test]
fn test_subscribers_see_countdown() {
    let clock = ManualScheduler::new();
    let count = Rc::new(Cell::new(0));
    let poll = PollScheduler::new(
        clock.clone(),
        config(3, false),
        counting_refresh(&count),
    )
    .unwrap();
    let mut rx = poll.subscribe();
    assert_eq!(rx.borrow_and_update().phase, PollPhase::Idle);

    poll.set_enabled(true).unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), Countdown { remaining: 3, phase: PollPhase::Counting });

    clock.advance(secs(1));
    assert_eq!(rx.borrow_and_update().remaining, 2);
}

#[test]
fn test_rejects_zero_interval() {
    let clock = ManualScheduler::new();
    let count = Rc::new(Cell::new(0));
    let result = PollScheduler::new(clock, config(0, true), counting_refresh(&count));
    assert!(matches!(result, Err(Error::InvalidInterval)));
}
