//! 防抖原语
//! Debounce primitive
//!
//! 将一连串调用合并为一次尾部调用：每次 `schedule` 都会取消未完成的定时器并重新计时，
//! 只有在 `delay` 内没有新的调用时，回调才会以最后一次调用的参数触发。
//!
//! Collapses a burst of calls into one trailing invocation: every `schedule`
//! cancels the outstanding timer and starts a new one, so the callback fires
//! only after `delay` passes without another call, with the arguments of the
//! last call in the burst.

use crate::callback::CallbackCell;
use crate::config::DebounceConfig;
use crate::timer::{Scheduler, SharedScheduler, TimerHandle, share};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tracing::trace;

/// 已注册的定时器及其代号
/// Armed timer and its generation
#[derive(Debug, Clone, Copy)]
struct Armed {
    handle: TimerHandle,
    generation: u64,
}

struct DebounceState<A> {
    armed: Option<Armed>,
    pending: Option<A>,
    generation: u64,
}

/// 尾沿防抖器
/// Trailing-edge debouncer
pub struct Debouncer<A: 'static> {
    scheduler: SharedScheduler,
    delay: Duration,
    callback: CallbackCell<dyn Fn(A)>,
    state: Rc<RefCell<DebounceState<A>>>,
}

impl<A: 'static> Debouncer<A> {
    pub fn new<S, F>(scheduler: S, config: DebounceConfig, callback: F) -> Self
    where
        S: Scheduler + 'static,
        F: Fn(A) + 'static,
    {
        let callback: Rc<dyn Fn(A)> = Rc::new(callback);
        Self {
            scheduler: share(scheduler),
            delay: config.delay,
            callback: CallbackCell::new(callback),
            state: Rc::new(RefCell::new(DebounceState {
                armed: None,
                pending: None,
                generation: 0,
            })),
        }
    }

    /// 以 `args` 重新开始静默期
    /// Restart the quiet period with `args`
    pub fn schedule(&self, args: A) {
        let (previous, generation) = {
            let mut state = self.state.borrow_mut();
            state.pending = Some(args);
            state.generation += 1;
            (state.armed.take(), state.generation)
        };

        if let Some(previous) = previous {
            self.scheduler.cancel(previous.handle);
        }

        let weak = Rc::downgrade(&self.state);
        let callback = self.callback.clone();
        let handle = self.scheduler.after(
            self.delay,
            Box::new(move || Self::fire(&weak, &callback, generation)),
        );
        trace!(handle = %handle, delay = ?self.delay, "Debounce timer armed");

        self.state.borrow_mut().armed = Some(Armed { handle, generation });
    }

    /// 取消当前的一轮调用，返回是否有待执行的调用
    /// Cancel the current burst, returning whether a call was pending
    pub fn cancel(&self) -> bool {
        let armed = {
            let mut state = self.state.borrow_mut();
            state.pending = None;
            state.armed.take()
        };

        match armed {
            Some(armed) => {
                self.scheduler.cancel(armed.handle);
                trace!(handle = %armed.handle, "Debounce timer cancelled");
                true
            }
            None => false,
        }
    }

    /// 立即执行待执行的调用（如果有）
    /// Run the pending call now, if any
    pub fn flush(&self) -> bool {
        let (armed, args) = {
            let mut state = self.state.borrow_mut();
            (state.armed.take(), state.pending.take())
        };

        if let Some(armed) = armed {
            self.scheduler.cancel(armed.handle);
        }
        match args {
            Some(args) => {
                (self.callback.current())(args);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().armed.is_some()
    }

    /// 替换回调，不影响已注册的定时器
    /// Replace the callback without touching the armed timer
    pub fn set_callback<F: Fn(A) + 'static>(&self, callback: F) {
        self.callback.replace(Rc::new(callback));
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn fire(
        state: &Weak<RefCell<DebounceState<A>>>,
        callback: &CallbackCell<dyn Fn(A)>,
        generation: u64,
    ) {
        let Some(state) = state.upgrade() else {
            return;
        };

        let args = {
            let mut state = state.borrow_mut();
            match state.armed {
                Some(armed) if armed.generation == generation => {
                    state.armed = None;
                    state.pending.take()
                }
                _ => None,
            }
        };

        if let Some(args) = args {
            trace!(generation, "Debounce timer fired");
            (callback.current())(args);
        }
    }
}

impl<A: 'static> Drop for Debouncer<A> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// 防抖后的值：`set` 推迟结算，`get` 返回最后一次结算的值。
/// Debounced value: `set` defers settlement, `get` returns the last settled value.
pub struct DebouncedValue<T: Clone + 'static> {
    settled: Rc<watch::Sender<T>>,
    debouncer: Debouncer<T>,
}

impl<T: Clone + 'static> DebouncedValue<T> {
    pub fn new<S: Scheduler + 'static>(scheduler: S, config: DebounceConfig, initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        let settled = Rc::new(tx);

        let sender = settled.clone();
        let debouncer = Debouncer::new(scheduler, config, move |value: T| {
            sender.send_replace(value);
        });

        Self { settled, debouncer }
    }

    pub fn set(&self, value: T) {
        self.debouncer.schedule(value);
    }

    pub fn get(&self) -> T {
        self.settled.borrow().clone()
    }

    /// 订阅结算后的值
    /// Subscribe to settled values
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.settled.subscribe()
    }

    pub fn flush(&self) -> bool {
        self.debouncer.flush()
    }

    pub fn cancel(&self) -> bool {
        self.debouncer.cancel()
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Recorder, init_tracing, ms};
    use crate::timer::ManualScheduler;

    fn debouncer(
        clock: &ManualScheduler,
        delay: u64,
        recorder: &Recorder<&'static str>,
    ) -> Debouncer<&'static str> {
        Debouncer::new(
            clock.clone(),
            DebounceConfig { delay: ms(delay) },
            recorder.callback(),
        )
    }

    #[test]
    fn test_burst_collapses_to_last_value() {
        init_tracing();
        let clock = ManualScheduler::new();
        let recorder = Recorder::new(&clock);
        let debounce = debouncer(&clock, 500, &recorder);

        debounce.schedule("v1");
        clock.advance(ms(100));
        debounce.schedule("v2");
        clock.advance(ms(100));
        debounce.schedule("v3");

        clock.advance(ms(499));
        assert_eq!(recorder.len(), 0);
        assert!(debounce.is_pending());

        clock.advance(ms(1));
        assert_eq!(recorder.calls(), vec![(ms(700), "v3")]);
        assert!(!debounce.is_pending());

        clock.advance(ms(2000));
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_cancel_suppresses_burst() {
        let clock = ManualScheduler::new();
        let recorder = Recorder::new(&clock);
        let debounce = debouncer(&clock, 500, &recorder);

        debounce.schedule("v1");
        clock.advance(ms(200));
        assert!(debounce.cancel());
        assert!(!debounce.cancel());

        clock.advance(ms(800));
        assert_eq!(recorder.len(), 0);
        assert_eq!(clock.pending_timers(), 0);

        // 下一轮正常进行
        debounce.schedule("v2");
        clock.advance(ms(500));
        assert_eq!(recorder.values(), vec!["v2"]);
    }

    #[test]
    fn test_zero_delay_fires_next_turn() {
        let clock = ManualScheduler::new();
        let recorder = Recorder::new(&clock);
        let debounce = debouncer(&clock, 0, &recorder);

        debounce.schedule("now");
        assert_eq!(recorder.len(), 0);

        clock.run_pending();
        assert_eq!(recorder.calls(), vec![(ms(0), "now")]);
    }

    #[test]
    fn test_callback_read_at_fire_time() {
        let clock = ManualScheduler::new();
        let old = Recorder::new(&clock);
        let new = Recorder::new(&clock);
        let debounce = debouncer(&clock, 300, &old);

        debounce.schedule("value");
        clock.advance(ms(100));
        debounce.set_callback(new.callback());

        // 替换回调不会重置计时
        clock.advance(ms(200));
        assert_eq!(old.len(), 0);
        assert_eq!(new.calls(), vec![(ms(300), "value")]);
    }

    #[test]
    fn test_flush_runs_pending_call_once() {
        let clock = ManualScheduler::new();
        let recorder = Recorder::new(&clock);
        let debounce = debouncer(&clock, 300, &recorder);

        assert!(!debounce.flush());
        debounce.schedule("a");
        debounce.schedule("b");
        assert!(debounce.flush());
        assert_eq!(recorder.values(), vec!["b"]);

        clock.advance(ms(1000));
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_drop_cancels_pending_timer() {
        let clock = ManualScheduler::new();
        let recorder = Recorder::new(&clock);
        let debounce = debouncer(&clock, 300, &recorder);

        debounce.schedule("lost");
        drop(debounce);
        assert_eq!(clock.pending_timers(), 0);

        clock.advance(ms(1000));
        assert_eq!(recorder.len(), 0);
    }

    #[test]
    fn test_panicking_callback_leaves_debouncer_usable() {
        let clock = ManualScheduler::new();
        let recorder = Recorder::new(&clock);
        let debounce = Debouncer::new(
            clock.clone(),
            DebounceConfig { delay: ms(100) },
            |_: &'static str| panic!("callback failure"),
        );

        debounce.schedule("boom");
        let result =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| clock.advance(ms(100))));
        assert!(result.is_err());
        assert!(!debounce.is_pending());

        debounce.set_callback(recorder.callback());
        debounce.schedule("ok");
        clock.advance(ms(100));
        assert_eq!(recorder.values(), vec!["ok"]);
    }

    #[test]
    fn test_debounced_value_settles() {
        let clock = ManualScheduler::new();
        let value = DebouncedValue::new(
            clock.clone(),
            DebounceConfig { delay: ms(250) },
            String::new(),
        );
        let mut rx = value.subscribe();

        value.set("ma".to_string());
        clock.advance(ms(100));
        value.set("mail".to_string());
        assert_eq!(value.get(), "");
        assert!(value.is_pending());

        clock.advance(ms(250));
        assert_eq!(value.get(), "mail");
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(*rx.borrow_and_update(), "mail");
    }
}
