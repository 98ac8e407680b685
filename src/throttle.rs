//! 节流原语
//! Throttle primitive
//!
//! 每个窗口最多触发一次。窗口内的第一次调用（前沿）立即触发；窗口内后续的调用
//! 只保留最新的参数，并在窗口结束时作为一次尾部调用触发。
//!
//! At most one firing per window. The first call of a window (leading edge)
//! fires immediately; later calls inside the window only keep the newest
//! arguments, which fire once as a trailing call when the window closes.

use crate::callback::CallbackCell;
use crate::config::ThrottleConfig;
use crate::error::Result;
use crate::timer::{Scheduler, SharedScheduler, TimerHandle, share};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// 一次 `invoke` 的结果
/// Outcome of one `invoke`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// 回调已立即执行
    /// The callback ran immediately
    Fired,
    /// 参数被保存为待执行的尾部调用
    /// The arguments became the pending trailing call
    Deferred,
    /// 调用落在窗口内且尾沿被禁用
    /// The call fell inside the window with the trailing edge disabled
    Dropped,
}

/// 待执行的尾部调用
/// Pending trailing call
struct Trailing<A> {
    handle: TimerHandle,
    generation: u64,
    deadline: Instant,
    args: A,
}

struct ThrottleState<A> {
    last_fired: Option<Instant>,
    trailing: Option<Trailing<A>>,
    generation: u64,
}

enum Plan<A> {
    Fire(A),
    Arm(Duration, A),
    Overdue(TimerHandle, A),
    Merged,
    Discard,
}

/// 前沿 + 尾沿节流器
/// Leading + trailing edge throttler
pub struct Throttler<A: 'static> {
    scheduler: SharedScheduler,
    config: ThrottleConfig,
    callback: CallbackCell<dyn Fn(A)>,
    state: Rc<RefCell<ThrottleState<A>>>,
}

impl<A: 'static> Throttler<A> {
    pub fn new<S, F>(scheduler: S, config: ThrottleConfig, callback: F) -> Result<Self>
    where
        S: Scheduler + 'static,
        F: Fn(A) + 'static,
    {
        config.validate()?;

        let callback: Rc<dyn Fn(A)> = Rc::new(callback);
        Ok(Self {
            scheduler: share(scheduler),
            config,
            callback: CallbackCell::new(callback),
            state: Rc::new(RefCell::new(ThrottleState {
                last_fired: None,
                trailing: None,
                generation: 0,
            })),
        })
    }

    /// 请求一次调用
    /// Request an invocation
    pub fn invoke(&self, args: A) -> Invocation {
        let now = self.scheduler.now();
        let delay = self.config.delay;

        let plan = {
            let mut state = self.state.borrow_mut();

            if delay.is_zero() {
                state.last_fired = Some(now);
                Plan::Fire(args)
            } else if let Some(trailing) = state.trailing.as_mut() {
                if now >= trailing.deadline {
                    // 尾部定时器迟到：窗口已经结束，立即以最新参数触发
                    let handle = trailing.handle;
                    state.trailing = None;
                    state.last_fired = Some(now);
                    Plan::Overdue(handle, args)
                } else {
                    // 后写者胜出
                    trailing.args = args;
                    Plan::Merged
                }
            } else {
                let elapsed = state.last_fired.map(|t| now.saturating_duration_since(t));
                match elapsed {
                    Some(elapsed) if elapsed < delay => {
                        if self.config.trailing {
                            Plan::Arm(delay - elapsed, args)
                        } else {
                            Plan::Discard
                        }
                    }
                    _ if self.config.leading => {
                        state.last_fired = Some(now);
                        Plan::Fire(args)
                    }
                    _ => Plan::Arm(delay, args),
                }
            }
        };

        match plan {
            Plan::Fire(args) => {
                trace!("Throttle fired on leading edge");
                (self.callback.current())(args);
                Invocation::Fired
            }
            Plan::Arm(wait, args) => {
                self.arm(wait, args);
                Invocation::Deferred
            }
            Plan::Overdue(handle, args) => {
                self.scheduler.cancel(handle);
                trace!(handle = %handle, "Overdue trailing call fired on invoke");
                (self.callback.current())(args);
                Invocation::Fired
            }
            Plan::Merged => Invocation::Deferred,
            Plan::Discard => Invocation::Dropped,
        }
    }

    /// 丢弃待执行的尾部调用，返回是否存在
    /// Discard the pending trailing call, returning whether there was one
    pub fn cancel(&self) -> bool {
        let trailing = self.state.borrow_mut().trailing.take();
        match trailing {
            Some(trailing) => {
                self.scheduler.cancel(trailing.handle);
                trace!(handle = %trailing.handle, "Throttle trailing call cancelled");
                true
            }
            None => false,
        }
    }

    /// 取消待执行的调用并清除窗口，下一次调用将视为新窗口的前沿
    /// Cancel the pending call and forget the window; the next call is a fresh leading edge
    pub fn reset(&self) {
        self.cancel();
        self.state.borrow_mut().last_fired = None;
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().trailing.is_some()
    }

    pub fn last_fired(&self) -> Option<Instant> {
        self.state.borrow().last_fired
    }

    pub fn set_callback<F: Fn(A) + 'static>(&self, callback: F) {
        self.callback.replace(Rc::new(callback));
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    fn arm(&self, wait: Duration, args: A) {
        let generation = {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            state.generation
        };

        let state = Rc::downgrade(&self.state);
        let scheduler = Rc::downgrade(&self.scheduler);
        let callback = self.callback.clone();
        let handle = self.scheduler.after(
            wait,
            Box::new(move || Self::fire_trailing(&state, &scheduler, &callback, generation)),
        );
        trace!(handle = %handle, wait = ?wait, "Throttle trailing call armed");

        self.state.borrow_mut().trailing = Some(Trailing {
            handle,
            generation,
            deadline: self.scheduler.now() + wait,
            args,
        });
    }

    fn fire_trailing(
        state: &Weak<RefCell<ThrottleState<A>>>,
        scheduler: &Weak<dyn Scheduler>,
        callback: &CallbackCell<dyn Fn(A)>,
        generation: u64,
    ) {
        let (Some(state), Some(scheduler)) = (state.upgrade(), scheduler.upgrade()) else {
            return;
        };

        let args = {
            let mut state = state.borrow_mut();
            match state.trailing.take() {
                Some(trailing) if trailing.generation == generation => {
                    state.last_fired = Some(scheduler.now());
                    Some(trailing.args)
                }
                other => {
                    state.trailing = other;
                    None
                }
            }
        };

        if let Some(args) = args {
            trace!(generation, "Throttle fired on trailing edge");
            (callback.current())(args);
        }
    }
}

impl<A: 'static> Drop for Throttler<A> {
    fn drop(&mut self) {
        self.cancel();
    }
}
