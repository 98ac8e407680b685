//! 基于 tokio 的本地调度器
//! Tokio-backed local scheduler
//!
//! Every deferred task is a `spawn_local`ed sleep until its deadline, so the
//! scheduler must be used from inside a `tokio::task::LocalSet`. The deadline
//! is fixed when `after` is called. Cancellation aborts the sleeping
//! task and also removes it from the live set; a task that wakes after being
//! cancelled finds itself missing and does nothing.

use super::Scheduler;
use super::entry::{Task, TimerEntryId, TimerHandle};
use futures::future::LocalBoxFuture;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{Instant, sleep_until};
use tracing::trace;

/// 在 `LocalSet` 上运行真实定时器的调度器
/// Scheduler running real timers on a `LocalSet`
#[derive(Clone, Default)]
pub struct LocalScheduler {
    inner: Rc<LocalInner>,
}

#[derive(Default)]
struct LocalInner {
    /// 存活的定时器任务
    /// Live timer tasks
    tasks: RefCell<HashMap<TimerEntryId, AbortHandle>>,
    next_entry_id: Cell<TimerEntryId>,
}

impl LocalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尚未触发的定时器数量
    /// Number of timers that have not fired yet
    pub fn pending_timers(&self) -> usize {
        self.inner.tasks.borrow().len()
    }
}

impl Scheduler for LocalScheduler {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn after(&self, delay: Duration, task: Task) -> TimerHandle {
        let id = self.inner.next_entry_id.get() + 1;
        self.inner.next_entry_id.set(id);

        // 截止时间从注册时刻算起，而不是从任务第一次被轮询时
        let deadline = Instant::now() + delay;
        let weak = Rc::downgrade(&self.inner);
        let join = tokio::task::spawn_local(async move {
            sleep_until(deadline).await;

            let Some(inner) = weak.upgrade() else {
                return;
            };
            let live = inner.tasks.borrow_mut().remove(&id).is_some();
            drop(inner);

            if live {
                trace!(entry_id = id, "Firing local timer");
                task();
            }
        });

        self.inner.tasks.borrow_mut().insert(id, join.abort_handle());
        TimerHandle::new(id)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        match self.inner.tasks.borrow_mut().remove(&handle.id()) {
            Some(abort) => {
                abort.abort();
                trace!(entry_id = handle.id(), "Cancelled local timer");
                true
            }
            None => false,
        }
    }

    fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
        tokio::task::spawn_local(future);
    }
}

impl Drop for LocalInner {
    fn drop(&mut self) {
        for (_, abort) in self.tasks.get_mut().drain() {
            abort.abort();
        }
    }
}
