//! 虚拟时钟调度器
//! Virtual-clock scheduler
//!
//! `ManualScheduler` 从不自行推进时间：调用者通过 `advance` 显式驱动时钟，
//! 到期的任务按到期顺序在调用线程上同步执行。派生的 future 由本地执行器在
//! 每个任务之后推进，直到再也无法取得进展。
//!
//! `ManualScheduler` never moves time on its own: the caller drives the clock
//! through `advance`, and expired tasks run synchronously on the calling
//! thread in deadline order. Spawned futures are driven on a local executor
//! after every task until they stall.

use super::Scheduler;
use super::entry::{Task, TimerHandle};
use super::queue::TimerQueue;
use futures::channel::oneshot;
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{trace, warn};

/// 确定性的虚拟时钟调度器。克隆共享同一个时钟。
/// Deterministic virtual-clock scheduler. Clones share one clock.
#[derive(Clone)]
pub struct ManualScheduler {
    inner: Rc<ManualInner>,
}

struct ManualInner {
    start: Instant,
    now: Cell<Instant>,
    queue: RefCell<TimerQueue>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

impl ManualScheduler {
    /// 创建一个时钟停在当前时刻的调度器
    /// Create a scheduler whose clock is frozen at the current instant
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        let start = Instant::now();

        Self {
            inner: Rc::new(ManualInner {
                start,
                now: Cell::new(start),
                queue: RefCell::new(TimerQueue::new()),
                pool: RefCell::new(pool),
                spawner,
            }),
        }
    }

    /// 自创建以来经过的虚拟时间
    /// Virtual time elapsed since creation
    pub fn elapsed(&self) -> Duration {
        self.inner.now.get() - self.inner.start
    }

    /// 尚未触发的定时器数量
    /// Number of timers that have not fired yet
    pub fn pending_timers(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// 将时钟推进 `by`，返回触发的任务数。
    /// Advance the clock by `by`, returning the number of tasks fired.
    pub fn advance(&self, by: Duration) -> usize {
        self.advance_to(self.inner.now.get() + by)
    }

    /// 将时钟推进到 `target`（不会倒退）。
    /// Advance the clock to `target` (never backwards).
    ///
    /// Each expired task sees `now()` equal to its own deadline, and tasks
    /// armed while advancing are fired in the same call if they fall due
    /// before `target`.
    pub fn advance_to(&self, target: Instant) -> usize {
        let mut fired = 0;
        self.drive_futures();

        loop {
            // 不要在执行任务时持有队列借用，任务可能会重新注册定时器
            let entry = self.inner.queue.borrow_mut().pop_expired(target);
            let Some(entry) = entry else {
                break;
            };

            if entry.expiry_time > self.inner.now.get() {
                self.inner.now.set(entry.expiry_time);
            }
            trace!(entry_id = entry.id, elapsed = ?self.elapsed(), "Firing virtual timer");
            (entry.task)();
            fired += 1;
            self.drive_futures();
        }

        if target > self.inner.now.get() {
            self.inner.now.set(target);
        }
        fired
    }

    /// 触发所有已到期的任务而不推进时钟
    /// Fire everything already due without moving the clock
    pub fn run_pending(&self) -> usize {
        self.advance(Duration::ZERO)
    }

    /// 在虚拟时间 `delay` 之后完成的 future
    /// A future completing after `delay` of virtual time
    pub fn sleep(&self, delay: Duration) -> impl Future<Output = ()> + use<> {
        let (tx, rx) = oneshot::channel::<()>();
        self.after(
            delay,
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        async move {
            let _ = rx.await;
        }
    }

    fn drive_futures(&self) {
        match self.inner.pool.try_borrow_mut() {
            Ok(mut pool) => pool.run_until_stalled(),
            Err(_) => trace!("Local pool already running, skipping nested drive"),
        }
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Instant {
        self.inner.now.get()
    }

    fn after(&self, delay: Duration, task: Task) -> TimerHandle {
        let expiry_time = self.inner.now.get() + delay;
        self.inner.queue.borrow_mut().insert(expiry_time, task)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        self.inner.queue.borrow_mut().cancel(handle)
    }

    fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
        if let Err(err) = self.inner.spawner.spawn_local(future) {
            warn!(error = ?err, "Failed to spawn future on virtual scheduler");
        }
    }
}
