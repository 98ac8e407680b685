//! 定时器调度抽象
//! Timer scheduling abstraction
//!
//! 所有原语都通过 `Scheduler` trait 访问时间：延迟执行任务、取消任务、读取当前时间
//! 以及派生本地 future。这样测试可以注入确定性的虚拟时钟，而生产代码使用 tokio 定时器。
//!
//! Every primitive reaches time through the `Scheduler` trait: defer a task,
//! cancel it, read the clock, and spawn a local future. Tests inject the
//! deterministic virtual clock while production code runs on tokio timers.
//!
//! Schedulers are single-threaded. A task passed to `after` never runs
//! synchronously inside that call, and a cancelled handle never runs at all.

mod entry;
mod local;
mod manual;
mod queue;


pub use entry::{Task, TimerEntry, TimerEntryId, TimerHandle};
pub use local::LocalScheduler;
pub use manual::ManualScheduler;
pub use queue::TimerQueue;

use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::Instant;

/// 单线程定时器设施
/// Single-threaded timer facility
pub trait Scheduler {
    /// 当前时间
    /// Current time
    fn now(&self) -> Instant;

    /// 在 `delay` 之后执行 `task`。延迟是下限，实际触发可能更晚但绝不会更早。
    /// Run `task` after `delay`. The delay is a lower bound: the task may fire
    /// later, never earlier.
    fn after(&self, delay: Duration, task: Task) -> TimerHandle;

    /// 取消尚未触发的任务，返回任务是否仍处于待执行状态
    /// Cancel a pending task, returning whether it was still pending
    fn cancel(&self, handle: TimerHandle) -> bool;

    /// 在同一线程上派生一个 future
    /// Spawn a future on the same thread
    fn spawn(&self, future: LocalBoxFuture<'static, ()>);
}

/// 原语实例共享的调度器引用
/// Scheduler reference shared by primitive instances
pub type SharedScheduler = Rc<dyn Scheduler>;

impl<S: Scheduler + ?Sized> Scheduler for Rc<S> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn after(&self, delay: Duration, task: Task) -> TimerHandle {
        (**self).after(delay, task)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        (**self).cancel(handle)
    }

    fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
        (**self).spawn(future)
    }
}

/// 将调度器转换为共享引用
/// Convert a scheduler into a shared reference
pub(crate) fn share<S: Scheduler + 'static>(scheduler: S) -> SharedScheduler {
    Rc::new(scheduler)
}
