//! 定时器条目与句柄
//! Timer entries and handles

use std::fmt;
use tokio::time::Instant;

/// 定时器条目ID，由调度器单调分配
/// Timer entry ID, allocated monotonically by a scheduler
pub type TimerEntryId = u64;

/// 延迟执行的任务
/// A deferred task
pub type Task = Box<dyn FnOnce() + 'static>;

/// 一个待执行延迟任务的不透明句柄。
/// An opaque handle to a pending deferred task.
///
/// Handles are only meaningful to the scheduler that issued them. A handle
/// that has fired or been cancelled is simply unknown to the scheduler, so
/// cancelling it again is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(TimerEntryId);

impl TimerHandle {
    pub(crate) fn new(id: TimerEntryId) -> Self {
        Self(id)
    }

    /// 句柄对应的条目ID
    /// Entry ID behind this handle
    pub fn id(&self) -> TimerEntryId {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// 定时器队列中的条目
/// Entry in the timer queue
pub struct TimerEntry {
    /// 条目ID
    /// Entry ID
    pub id: TimerEntryId,
    /// 到期时间
    /// Expiration time
    pub expiry_time: Instant,
    /// 到期时执行的任务
    /// Task to run on expiry
    pub task: Task,
}

impl TimerEntry {
    /// 创建新的定时器条目
    /// Create new timer entry
    pub fn new(id: TimerEntryId, expiry_time: Instant, task: Task) -> Self {
        Self {
            id,
            expiry_time,
            task,
        }
    }
}

impl fmt::Debug for TimerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEntry")
            .field("id", &self.id)
            .field("expiry_time", &self.expiry_time)
            .field("task", &"<task>")
            .finish()
    }
}
