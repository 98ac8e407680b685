//! 按到期时间排序的定时器队列
//! Deadline-ordered timer queue
//!
//! 队列按 `(到期时间, 条目ID)` 排序，因此同一时刻到期的定时器按注册顺序触发。
//!
//! The queue is ordered by `(expiry_time, entry_id)`, so timers that expire at
//! the same instant fire in registration order.

use super::entry::{Task, TimerEntry, TimerEntryId, TimerHandle};
use std::collections::{BTreeMap, HashMap};
use tokio::time::Instant;
use tracing::trace;

/// 定时器队列
/// Timer queue
pub struct TimerQueue {
    /// 按到期时间排序的条目
    /// Entries ordered by expiry
    entries: BTreeMap<(Instant, TimerEntryId), Task>,
    /// 条目ID到到期时间的映射，用于O(log n)取消
    /// Entry ID to expiry mapping for O(log n) cancellation
    timer_map: HashMap<TimerEntryId, Instant>,
    /// 下一个分配的定时器条目ID
    /// Next timer entry ID to allocate
    next_entry_id: TimerEntryId,
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerQueue {
    /// 创建空队列
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            timer_map: HashMap::new(),
            next_entry_id: 1,
        }
    }

    /// 插入一个在 `expiry_time` 到期的任务
    /// Insert a task expiring at `expiry_time`
    pub fn insert(&mut self, expiry_time: Instant, task: Task) -> TimerHandle {
        let id = self.next_entry_id;
        self.next_entry_id += 1;

        self.entries.insert((expiry_time, id), task);
        self.timer_map.insert(id, expiry_time);

        trace!(entry_id = id, "Inserted timer into queue");
        TimerHandle::new(id)
    }

    /// 取消定时器，返回它是否仍在队列中
    /// Cancel a timer, returning whether it was still queued
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let id = handle.id();
        match self.timer_map.remove(&id) {
            Some(expiry_time) => {
                self.entries.remove(&(expiry_time, id));
                trace!(entry_id = id, "Cancelled queued timer");
                true
            }
            None => false,
        }
    }

    /// 最早的到期时间
    /// Earliest expiry time
    pub fn next_expiry(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(expiry, _)| *expiry)
    }

    /// 弹出最早的一个已到期条目（到期时间 <= `now`）
    /// Pop the earliest entry whose expiry is at or before `now`
    pub fn pop_expired(&mut self, now: Instant) -> Option<TimerEntry> {
        let (&(expiry_time, id), _) = self.entries.first_key_value()?;
        if expiry_time > now {
            return None;
        }
        let task = self.entries.remove(&(expiry_time, id))?;
        self.timer_map.remove(&id);
        Some(TimerEntry::new(id, expiry_time, task))
    }

    /// 队列中的定时器数量
    /// Number of queued timers
    pub fn len(&self) -> usize {
        self.timer_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timer_map.is_empty()
    }
}
