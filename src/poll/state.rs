//! 轮询调度器状态机
//! Poll scheduler state machine
//!
//! 状态机不接触时间，只返回驱动层需要执行的副作用（注册/取消节拍、开始刷新）。
//! 重入保护是状态的一部分：它记录正在进行的刷新票据，只有该票据结算时才会清除。
//!
//! The machine never touches time; it returns the effects the driver has to
//! perform (arm or cancel the tick, start a refresh). The re-entrancy guard is
//! part of the state: it records the ticket of the refresh in flight and is
//! cleared only when that ticket settles.

use crate::error::Error;

/// 刷新票据，每次刷新唯一
/// Refresh ticket, unique per refresh
pub type RefreshTicket = u64;

/// 对外可见的阶段
/// Externally visible phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Counting,
    Refreshing,
}

/// 可观察的倒计时状态
/// Observable countdown state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    /// 距下一次刷新的剩余秒数
    /// Seconds left until the next refresh
    pub remaining: u32,
    pub phase: PollPhase,
}

/// 轮询统计信息
/// Poll statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
    /// 处理过的节拍数
    /// Ticks processed
    pub ticks: u64,
    /// 已开始的刷新数
    /// Refreshes started
    pub refreshes_started: u64,
    /// 成功结算的刷新数
    /// Refreshes settled successfully
    pub refreshes_succeeded: u64,
    /// 失败结算的刷新数
    /// Refreshes settled with a failure
    pub refreshes_failed: u64,
    /// 因上一次刷新仍在进行而被吸收的归零次数
    /// Zero crossings absorbed because a refresh was still in flight
    pub absorbed: u64,
    /// 最近一次失败
    /// Most recent failure
    pub last_error: Option<Error>,
}

impl std::fmt::Display for PollStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PollStats {{ ticks: {}, started: {}, succeeded: {}, failed: {}, absorbed: {} }}",
            self.ticks,
            self.refreshes_started,
            self.refreshes_succeeded,
            self.refreshes_failed,
            self.absorbed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Counting(u32),
    Refreshing,
}

/// 重入保护
/// Re-entrancy guard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ReentrancyGuard {
    in_flight: Option<RefreshTicket>,
}

impl ReentrancyGuard {
    pub(crate) fn is_set(&self) -> bool {
        self.in_flight.is_some()
    }

    /// 仅在未被占用时获取
    /// Acquire only when clear
    pub(crate) fn acquire(&mut self, ticket: RefreshTicket) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        self.in_flight = Some(ticket);
        true
    }

    /// 仅由持有者释放
    /// Release only by the holder
    pub(crate) fn release(&mut self, ticket: RefreshTicket) -> bool {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }
}

/// 节拍定时器指令
/// Tick timer command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickCommand {
    Keep,
    /// 取消旧节拍并注册一个完整的新节拍
    /// Cancel any old tick and arm a full new one
    Arm,
    Cancel,
}

/// 驱动层需要执行的副作用
/// Effects the driver must perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Effects {
    pub(crate) tick: TickCommand,
    pub(crate) refresh: Option<RefreshTicket>,
}

impl Effects {
    pub(crate) const NONE: Effects = Effects {
        tick: TickCommand::Keep,
        refresh: None,
    };

    fn tick(tick: TickCommand) -> Self {
        Self {
            tick,
            refresh: None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct PollMachine {
    interval: u32,
    enabled: bool,
    busy: bool,
    phase: Phase,
    guard: ReentrancyGuard,
    next_ticket: RefreshTicket,
    shut_down: bool,
    stats: PollStats,
}

impl PollMachine {
    pub(crate) fn new(interval: u32, enabled: bool) -> Self {
        Self {
            interval,
            enabled,
            busy: false,
            phase: Phase::Idle,
            guard: ReentrancyGuard::default(),
            next_ticket: 1,
            shut_down: false,
            stats: PollStats::default(),
        }
    }

    /// 满足条件时从 Idle 进入完整的倒计时
    /// Enter a full countdown from Idle when allowed
    pub(crate) fn resume(&mut self) -> Effects {
        if self.shut_down || !self.enabled || self.busy || self.phase != Phase::Idle {
            return Effects::NONE;
        }
        self.phase = Phase::Counting(self.interval);
        Effects::tick(TickCommand::Arm)
    }

    fn suspend(&mut self) -> Effects {
        if self.phase == Phase::Idle {
            return Effects::NONE;
        }
        self.phase = Phase::Idle;
        Effects::tick(TickCommand::Cancel)
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) -> Effects {
        if self.enabled == enabled {
            return Effects::NONE;
        }
        self.enabled = enabled;
        if enabled { self.resume() } else { self.suspend() }
    }

    pub(crate) fn set_busy(&mut self, busy: bool) -> Effects {
        if self.busy == busy {
            return Effects::NONE;
        }
        self.busy = busy;
        if busy { self.suspend() } else { self.resume() }
    }

    pub(crate) fn set_interval(&mut self, interval: u32) -> Effects {
        if self.interval == interval {
            return Effects::NONE;
        }
        self.interval = interval;
        match self.phase {
            Phase::Counting(_) => {
                self.phase = Phase::Counting(interval);
                Effects::tick(TickCommand::Arm)
            }
            _ => Effects::NONE,
        }
    }

    /// 一秒节拍
    /// One-second tick
    pub(crate) fn tick(&mut self) -> Effects {
        let Phase::Counting(remaining) = self.phase else {
            return Effects::NONE;
        };
        self.stats.ticks += 1;

        let remaining = remaining.saturating_sub(1);
        if remaining > 0 {
            self.phase = Phase::Counting(remaining);
            return Effects::tick(TickCommand::Arm);
        }

        if self.guard.is_set() {
            // 上一次刷新仍未结算：吸收这次归零
            self.stats.absorbed += 1;
            self.phase = Phase::Counting(self.interval);
            return Effects::tick(TickCommand::Arm);
        }
        self.start_refresh()
    }

    /// 手动刷新，被占用或外部忙碌时不执行
    /// Manual refresh; refused while guarded or externally busy
    pub(crate) fn trigger(&mut self) -> Effects {
        if self.shut_down || self.busy || self.guard.is_set() {
            return Effects::NONE;
        }
        self.start_refresh()
    }

    fn start_refresh(&mut self) -> Effects {
        let ticket = self.next_ticket;
        if !self.guard.acquire(ticket) {
            return Effects::NONE;
        }
        self.next_ticket += 1;
        self.phase = Phase::Refreshing;
        self.stats.refreshes_started += 1;
        Effects {
            tick: TickCommand::Cancel,
            refresh: Some(ticket),
        }
    }

    /// 刷新结算（成功或失败）
    /// A refresh settled, successfully or not
    pub(crate) fn settle(&mut self, ticket: RefreshTicket, failure: Option<Error>) -> Effects {
        if !self.guard.release(ticket) {
            return Effects::NONE;
        }
        match failure {
            Some(err) => {
                self.stats.refreshes_failed += 1;
                self.stats.last_error = Some(err);
            }
            None => self.stats.refreshes_succeeded += 1,
        }

        if self.shut_down {
            return Effects::NONE;
        }
        match self.phase {
            Phase::Refreshing => {
                self.phase = Phase::Idle;
                self.resume()
            }
            // 结算前开始的倒计时已过时，从完整间隔重新开始
            Phase::Counting(_) => {
                self.phase = Phase::Counting(self.interval);
                Effects::tick(TickCommand::Arm)
            }
            Phase::Idle => Effects::NONE,
        }
    }

    pub(crate) fn shutdown(&mut self) -> Effects {
        self.shut_down = true;
        self.phase = Phase::Idle;
        Effects::tick(TickCommand::Cancel)
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub(crate) fn is_guarded(&self) -> bool {
        self.guard.is_set()
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn interval(&self) -> u32 {
        self.interval
    }

    pub(crate) fn stats(&self) -> &PollStats {
        &self.stats
    }

    pub(crate) fn countdown(&self) -> Countdown {
        match self.phase {
            Phase::Idle => Countdown {
                remaining: self.interval,
                phase: PollPhase::Idle,
            },
            Phase::Counting(remaining) => Countdown {
                remaining,
                phase: PollPhase::Counting,
            },
            Phase::Refreshing => Countdown {
                remaining: 0,
                phase: PollPhase::Refreshing,
            },
        }
    }
}
