//! 倒计时驱动的自动刷新调度器
//! Countdown-driven auto-refresh scheduler
//!
//! 启用后，调度器每秒将剩余秒数减一；归零时调用刷新回调并等待其 future 结算，
//! 然后重新开始完整的倒计时。同一时间最多只有一次刷新在进行。
//!
//! Once enabled, the scheduler decrements the remaining seconds once per
//! second; at zero it calls the refresh callback, awaits its future, and then
//! restarts a full countdown. At most one refresh is in flight at any time.
//!
//! Disabling, marking the data source busy, or dropping the scheduler stops
//! the countdown immediately. Re-entering the countdown always starts from the
//! full interval.

mod refresh;
mod state;

#[cfg(test)]
mod tests;

pub use refresh::{Refresh, RefreshError};
pub use state::{Countdown, PollPhase, PollStats, RefreshTicket};

use crate::callback::CallbackCell;
use crate::config::PollConfig;
use crate::error::{Error, Result};
use crate::timer::{Scheduler, SharedScheduler, TimerHandle, share};
use state::{Effects, PollMachine, TickCommand};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// 节拍周期
/// Tick period
const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
struct ArmedTick {
    handle: TimerHandle,
    generation: u64,
}

/// 倒计时驱动的轮询调度器
/// Countdown-driven poll scheduler
pub struct PollScheduler {
    inner: Rc<PollInner>,
}

struct PollInner {
    scheduler: SharedScheduler,
    machine: RefCell<PollMachine>,
    tick: Cell<Option<ArmedTick>>,
    tick_generation: Cell<u64>,
    refresh: CallbackCell<dyn Refresh>,
    countdown: watch::Sender<Countdown>,
}

impl PollScheduler {
    /// 创建调度器；若配置为启用，倒计时立即开始。
    /// Create the scheduler; counting starts right away when enabled.
    pub fn new<S, R>(scheduler: S, config: PollConfig, refresh: R) -> Result<Self>
    where
        S: Scheduler + 'static,
        R: Refresh + 'static,
    {
        config.validate()?;

        let machine = PollMachine::new(config.interval_secs, config.enabled);
        let (countdown, _rx) = watch::channel(machine.countdown());
        let refresh: Rc<dyn Refresh> = Rc::new(refresh);

        let inner = Rc::new(PollInner {
            scheduler: share(scheduler),
            machine: RefCell::new(machine),
            tick: Cell::new(None),
            tick_generation: Cell::new(0),
            refresh: CallbackCell::new(refresh),
            countdown,
        });

        info!(
            interval_secs = config.interval_secs,
            enabled = config.enabled,
            "Poll scheduler started"
        );
        let effects = inner.machine.borrow_mut().resume();
        PollInner::apply(&inner, effects);

        Ok(Self { inner })
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        debug!(enabled, "Poll scheduler enabled flag changed");
        self.update(|machine| machine.set_enabled(enabled))
    }

    /// 修改倒计时长度；正在倒计时时从新的完整长度重新开始
    /// Change the countdown length; a running countdown restarts at the new full length
    pub fn set_interval(&self, interval_secs: u32) -> Result<()> {
        if interval_secs == 0 {
            return Err(Error::InvalidInterval);
        }
        self.update(|machine| machine.set_interval(interval_secs))
    }

    /// 标记所依赖的操作是否已经在进行中
    /// Mark whether the operation the refresh depends on is already running
    pub fn set_external_busy(&self, busy: bool) -> Result<()> {
        self.update(|machine| machine.set_busy(busy))
    }

    /// 数据源正在加载或重新获取时暂停
    /// Suspend while the data source is loading or refetching
    pub fn set_loading_state(&self, is_loading: bool, is_refetching: bool) -> Result<()> {
        self.set_external_busy(is_loading || is_refetching)
    }

    /// 立即刷新，返回是否真的开始了
    /// Refresh now, returning whether a refresh actually started
    pub fn trigger(&self) -> Result<bool> {
        let mut started = false;
        self.update(|machine| {
            let effects = machine.trigger();
            started = effects.refresh.is_some();
            effects
        })?;
        Ok(started)
    }

    /// 替换刷新回调，下一次刷新生效
    /// Replace the refresh callback; takes effect on the next refresh
    pub fn set_refresh<R: Refresh + 'static>(&self, refresh: R) {
        self.inner.refresh.replace(Rc::new(refresh));
    }

    /// 停止倒计时；之后的操作返回 `Error::ShutDown`
    /// Stop the countdown; later operations return `Error::ShutDown`
    pub fn shutdown(&self) {
        let effects = {
            let mut machine = self.inner.machine.borrow_mut();
            if machine.is_shut_down() {
                return;
            }
            machine.shutdown()
        };
        PollInner::apply(&self.inner, effects);
        info!(stats = %self.inner.machine.borrow().stats(), "Poll scheduler shut down");
    }

    pub fn remaining(&self) -> u32 {
        self.countdown().remaining
    }

    pub fn phase(&self) -> PollPhase {
        self.countdown().phase
    }

    pub fn countdown(&self) -> Countdown {
        self.inner.machine.borrow().countdown()
    }

    /// 订阅倒计时变化，用于显示
    /// Subscribe to countdown changes for display
    pub fn subscribe(&self) -> watch::Receiver<Countdown> {
        self.inner.countdown.subscribe()
    }

    pub fn stats(&self) -> PollStats {
        self.inner.machine.borrow().stats().clone()
    }

    /// 是否有刷新尚未结算
    /// Whether a refresh has not settled yet
    pub fn is_refreshing(&self) -> bool {
        self.inner.machine.borrow().is_guarded()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.machine.borrow().is_enabled()
    }

    pub fn interval_secs(&self) -> u32 {
        self.inner.machine.borrow().interval()
    }

    fn update(&self, f: impl FnOnce(&mut PollMachine) -> Effects) -> Result<()> {
        let effects = {
            let mut machine = self.inner.machine.borrow_mut();
            if machine.is_shut_down() {
                return Err(Error::ShutDown);
            }
            f(&mut machine)
        };
        PollInner::apply(&self.inner, effects);
        Ok(())
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl PollInner {
    fn apply(inner: &Rc<Self>, effects: Effects) {
        match effects.tick {
            TickCommand::Keep => {}
            TickCommand::Cancel => inner.cancel_tick(),
            TickCommand::Arm => {
                inner.cancel_tick();
                Self::arm_tick(inner);
            }
        }
        inner.publish();

        if let Some(ticket) = effects.refresh {
            Self::start_refresh(inner, ticket);
        }
    }

    fn cancel_tick(&self) {
        if let Some(armed) = self.tick.take() {
            self.scheduler.cancel(armed.handle);
        }
    }

    fn arm_tick(inner: &Rc<Self>) {
        let generation = inner.tick_generation.get() + 1;
        inner.tick_generation.set(generation);

        let weak = Rc::downgrade(inner);
        let handle = inner.scheduler.after(
            TICK,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    PollInner::on_tick(&inner, generation);
                }
            }),
        );
        inner.tick.set(Some(ArmedTick { handle, generation }));
    }

    fn on_tick(inner: &Rc<Self>, generation: u64) {
        match inner.tick.get() {
            Some(armed) if armed.generation == generation => inner.tick.set(None),
            _ => return,
        }

        let effects = inner.machine.borrow_mut().tick();
        trace!(countdown = ?inner.machine.borrow().countdown(), "Poll tick");
        Self::apply(inner, effects);
    }

    fn start_refresh(inner: &Rc<Self>, ticket: RefreshTicket) {
        debug!(ticket, "Starting refresh");
        let source = inner.refresh.current();
        let weak = Rc::downgrade(inner);

        inner.scheduler.spawn(Box::pin(async move {
            let outcome = source.refresh().await;
            match weak.upgrade() {
                Some(inner) => PollInner::settle(&inner, ticket, outcome),
                None => trace!(ticket, "Refresh settled after teardown"),
            }
        }));
    }

    fn settle(
        inner: &Rc<Self>,
        ticket: RefreshTicket,
        outcome: std::result::Result<(), RefreshError>,
    ) {
        let failure = match outcome {
            Ok(()) => {
                debug!(ticket, "Refresh settled");
                None
            }
            Err(err) => {
                warn!(ticket, error = %err, "Refresh failed");
                Some(Error::Refresh(err.to_string()))
            }
        };

        let effects = inner.machine.borrow_mut().settle(ticket, failure);
        Self::apply(inner, effects);
    }

    fn publish(&self) {
        let countdown = self.machine.borrow().countdown();
        self.countdown.send_if_modified(|current| {
            if *current == countdown {
                return false;
            }
            *current = countdown;
            true
        });
    }
}
