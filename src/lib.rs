#![deny(clippy::expect_used, clippy::unwrap_used)]

//! 单线程 UI 事件的时间控制原语：防抖、节流以及倒计时驱动的轮询调度器。
//! Timing primitives for single-threaded UI events: debounce, throttle, and a
//! countdown-driven poll scheduler.

pub mod adapter;
pub mod callback;
pub mod config;
pub mod debounce;
pub mod error;
pub mod poll;
pub mod throttle;
pub mod timer;

mod testing;

pub use config::Config;
pub use debounce::{DebouncedValue, Debouncer};
pub use error::{Error, Result};
pub use poll::{Countdown, PollPhase, PollScheduler, Refresh, RefreshError};
pub use throttle::{Invocation, Throttler};
pub use timer::{LocalScheduler, ManualScheduler, Scheduler};
