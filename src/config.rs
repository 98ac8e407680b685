//! 定义了各调度原语的可配置参数。
//! Defines configurable parameters for the scheduling primitives.

use crate::adapter::ButtonKind;
use crate::error::{Error, Result};
use std::time::Duration;

/// A structure grouping the default configuration of every primitive.
///
/// 汇总所有原语默认配置的结构体。
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Debounce parameters.
    /// 防抖参数。
    pub debounce: DebounceConfig,

    /// Throttle parameters.
    /// 节流参数。
    pub throttle: ThrottleConfig,

    /// Poll scheduler parameters.
    /// 轮询调度器参数。
    pub poll: PollConfig,

    /// Input adapter parameters.
    /// 输入适配器参数。
    pub input: InputConfig,

    /// Button adapter parameters.
    /// 按钮适配器参数。
    pub button: ButtonConfig,
}

impl Config {
    /// Validates every section.
    /// 校验所有部分。
    pub fn validate(&self) -> Result<()> {
        self.throttle.validate()?;
        self.poll.validate()?;
        self.button.validate()
    }
}

/// Debounce parameters.
///
/// 防抖参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    /// The quiet period that must elapse after the last call before the
    /// callback fires. Zero defers to the next scheduler turn.
    /// 最后一次调用后回调触发前必须经过的静默期。零表示推迟到调度器的下一轮。
    pub delay: Duration,
}

/// Throttle parameters.
///
/// 节流参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// The window length. At most one firing happens per window; zero
    /// disables throttling.
    /// 窗口长度。每个窗口最多触发一次；零表示不节流。
    pub delay: Duration,
    /// Fire immediately on the first call of a window.
    /// 在窗口的第一次调用时立即触发。
    pub leading: bool,
    /// Fire once more when the window closes, with the latest arguments.
    /// 窗口结束时使用最新参数再触发一次。
    pub trailing: bool,
}

impl ThrottleConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.leading && !self.trailing {
            return Err(Error::InvalidConfig(
                "throttle needs at least one of leading or trailing",
            ));
        }
        Ok(())
    }
}

/// Poll scheduler parameters.
///
/// 轮询调度器参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// The countdown length in seconds. Must be positive.
    /// 倒计时长度（秒）。必须为正数。
    pub interval_secs: u32,
    /// Whether the countdown runs at all.
    /// 倒计时是否运行。
    pub enabled: bool,
}

impl PollConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(Error::InvalidInterval);
        }
        Ok(())
    }
}

/// Input adapter parameters.
///
/// 输入适配器参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputConfig {
    /// Debounce delay for the change handler (uncontrolled) or the side
    /// effect (controlled).
    /// 变更处理器（非受控）或副作用（受控）的防抖延迟。
    pub delay: Duration,
    /// Set when the caller owns the field's value and keeps it in sync.
    /// Controlled fields propagate every change synchronously.
    ///
    /// 当调用者拥有字段值并保持同步时设置。受控字段同步传播每一次变更。
    pub controlled: bool,
}

/// Button adapter parameters.
///
/// 按钮适配器参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonConfig {
    /// Throttle applied to clicks of plain, enabled buttons.
    /// 应用于普通启用按钮点击的节流。
    pub throttle: ThrottleConfig,
    /// Submit buttons are never throttled.
    /// 提交按钮从不节流。
    pub kind: ButtonKind,
    /// Disabled buttons pass clicks straight through.
    /// 禁用按钮直接透传点击。
    pub disabled: bool,
}

impl ButtonConfig {
    pub fn validate(&self) -> Result<()> {
        self.throttle.validate()
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(300),
            leading: true,
            trailing: true,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            enabled: false,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
            controlled: false,
        }
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            // A trailing click replayed a second later reads as a phantom press.
            throttle: ThrottleConfig {
                delay: Duration::from_millis(1000),
                leading: true,
                trailing: false,
            },
            kind: ButtonKind::Button,
            disabled: false,
        }
    }
}
