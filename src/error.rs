//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use thiserror::Error;

/// The primary error type for the scheduling primitives.
/// 调度原语的主要错误类型。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A configuration value was rejected at construction or reconfiguration.
    /// 配置值在构造或重新配置时被拒绝。
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The poll interval must be a positive number of seconds.
    /// 轮询间隔必须是正的秒数。
    #[error("poll interval must be at least one second")]
    InvalidInterval,

    /// The operation targeted a poll scheduler that has been shut down.
    /// 操作针对的轮询调度器已经关闭。
    #[error("poll scheduler has been shut down")]
    ShutDown,

    /// A refresh operation settled with a failure.
    /// 刷新操作以失败结束。
    #[error("refresh failed: {0}")]
    Refresh(String),
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;
