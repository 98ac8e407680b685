//! 刷新回调
//! Refresh callback

use async_trait::async_trait;
use std::future::Future;

/// 刷新失败时由调用者返回的错误
/// Error returned by the caller when a refresh fails
pub type RefreshError = Box<dyn std::error::Error + 'static>;

/// 轮询调度器在倒计时归零时调用的异步操作
/// Asynchronous operation the poll scheduler runs when the countdown hits zero
#[async_trait(?Send)]
pub trait Refresh {
    /// 执行一次刷新。无论成功与否，返回的 future 结算后调度器才会恢复倒计时。
    /// Run one refresh. The scheduler resumes counting only once the returned
    /// future settles, whatever the outcome.
    async fn refresh(&self) -> Result<(), RefreshError>;
}

#[async_trait(?Send)]
impl<F, Fut> Refresh for F
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<(), RefreshError>> + 'static,
{
    async fn refresh(&self) -> Result<(), RefreshError> {
        (self)().await
    }
}
