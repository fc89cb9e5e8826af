//! 重试机制
//!
//! 指数退避；是否重试由调用方按错误种类决定

use std::future::Future;
use std::time::Duration;

use pcbook_errors::{AppError, AppResult};
use tracing::{info, warn};

/// 重试配置
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 最大尝试次数（含第一次）
    pub max_attempts: u32,
    /// 初始延迟
    pub initial_delay: Duration,
    /// 最大延迟
    pub max_delay: Duration,
    /// 退避乘数
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
            multiplier: 2.0,
        }
    }

    /// 计算第 n 次重试的延迟
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped_delay = (delay_ms as u64).min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped_delay)
    }
}

/// 传输层失败（连接中断、服务端内部错误）值得重试；
/// 凭证错误、参数错误等确定性失败重试也无济于事
pub fn is_transient(error: &AppError) -> bool {
    matches!(error, AppError::Internal(_) | AppError::DeadlineExceeded(_))
}

/// 带重试的异步操作执行器
///
/// 只有 `should_retry` 返回 true 的错误才会重试，否则立即返回
pub async fn with_retry<F, Fut, T, P>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    should_retry: P,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
    P: Fn(&AppError) -> bool,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                let is_last_attempt = attempt + 1 >= config.max_attempts;

                if is_last_attempt || !should_retry(&e) {
                    warn!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_attempts = config.max_attempts,
                        error = %e,
                        "Operation failed, giving up"
                    );
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_attempts = config.max_attempts,
                    error = %e,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
