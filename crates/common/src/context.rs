//! 调用上下文
//!
//! 每个 RPC 调用对应一个上下文：截止时间取自 `grpc-timeout` 元数据，
//! 取消信号由处理器在对端断开时触发。所有接收 / 发送挂起点都经由
//! [`CallContext::guard`]，保证在一次迭代内感知取消或超时。

use std::future::Future;
use std::time::Duration;

use pcbook_errors::{AppError, AppResult};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;
use tracing::debug;

/// gRPC 超时元数据键
pub const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// 处理器截止时间相对 `grpc-timeout` 的提前量上限
///
/// 传输层在同一时刻以 Cancelled 结束调用，处理器必须先于它返回 DeadlineExceeded。
pub const DEADLINE_MARGIN: Duration = Duration::from_millis(50);

/// 单次调用的生命周期
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以相对超时创建
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancel: CancellationToken::new(),
        }
    }

    /// 从请求元数据构建；无法解析的超时值按无截止时间处理
    ///
    /// 截止时间比请求头给出的提前 `min(timeout / 5, DEADLINE_MARGIN)`。
    pub fn from_metadata(metadata: &MetadataMap) -> Self {
        let timeout = metadata
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|raw| {
                let parsed = parse_grpc_timeout(raw);
                if parsed.is_none() {
                    debug!(value = raw, "Ignoring malformed grpc-timeout header");
                }
                parsed
            });

        match timeout {
            Some(timeout) => Self::with_timeout(timeout - (timeout / 5).min(DEADLINE_MARGIN)),
            None => Self::new(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 触发取消（例如响应流的接收端已被丢弃）
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 主动检查：已取消或已超时则立即失败
    pub fn check(&self) -> AppResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AppError::cancelled("request is canceled"));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(AppError::deadline_exceeded("deadline is exceeded"));
            }
        }
        Ok(())
    }

    /// 被动检查：让挂起点与取消、截止时间赛跑
    pub async fn guard<F>(&self, fut: F) -> AppResult<F::Output>
    where
        F: Future,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AppError::cancelled("request is canceled")),
            _ = deadline => Err(AppError::deadline_exceeded("deadline is exceeded")),
            output = fut => Ok(output),
        }
    }
}

/// 解析 `grpc-timeout` 值：1~8 位数字 + 单位（H M S m u n）
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if !value.is_ascii() || value.len() < 2 || value.len() > 9 {
        return None;
    }

    let (digits, unit) = value.split_at(value.len() - 1);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    let timeout = match unit {
        "H" => Duration::from_secs(amount.checked_mul(3600)?),
        "M" => Duration::from_secs(amount.checked_mul(60)?),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };

    Some(timeout)
}
