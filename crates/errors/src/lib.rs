//! pcbook-errors - 统一错误处理
//!
//! 每个错误都归入一个固定的种类，跨越 RPC 边界时一一映射为 gRPC 状态码

use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn resource_exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn deadline_exceeded(msg: impl Into<String>) -> Self {
        Self::DeadlineExceeded(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// 转换为 gRPC 状态码
    pub fn grpc_code(&self) -> tonic::Code {
        match self {
            Self::Validation(_) => tonic::Code::InvalidArgument,
            Self::Conflict(_) => tonic::Code::AlreadyExists,
            Self::NotFound(_) => tonic::Code::NotFound,
            Self::Unauthenticated(_) => tonic::Code::Unauthenticated,
            Self::PermissionDenied(_) => tonic::Code::PermissionDenied,
            Self::ResourceExhausted(_) => tonic::Code::ResourceExhausted,
            Self::Cancelled(_) => tonic::Code::Cancelled,
            Self::DeadlineExceeded(_) => tonic::Code::DeadlineExceeded,
            Self::Internal(_) => tonic::Code::Internal,
        }
    }

    /// 是否为取消或超时（调用生命周期结束，而非业务失败）
    pub fn is_call_lifecycle(&self) -> bool {
        matches!(self, Self::Cancelled(_) | Self::DeadlineExceeded(_))
    }

    /// 客户端可否在刷新凭证后重试一次
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unauthenticated(_))
    }
}

impl From<AppError> for tonic::Status {
    fn from(err: AppError) -> Self {
        let message = match &err {
            AppError::Validation(m)
            | AppError::Conflict(m)
            | AppError::NotFound(m)
            | AppError::Unauthenticated(m)
            | AppError::PermissionDenied(m)
            | AppError::ResourceExhausted(m)
            | AppError::Cancelled(m)
            | AppError::DeadlineExceeded(m)
            | AppError::Internal(m) => m.clone(),
        };
        tonic::Status::new(err.grpc_code(), message)
    }
}

/// 客户端侧：把服务端返回的状态归类
impl From<tonic::Status> for AppError {
    fn from(status: tonic::Status) -> Self {
        let message = status.message().to_string();
        match status.code() {
            tonic::Code::InvalidArgument | tonic::Code::OutOfRange => Self::Validation(message),
            tonic::Code::AlreadyExists => Self::Conflict(message),
            tonic::Code::NotFound => Self::NotFound(message),
            tonic::Code::Unauthenticated => Self::Unauthenticated(message),
            tonic::Code::PermissionDenied => Self::PermissionDenied(message),
            tonic::Code::ResourceExhausted => Self::ResourceExhausted(message),
            tonic::Code::Cancelled => Self::Cancelled(message),
            tonic::Code::DeadlineExceeded => Self::DeadlineExceeded(message),
            _ => Self::Internal(message),
        }
    }
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;
