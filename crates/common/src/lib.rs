//! common - 通用工具库
//!
//! 调用上下文（取消 / 截止时间）与带退避的重试

pub mod context;
pub mod retry;

pub use context::*;
pub use retry::*;
