//! telemetry - 日志初始化

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// 初始化 tracing
///
/// 重复初始化（例如同一进程内的多个测试）会被忽略
pub fn init_tracing(log_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

/// 初始化 JSON 格式的 tracing（生产环境）
pub fn init_tracing_json(log_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init();
}
