//! 服务运行时

use std::net::SocketAddr;

use pcbook_config::{AppConfig, ServerConfig};
use pcbook_errors::{AppError, AppResult};
use pcbook_telemetry::{init_tracing, init_tracing_json};
use tracing::{error, info};

/// 初始化服务运行时（生产环境输出 JSON 日志）
pub fn init_runtime(config: &AppConfig) {
    if config.is_production() {
        init_tracing_json(&config.telemetry.log_level);
    } else {
        init_tracing(&config.telemetry.log_level);
    }

    info!(
        app_name = %config.app_name,
        app_env = %config.app_env,
        "Runtime initialized"
    );
}

/// 解析监听地址
pub fn listen_addr(server: &ServerConfig) -> AppResult<SocketAddr> {
    format!("{}:{}", server.host, server.port)
        .parse()
        .map_err(|e| AppError::validation(format!("Invalid listen address: {}", e)))
}

/// 等待关闭信号（Ctrl+C 或 SIGTERM）
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_addr() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        };
        assert_eq!(listen_addr(&server).unwrap().port(), 8080);

        let bad = ServerConfig {
            host: "not a host".to_string(),
            port: 8080,
        };
        assert!(matches!(listen_addr(&bad), Err(AppError::Validation(_))));
    }
}
