//! Catalog Service - 笔记本目录服务入口

use catalog::{ServerState, serve_with_shutdown};
use pcbook_bootstrap::{init_runtime, listen_addr, shutdown_signal};
use pcbook_config::AppConfig;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let config = AppConfig::load(&config_dir)?;

    init_runtime(&config);
    info!("Initializing Catalog Service...");

    let state = ServerState::from_config(&config).await?;
    let addr = listen_addr(&config.server)?;
    let listener = TcpListener::bind(addr).await?;

    serve_with_shutdown(state, listener, shutdown_signal()).await?;
    Ok(())
}
