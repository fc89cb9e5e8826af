//! 服务端组装
//!
//! 二进制入口和集成测试共用同一套组装逻辑。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pcbook_auth_core::TokenService;
use pcbook_bootstrap::{AuthGuardLayer, build_reflection, trace_interceptor};
use pcbook_config::AppConfig;
use pcbook_errors::{AppError, AppResult};
use secrecy::ExposeSecret;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::info;

use crate::api::access::access_policy;
use crate::api::pcbook::{
    auth_service_server::AuthServiceServer, laptop_service_server::LaptopServiceServer,
};
use crate::api::proto::FILE_DESCRIPTOR_SET;
use crate::api::{AuthServiceImpl, LaptopServiceImpl};
use crate::application::{CredentialIssuer, seed_users};
use crate::domain::{
    DiskImageStore, ImageStore, InMemoryLaptopStore, InMemoryRatingStore, InMemoryUserStore,
    LaptopStore, RatingStore, UserStore,
};

/// 服务端依赖，全部显式构造后注入处理器
#[derive(Clone)]
pub struct ServerState {
    pub laptops: Arc<dyn LaptopStore>,
    pub images: Arc<dyn ImageStore>,
    pub ratings: Arc<dyn RatingStore>,
    pub users: Arc<dyn UserStore>,
    pub tokens: TokenService,
}

impl ServerState {
    /// 按配置构造内存存储并写入初始账号
    pub async fn from_config(config: &AppConfig) -> AppResult<Self> {
        let tokens = TokenService::new(
            config.jwt.secret.expose_secret(),
            Duration::from_secs(config.jwt.expires_in),
            config.jwt.issuer.clone(),
        );

        let users = Arc::new(InMemoryUserStore::new());
        seed_users(users.as_ref(), &config.users).await?;

        Ok(Self {
            laptops: Arc::new(InMemoryLaptopStore::new()),
            images: Arc::new(DiskImageStore::new(&config.image_store.dir)),
            ratings: Arc::new(InMemoryRatingStore::new()),
            users,
            tokens,
        })
    }
}

/// 在给定监听器上提供服务，直到 `shutdown` 完成
pub async fn serve_with_shutdown<F>(
    state: ServerState,
    listener: TcpListener,
    shutdown: F,
) -> AppResult<()>
where
    F: Future<Output = ()> + Send,
{
    let reflection = build_reflection(&[FILE_DESCRIPTOR_SET])?;

    let laptop_service = LaptopServiceImpl::new(state.laptops, state.images, state.ratings);
    let issuer = CredentialIssuer::new(state.users, state.tokens.clone());
    let auth_service = AuthServiceImpl::new(issuer);
    let guard = AuthGuardLayer::new(access_policy(), state.tokens);

    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "Catalog server listening");
    }

    Server::builder()
        .layer(guard)
        .add_service(LaptopServiceServer::with_interceptor(
            laptop_service,
            trace_interceptor,
        ))
        .add_service(AuthServiceServer::with_interceptor(
            auth_service,
            trace_interceptor,
        ))
        .add_service(reflection)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await
        .map_err(|e| AppError::internal(format!("gRPC server failed: {}", e)))?;

    info!("Catalog server stopped");
    Ok(())
}
