//! 登录客户端

use std::time::Duration;

use async_trait::async_trait;
use pcbook_errors::{AppError, AppResult};
use secrecy::{ExposeSecret, Secret};
use tokio::time::Instant;
use tonic::transport::Channel;
use tracing::debug;

use super::{Authenticator, Credential};
use crate::api::pcbook::{LoginRequest, auth_service_client::AuthServiceClient};

/// 用固定账号调用 `AuthService/Login`
#[derive(Clone)]
pub struct AuthClient {
    client: AuthServiceClient<Channel>,
    username: String,
    password: Secret<String>,
}

impl AuthClient {
    pub fn new(channel: Channel, username: impl Into<String>, password: Secret<String>) -> Self {
        Self {
            client: AuthServiceClient::new(channel),
            username: username.into(),
            password,
        }
    }
}

#[async_trait]
impl Authenticator for AuthClient {
    async fn login(&self) -> AppResult<Credential> {
        let request = LoginRequest {
            username: self.username.clone(),
            password: self.password.expose_secret().clone(),
        };

        // 生成的客户端需要 &mut self，克隆一份共享同一通道
        let response = self
            .client
            .clone()
            .login(request)
            .await
            .map_err(AppError::from)?
            .into_inner();

        let expires_in = u64::try_from(response.expires_in).unwrap_or(0);
        debug!(username = %self.username, expires_in, "Logged in");

        Ok(Credential {
            access_token: response.access_token,
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        })
    }
}
