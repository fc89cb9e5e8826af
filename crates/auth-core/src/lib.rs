//! pcbook-auth-core - 认证核心库
//!
//! JWT 签发 / 校验，以及按方法划分的角色访问表

mod policy;

pub use policy::AccessPolicy;

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use pcbook_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// JWT Claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Role
    pub role: String,
    /// Expiration time
    pub exp: i64,
    /// Issued at
    pub iat: i64,
    /// JWT ID
    pub jti: String,
    /// Issuer
    pub iss: String,
}

impl Claims {
    pub fn new(
        username: &str,
        role: &str,
        issued_at: DateTime<Utc>,
        expires_in: Duration,
        issuer: &str,
    ) -> Self {
        Self {
            sub: username.to_string(),
            role: role.to_string(),
            exp: (issued_at + expires_in).timestamp(),
            iat: issued_at.timestamp(),
            jti: Uuid::now_v7().to_string(),
            iss: issuer.to_string(),
        }
    }

    pub fn username(&self) -> &str {
        &self.sub
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

/// 已签发的令牌
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// 距过期的剩余秒数（已过期为 0）
    pub fn expires_in_secs(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds().max(0)
    }
}

/// Token 服务
///
/// 无状态：服务端不保存会话，每次调用只校验签名与过期时间
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expires_in: Duration,
    issuer: String,
}

impl TokenService {
    pub fn new(secret: &str, expires_in: StdDuration, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expires_in: Duration::seconds(expires_in.as_secs() as i64),
            issuer: issuer.into(),
        }
    }

    /// 生成访问令牌
    pub fn generate_token(&self, username: &str, role: &str) -> AppResult<IssuedToken> {
        self.generate_token_at(username, role, Utc::now())
    }

    /// 以指定签发时间生成访问令牌
    pub fn generate_token_at(
        &self,
        username: &str,
        role: &str,
        issued_at: DateTime<Utc>,
    ) -> AppResult<IssuedToken> {
        let claims = Claims::new(username, role, issued_at, self.expires_in, &self.issuer);

        let access_token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to generate token: {}", e)))?;

        Ok(IssuedToken {
            access_token,
            expires_at: issued_at + self.expires_in,
        })
    }

    /// 验证令牌
    ///
    /// 过期、篡改、签发方不符都返回同一个错误
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 0; // 不允许时间偏差

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "Token validation failed");
                AppError::unauthenticated("access token is invalid")
            })
    }
}
