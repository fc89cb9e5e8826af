//! 凭证签发

use std::sync::Arc;

use pcbook_auth_core::{Claims, IssuedToken, TokenService};
use pcbook_config::SeedUser;
use pcbook_errors::{AppError, AppResult};
use secrecy::ExposeSecret;
use tracing::{info, warn};

use crate::domain::{User, UserStore};

/// 校验用户名和密码并签发访问令牌
#[derive(Clone)]
pub struct CredentialIssuer {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
}

impl CredentialIssuer {
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenService) -> Self {
        Self { users, tokens }
    }

    /// 用户不存在与密码错误返回同一个错误，且都要做一次完整的哈希校验
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<IssuedToken> {
        let (user, known) = match self.users.find(username).await? {
            Some(user) => (user, true),
            None => (User::placeholder(username), false),
        };

        let verified = user.is_correct_password(password);
        if !(verified && known) {
            warn!(username = %username, known, "Login failed");
            return Err(AppError::unauthenticated("incorrect username or password"));
        }

        let issued = self.tokens.generate_token(&user.username, &user.role)?;
        info!(username = %user.username, role = %user.role, "Access token issued");
        Ok(issued)
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        self.tokens.validate_token(token)
    }
}

/// 把配置中的账号写入用户存储
pub async fn seed_users(store: &dyn UserStore, users: &[SeedUser]) -> AppResult<()> {
    for seed in users {
        let user = User::new(&seed.username, seed.password.expose_secret(), &seed.role)?;
        store.save(user).await?;
        info!(username = %seed.username, role = %seed.role, "User seeded");
    }
    Ok(())
}
