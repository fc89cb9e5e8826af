//! 用户与用户存储

use std::collections::HashMap;
use std::sync::RwLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use pcbook_errors::{AppError, AppResult};

/// 用户不存在时参与校验的哈希，参数与 `Argon2::default()` 一致
const PLACEHOLDER_HASH: &str = concat!(
    "$argon2id$v=19$m=19456,t=2,p=1",
    "$cGNib29rLWR1bW15LXNsdA",
    "$30rcLuK0oduALi1ZevIfsIDipe9Nv2cmhRUjqO/JUHs"
);

/// 用户（只保存密码的 argon2 PHC 哈希）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub hashed_password: String,
    pub role: String,
}

impl User {
    pub fn new(username: &str, password: &str, role: &str) -> AppResult<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let hashed_password = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::internal(format!("cannot hash password: {}", e)))?
            .to_string();

        Ok(Self {
            username: username.to_string(),
            hashed_password,
            role: role.to_string(),
        })
    }

    /// 查无此人时的替身：校验开销与真实用户相同，角色为空
    pub fn placeholder(username: &str) -> Self {
        Self {
            username: username.to_string(),
            hashed_password: PLACEHOLDER_HASH.to_string(),
            role: String::new(),
        }
    }

    /// 校验明文密码；哈希无法解析时视为不匹配
    pub fn is_correct_password(&self, password: &str) -> bool {
        PasswordHash::new(&self.hashed_password)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// 保存用户，用户名已存在返回 Conflict
    async fn save(&self, user: User) -> AppResult<()>;

    async fn find(&self, username: &str) -> AppResult<Option<User>>;
}

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::internal("user store lock poisoned")
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn save(&self, user: User) -> AppResult<()> {
        let mut users = self.users.write().map_err(poisoned)?;
        if users.contains_key(&user.username) {
            return Err(AppError::conflict(format!(
                "user {} already exists",
                user.username
            )));
        }
        users.insert(user.username.clone(), user);
        Ok(())
    }

    async fn find(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self.users.read().map_err(poisoned)?.get(username).cloned())
    }
}
