//! pcbook-config - 配置加载库

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use thiserror::Error;

use secrecy::Secret;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),
}

/// JWT 配置
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    /// 令牌有效期（秒）
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default = "default_issuer")]
    pub issuer: String,
}

fn default_expires_in() -> u64 {
    15 * 60
}

fn default_issuer() -> String {
    "pcbook".to_string()
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// 图片存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct ImageStoreConfig {
    #[serde(default = "default_image_dir")]
    pub dir: String,
}

impl Default for ImageStoreConfig {
    fn default() -> Self {
        Self {
            dir: default_image_dir(),
        }
    }
}

fn default_image_dir() -> String {
    "img".to_string()
}

/// 启动时写入用户存储的账号
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub password: Secret<String>,
    pub role: String,
}

fn default_users() -> Vec<SeedUser> {
    vec![
        SeedUser {
            username: "admin1".to_string(),
            password: Secret::new("secret".to_string()),
            role: "admin".to_string(),
        },
        SeedUser {
            username: "user1".to_string(),
            password: Secret::new("secret".to_string()),
            role: "user".to_string(),
        },
    ]
}

/// 服务端配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub image_store: ImageStoreConfig,
    #[serde(default = "default_users")]
    pub users: Vec<SeedUser>,
}

fn default_app_env() -> String {
    "development".to_string()
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 优先级：`PCBOOK_` 环境变量 > `{APP_ENV}.toml` > `default.toml`
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| default_app_env());

        let config: Self = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("PCBOOK_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }
}

/// 客户端配置
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub server_address: String,
    pub username: String,
    pub password: Secret<String>,
    /// 令牌过期前提前多少秒刷新
    #[serde(default = "default_refresh_lead_secs")]
    pub refresh_lead_secs: u64,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_refresh_lead_secs() -> u64 {
    30
}

impl ClientConfig {
    /// 从 `client.toml` 和 `PCBOOK_CLIENT_` 环境变量加载
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Toml::file(format!("{}/client.toml", config_dir)))
            .merge(Env::prefixed("PCBOOK_CLIENT_").split("__"))
            .extract()?;

        Ok(config)
    }
}
