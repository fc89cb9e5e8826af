//! 客户端
//!
//! [`CredentialRefresher`] 维护当前令牌并在过期前刷新；它产出的 tower 层挂在
//! 通道上，为受保护方法附加 `authorization` 元数据。

mod auth_client;
mod credentials;
mod laptop_client;

pub use auth_client::AuthClient;
pub use credentials::{
    Authenticator, Credential, CredentialLayer, CredentialRefresher, CredentialService,
};
pub use laptop_client::LaptopClient;
