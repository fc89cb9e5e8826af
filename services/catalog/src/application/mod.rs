//! 应用层

mod auth;

pub use auth::{CredentialIssuer, seed_users};
