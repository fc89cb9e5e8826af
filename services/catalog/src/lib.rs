//! catalog - 笔记本目录服务
//!
//! 服务端：目录 / 评分 / 图片存储与四个 RPC 处理器，登录与方法级鉴权。
//! 客户端：自动刷新凭证的通道中间件与各 RPC 的封装。

pub mod api;
pub mod application;
pub mod client;
pub mod domain;
pub mod sample;
pub mod server;

pub use api::MAX_IMAGE_SIZE;
pub use server::{ServerState, serve_with_shutdown};
