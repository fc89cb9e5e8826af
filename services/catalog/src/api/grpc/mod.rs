//! gRPC 服务模块

mod auth_service;
mod laptop_service;

pub use auth_service::AuthServiceImpl;
pub use laptop_service::{LaptopServiceImpl, MAX_IMAGE_SIZE};
