//! API 层模块

pub mod access;
pub mod grpc;
pub mod proto;

pub use grpc::{AuthServiceImpl, LaptopServiceImpl, MAX_IMAGE_SIZE};
pub use proto::pcbook;
