//! gRPC 反射服务

use pcbook_errors::{AppError, AppResult};
use tonic_reflection::server::Builder;
use tonic_reflection::server::v1::{ServerReflection, ServerReflectionServer};

/// 用编码后的文件描述符集构建反射服务
pub fn build_reflection(
    file_descriptor_sets: &[&'static [u8]],
) -> AppResult<ServerReflectionServer<impl ServerReflection>> {
    file_descriptor_sets
        .iter()
        .fold(Builder::configure(), |builder, fds| {
            builder.register_encoded_file_descriptor_set(*fds)
        })
        .build_v1()
        .map_err(|e| AppError::internal(format!("Failed to build reflection service: {}", e)))
}
