//! pcbook-bootstrap - 统一服务启动骨架
//!
//! 服务端复用的启动逻辑：运行时初始化、鉴权中间件、反射服务

mod interceptor;
mod reflection;
mod runtime;

pub use interceptor::*;
pub use reflection::*;
pub use runtime::*;
