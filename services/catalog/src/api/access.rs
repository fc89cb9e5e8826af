//! 方法访问表

use std::collections::HashSet;

use pcbook_auth_core::AccessPolicy;

pub const LAPTOP_SERVICE_PATH: &str = "/pcbook.v1.LaptopService/";

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// 需要鉴权的方法及允许的角色；`SearchLaptop` 与 `AuthService/Login` 公开
pub fn access_policy() -> AccessPolicy {
    AccessPolicy::new()
        .allow(format!("{}CreateLaptop", LAPTOP_SERVICE_PATH), [ROLE_ADMIN])
        .allow(format!("{}UploadImage", LAPTOP_SERVICE_PATH), [ROLE_ADMIN])
        .allow(
            format!("{}RateLaptop", LAPTOP_SERVICE_PATH),
            [ROLE_ADMIN, ROLE_USER],
        )
}

/// 客户端需要附加凭证的方法
pub fn protected_methods() -> HashSet<String> {
    access_policy().protected_methods()
}
