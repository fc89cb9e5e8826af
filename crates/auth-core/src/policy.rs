//! 方法级访问表
//!
//! 完整方法名（`/package.Service/Method`）→ 允许的角色集合。
//! 表中没有的方法是公开的，不需要令牌。

use std::collections::{HashMap, HashSet};

use pcbook_errors::{AppError, AppResult};

use crate::{Claims, TokenService};

#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    rules: HashMap<String, HashSet<String>>,
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为方法登记允许的角色（可多次调用累加）
    pub fn allow<I, R>(mut self, method: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.rules
            .entry(method.into())
            .or_default()
            .extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn is_protected(&self, method: &str) -> bool {
        self.rules.contains_key(method)
    }

    /// 受保护的方法集合（客户端据此决定附加哪些调用的凭证）
    pub fn protected_methods(&self) -> HashSet<String> {
        self.rules.keys().cloned().collect()
    }

    /// 对一次调用做准入判断
    ///
    /// 公开方法返回 `Ok(None)`；受保护方法校验令牌和角色，成功时返回 Claims。
    /// 拒绝原因只区分“未认证”和“无权限”，不暴露允许的角色列表。
    pub fn authorize(
        &self,
        method: &str,
        token: Option<&str>,
        tokens: &TokenService,
    ) -> AppResult<Option<Claims>> {
        let Some(roles) = self.rules.get(method) else {
            return Ok(None);
        };

        let token =
            token.ok_or_else(|| AppError::unauthenticated("authorization token is not provided"))?;
        let claims = tokens.validate_token(token)?;

        if roles.contains(&claims.role) {
            Ok(Some(claims))
        } else {
            Err(AppError::permission_denied("no permission to access this RPC"))
        }
    }
}
