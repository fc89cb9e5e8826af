//! gRPC Interceptors
//!
//! - [`AuthGuardLayer`]：在处理器之前按方法名做鉴权（tower 中间件，能看到请求路径）
//! - [`trace_interceptor`]：提取或生成追踪 ID

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{Either, Ready, ready};
use pcbook_auth_core::{AccessPolicy, Claims, TokenService};
use tonic::{Request, Status};
use tower::{Layer, Service};
use tracing::{debug, info_span, warn};
use uuid::Uuid;

/// 凭证所在的元数据键
pub const AUTHORIZATION_HEADER: &str = "authorization";

const BEARER_PREFIX: &str = "Bearer ";

/// 鉴权中间件
#[derive(Clone)]
pub struct AuthGuardLayer {
    policy: Arc<AccessPolicy>,
    tokens: Arc<TokenService>,
}

impl AuthGuardLayer {
    pub fn new(policy: AccessPolicy, tokens: TokenService) -> Self {
        Self {
            policy: Arc::new(policy),
            tokens: Arc::new(tokens),
        }
    }
}

impl<S> Layer<S> for AuthGuardLayer {
    type Service = AuthGuard<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthGuard {
            inner,
            policy: self.policy.clone(),
            tokens: self.tokens.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthGuard<S> {
    inner: S,
    policy: Arc<AccessPolicy>,
    tokens: Arc<TokenService>,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for AuthGuard<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    ResBody: Default,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Either<Ready<Result<S::Response, S::Error>>, S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: http::Request<ReqBody>) -> Self::Future {
        let method = request.uri().path().to_string();
        let decision = self
            .policy
            .authorize(&method, bearer_token(request.headers()), &self.tokens);

        match decision {
            Ok(Some(claims)) => {
                debug!(
                    method = %method,
                    username = %claims.sub,
                    role = %claims.role,
                    "Call admitted"
                );
                request.extensions_mut().insert(claims);
                Either::Right(self.inner.call(request))
            }
            Ok(None) => Either::Right(self.inner.call(request)),
            Err(err) => {
                warn!(method = %method, error = %err, "Call rejected");
                Either::Left(ready(Ok(Status::from(err).into_http())))
            }
        }
    }
}

/// 从请求头中提取 Bearer token
fn bearer_token(headers: &http::HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION_HEADER)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
        .filter(|token| !token.is_empty())
}

/// 从请求扩展中获取鉴权通过后的 Claims（公开方法没有）
pub fn get_claims<T>(request: &Request<T>) -> Option<&Claims> {
    request.extensions().get::<Claims>()
}

/// 追踪信息
#[derive(Debug, Clone)]
pub struct TraceInfo {
    pub trace_id: String,
}

/// gRPC 拦截器：提取追踪 ID，没有则生成一个
#[allow(clippy::result_large_err)]
pub fn trace_interceptor(mut request: Request<()>) -> Result<Request<()>, Status> {
    let metadata = request.metadata();

    let trace_id = ["x-trace-id", "x-request-id", "x-correlation-id"]
        .iter()
        .find_map(|key| metadata.get(*key).and_then(|v| v.to_str().ok()))
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    request.extensions_mut().insert(TraceInfo { trace_id });

    Ok(request)
}

/// 为一次调用创建 span，带上追踪 ID 和调用者
pub fn request_span<T>(request: &Request<T>, name: &'static str) -> tracing::Span {
    let trace_id = request
        .extensions()
        .get::<TraceInfo>()
        .map(|t| t.trace_id.as_str())
        .unwrap_or("unknown");
    let caller = get_claims(request)
        .map(Claims::username)
        .unwrap_or("anonymous");

    info_span!("grpc_request", rpc = name, trace_id = %trace_id, caller = %caller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::time::Duration;
    use tower::ServiceExt;

    const CREATE: &str = "/pcbook.v1.LaptopService/CreateLaptop";
    const SEARCH: &str = "/pcbook.v1.LaptopService/SearchLaptop";

    fn tokens() -> TokenService {
        TokenService::new("secret", Duration::from_secs(900), "pcbook")
    }

    fn guard() -> impl Service<
        http::Request<()>,
        Response = http::Response<String>,
        Error = Infallible,
    > {
        let inner = tower::service_fn(|request: http::Request<()>| async move {
            let caller = request
                .extensions()
                .get::<Claims>()
                .map(|c| c.sub.clone())
                .unwrap_or_else(|| "anonymous".to_string());
            Ok::<_, Infallible>(http::Response::new(caller))
        });

        let policy = AccessPolicy::new().allow(CREATE, ["admin"]);
        AuthGuardLayer::new(policy, tokens()).layer(inner)
    }

    fn request(path: &str, token: Option<&str>) -> http::Request<()> {
        let mut builder = http::Request::builder().uri(format!("http://localhost{}", path));
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION_HEADER, format!("Bearer {}", token));
        }
        builder.body(()).unwrap()
    }

    fn grpc_status(response: &http::Response<String>) -> Option<&str> {
        response
            .headers()
            .get("grpc-status")
            .and_then(|v| v.to_str().ok())
    }

    #[tokio::test]
    async fn test_public_method_passes_through() {
        let response = guard().oneshot(request(SEARCH, None)).await.unwrap();
        assert_eq!(grpc_status(&response), None);
        assert_eq!(response.body(), "anonymous");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthenticated() {
        let response = guard().oneshot(request(CREATE, None)).await.unwrap();
        assert_eq!(grpc_status(&response), Some("16"));
    }

    #[tokio::test]
    async fn test_wrong_role_is_permission_denied() {
        let issued = tokens().generate_token("user1", "user").unwrap();
        let response = guard()
            .oneshot(request(CREATE, Some(&issued.access_token)))
            .await
            .unwrap();
        assert_eq!(grpc_status(&response), Some("7"));
    }

    #[tokio::test]
    async fn test_allowed_role_reaches_handler_with_claims() {
        let issued = tokens().generate_token("admin1", "admin").unwrap();
        let response = guard()
            .oneshot(request(CREATE, Some(&issued.access_token)))
            .await
            .unwrap();
        assert_eq!(grpc_status(&response), None);
        assert_eq!(response.body(), "admin1");
    }

    #[test]
    fn test_bearer_token_requires_scheme() {
        let mut headers = http::HeaderMap::new();
        headers.insert(AUTHORIZATION_HEADER, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION_HEADER, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
    }

    #[test]
    fn test_trace_interceptor_keeps_incoming_id() {
        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert("x-request-id", "req-42".parse().unwrap());

        let request = trace_interceptor(request).unwrap();
        let trace = request.extensions().get::<TraceInfo>().unwrap();
        assert_eq!(trace.trace_id, "req-42");
    }

    #[test]
    fn test_get_claims_reads_guard_extension() {
        let mut request = Request::new(());
        assert!(get_claims(&request).is_none());

        let claims = tokens()
            .validate_token(&tokens().generate_token("admin1", "admin").unwrap().access_token)
            .unwrap();
        request.extensions_mut().insert(claims);
        assert_eq!(get_claims(&request).map(Claims::username), Some("admin1"));
    }

    #[test]
    fn test_trace_interceptor_generates_id() {
        let request = trace_interceptor(Request::new(())).unwrap();
        assert!(request.extensions().get::<TraceInfo>().is_some());
    }
}
