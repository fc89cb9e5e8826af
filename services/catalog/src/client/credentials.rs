//! 凭证刷新与附加

use std::collections::HashSet;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use http::HeaderValue;
use pcbook_bootstrap::AUTHORIZATION_HEADER;
use pcbook_common::{RetryConfig, is_transient, with_retry};
use pcbook_errors::AppResult;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower::{Layer, Service};
use tracing::{Instrument, debug, info, info_span, warn};

/// 两次计划刷新之间的最短间隔
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// 一次登录得到的令牌
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: Instant,
}

impl Credential {
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// 重新登录的能力
#[async_trait]
pub trait Authenticator: Send + Sync + 'static {
    async fn login(&self) -> AppResult<Credential>;
}

/// 客户端凭证刷新器
///
/// 后台任务在 `expires_at - lead` 时重新登录并原子替换当前令牌；`lead` 不短于
/// 令牌有效期时改为在剩余有效期过半时刷新。刷新失败时保留
/// 旧令牌，过一段时间再试；旧令牌过期后的调用由服务端拒绝。
/// 刷新器被丢弃时后台任务随之停止。
pub struct CredentialRefresher {
    authenticator: Arc<dyn Authenticator>,
    retry: RetryConfig,
    tx: Arc<watch::Sender<Credential>>,
    rx: watch::Receiver<Credential>,
    _stop: DropGuard,
}

impl CredentialRefresher {
    /// 先同步登录一次（失败即返回错误），再启动后台刷新
    pub async fn start<A>(authenticator: A, lead: Duration, retry: RetryConfig) -> AppResult<Self>
    where
        A: Authenticator,
    {
        let authenticator: Arc<dyn Authenticator> = Arc::new(authenticator);
        let initial = login(authenticator.as_ref(), &retry).await?;
        info!("Initial login succeeded");

        let (tx, rx) = watch::channel(initial);
        let tx = Arc::new(tx);
        let stop = CancellationToken::new();

        tokio::spawn(
            refresh_loop(
                authenticator.clone(),
                retry.clone(),
                lead,
                tx.clone(),
                rx.clone(),
                stop.clone(),
            )
            .instrument(info_span!("credential_refresher")),
        );

        Ok(Self {
            authenticator,
            retry,
            tx,
            rx,
            _stop: stop.drop_guard(),
        })
    }

    /// 立即重新登录
    pub async fn refresh_now(&self) -> AppResult<()> {
        let credential = login(self.authenticator.as_ref(), &self.retry).await?;
        self.tx.send_replace(credential);
        info!("Access token refreshed on demand");
        Ok(())
    }

    /// 当前令牌的副本
    pub fn current(&self) -> Credential {
        self.rx.borrow().clone()
    }

    /// 为 `protected_methods` 中的方法附加当前令牌的 tower 层
    pub fn layer(&self, protected_methods: HashSet<String>) -> CredentialLayer {
        CredentialLayer {
            credential: self.rx.clone(),
            methods: Arc::new(protected_methods),
        }
    }
}

async fn login(authenticator: &dyn Authenticator, retry: &RetryConfig) -> AppResult<Credential> {
    with_retry(retry, "login", || authenticator.login(), is_transient).await
}

async fn refresh_loop(
    authenticator: Arc<dyn Authenticator>,
    retry: RetryConfig,
    lead: Duration,
    tx: Arc<watch::Sender<Credential>>,
    mut rx: watch::Receiver<Credential>,
    stop: CancellationToken,
) {
    loop {
        let expires_at = rx.borrow_and_update().expires_at;
        let refresh_at = next_refresh(Instant::now(), expires_at, lead);
        debug!(
            refresh_in_ms = refresh_at.saturating_duration_since(Instant::now()).as_millis(),
            "Next token refresh scheduled"
        );

        tokio::select! {
            _ = stop.cancelled() => break,
            // 按需刷新换入了新令牌，重新计算刷新时间
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = tokio::time::sleep_until(refresh_at) => {}
        }

        match login(authenticator.as_ref(), &retry).await {
            Ok(credential) => {
                tx.send_replace(credential);
                info!("Access token refreshed");
            }
            Err(err) => {
                warn!(error = %err, "Token refresh failed, keeping current token");
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(retry.max_delay) => {}
                }
            }
        }
    }

    debug!("Credential refresher stopped");
}

/// 计划刷新时间：`expires_at - lead`，但不早于剩余有效期的一半
fn next_refresh(now: Instant, expires_at: Instant, lead: Duration) -> Instant {
    let remaining = expires_at.saturating_duration_since(now);
    let earliest = now + (remaining / 2).max(MIN_REFRESH_INTERVAL);
    expires_at.checked_sub(lead).unwrap_or(now).max(earliest)
}

/// 附加凭证的 tower 层
#[derive(Clone)]
pub struct CredentialLayer {
    credential: watch::Receiver<Credential>,
    methods: Arc<HashSet<String>>,
}

impl<S> Layer<S> for CredentialLayer {
    type Service = CredentialService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CredentialService {
            inner,
            credential: self.credential.clone(),
            methods: self.methods.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CredentialService<S> {
    inner: S,
    credential: watch::Receiver<Credential>,
    methods: Arc<HashSet<String>>,
}

impl<S, B> Service<http::Request<B>> for CredentialService<S>
where
    S: Service<http::Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: http::Request<B>) -> Self::Future {
        if self.methods.contains(request.uri().path()) {
            // 令牌在派发时复制进请求头，之后的刷新不影响已发出的调用
            let bearer = format!("Bearer {}", self.credential.borrow().access_token);
            match HeaderValue::from_str(&bearer) {
                Ok(value) => {
                    request.headers_mut().insert(AUTHORIZATION_HEADER, value);
                }
                Err(e) => warn!(error = %e, "Access token is not a valid header value"),
            }
        }

        self.inner.call(request)
    }
}
