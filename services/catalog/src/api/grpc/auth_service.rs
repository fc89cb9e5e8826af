//! 登录 gRPC 服务

use pcbook_bootstrap::request_span;
use tonic::{Request, Response, Status};
use tracing::Instrument;

use crate::api::proto::pcbook::{LoginRequest, LoginResponse, auth_service_server::AuthService};
use crate::application::CredentialIssuer;

pub struct AuthServiceImpl {
    issuer: CredentialIssuer,
}

impl AuthServiceImpl {
    pub fn new(issuer: CredentialIssuer) -> Self {
        Self { issuer }
    }
}

#[tonic::async_trait]
impl AuthService for AuthServiceImpl {
    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        let span = request_span(&request, "Login");
        let req = request.into_inner();

        async move {
            let issued = self
                .issuer
                .authenticate(&req.username, &req.password)
                .await?;

            Ok::<_, Status>(Response::new(LoginResponse {
                expires_in: issued.expires_in_secs(),
                access_token: issued.access_token,
            }))
        }
        .instrument(span)
        .await
    }
}
