use async_trait::async_trait;

use crate::errors::ClientError;
use crate::models::mutation::MutationRequest;
use crate::models::portfolio::Portfolio;
use crate::models::price::PricePoint;
use crate::models::query::EffectiveQuery;
use crate::models::session::Credential;

/// What `/login` answered on success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginReply {
    pub message: Option<String>,
    /// Present when the deployment issues bearer tokens.
    pub token: Option<String>,
    /// Session cookie pairs from `Set-Cookie`, joined as a `Cookie` header value.
    pub cookie: Option<String>,
}

/// The backend contract the client consumes.
///
/// `HttpBackend` talks to the real service; tests substitute scripted
/// implementations. Implementations only translate requests and payloads:
/// ordering, staleness and state ownership belong to the services.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait PortfolioBackend: Send + Sync {
    /// Human-readable name of this backend (for logs).
    fn name(&self) -> &str;

    /// `POST /login`.
    async fn login(&self, username: &str, password: &str) -> Result<LoginReply, ClientError>;

    /// `GET /logout`. Best-effort: callers log failures and move on.
    async fn logout(&self, credential: &Credential) -> Result<(), ClientError>;

    /// `GET /api/portfolio?username=`: the full holdings snapshot.
    async fn fetch_portfolio(
        &self,
        credential: &Credential,
        username: &str,
    ) -> Result<Portfolio, ClientError>;

    /// Date-range or day-count history. Points may come back in any order.
    async fn fetch_history(
        &self,
        credential: &Credential,
        query: &EffectiveQuery,
    ) -> Result<Vec<PricePoint>, ClientError>;

    /// `PUT /update_user`. Returns the server's confirmation message.
    async fn update_holding(
        &self,
        credential: &Credential,
        username: &str,
        request: &MutationRequest,
    ) -> Result<String, ClientError>;
}
