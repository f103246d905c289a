use async_trait::async_trait;
use reqwest::header::{HeaderMap, COOKIE, SET_COOKIE};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use std::time::Duration;

use super::traits::{LoginReply, PortfolioBackend};
use super::wire::{self, LoginRequest, LoginResponse, MessageResponse, UpdateUserRequest};
use crate::errors::{ClientError, GENERIC_LOGIN_FAILURE};
use crate::models::mutation::MutationRequest;
use crate::models::portfolio::Portfolio;
use crate::models::price::PricePoint;
use crate::models::query::EffectiveQuery;
use crate::models::session::Credential;
use crate::models::settings::Settings;

const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";
const GENERIC_UPDATE_FAILURE: &str = "Failed to update portfolio.";
const DEFAULT_UPDATE_MESSAGE: &str = "Portfolio updated.";

/// Cap on the exponential backoff between retries.
const MAX_RETRY_DELAY_MS: u64 = 5_000;

/// Backoff for idempotent GETs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (0-based): base × 2^attempt, capped.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay_ms.saturating_mul(1u64 << attempt.min(10));
        Duration::from_millis(exp.min(MAX_RETRY_DELAY_MS))
    }
}

/// `PortfolioBackend` over HTTP/JSON.
///
/// - Cookie sessions are captured from the `/login` response and sent back
///   as a `Cookie` header. The client keeps no cookie jar of its own.
/// - Bearer credentials are attached as an `Authorization` header.
/// - Only GETs are retried; `/login` and `/update_user` are sent once.
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl HttpBackend {
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        settings.validate()?;
        let base_url = Url::parse(settings.normalized_base_url()).map_err(|e| {
            ClientError::InvalidConfig(format!("Invalid base_url '{}': {e}", settings.base_url))
        })?;

        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(settings.request_timeout_secs));
        let client = builder
            .build()
            .map_err(|e| ClientError::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;

        // No timer to back off with on wasm32.
        #[cfg(target_arch = "wasm32")]
        let retry = RetryPolicy::none();
        #[cfg(not(target_arch = "wasm32"))]
        let retry = RetryPolicy {
            max_retries: settings.max_retries,
            base_delay_ms: settings.retry_base_delay_ms,
        };

        Ok(Self {
            client,
            base_url,
            retry,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL extended with percent-encoded path segments.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidConfig(format!("'{}' cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `GET /api/portfolio?username=`.
    pub fn portfolio_url(&self, username: &str) -> Result<Url, ClientError> {
        let mut url = self.endpoint(&["api", "portfolio"])?;
        url.query_pairs_mut().append_pair("username", username);
        Ok(url)
    }

    /// Date-range or day-count history endpoint for a resolved query.
    pub fn history_url(&self, query: &EffectiveQuery) -> Result<Url, ClientError> {
        match query {
            EffectiveQuery::DateRange { ticker, start, end } => {
                let mut url = self.endpoint(&["api", "portfolio", ticker.as_str()])?;
                url.query_pairs_mut()
                    .append_pair("start_date", &start.format(wire::DATE_FORMAT).to_string())
                    .append_pair("end_date", &end.format(wire::DATE_FORMAT).to_string());
                Ok(url)
            }
            EffectiveQuery::Trailing { ticker, days } => {
                let days = days.to_string();
                self.endpoint(&["api", "portfolio", ticker.as_str(), days.as_str()])
            }
        }
    }

    fn authorize(request: RequestBuilder, credential: &Credential) -> RequestBuilder {
        match credential {
            Credential::Bearer(token) => request.bearer_auth(token),
            Credential::Cookie(cookie) if !cookie.is_empty() => {
                request.header(COOKIE, cookie.as_str())
            }
            // Browser-held cookie.
            Credential::Cookie(_) => request,
        }
    }

    /// `name=value` pairs from every `Set-Cookie` header, attributes dropped.
    ///
    /// Cookies being deleted (empty value) are skipped.
    pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
        let pairs: Vec<&str> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .map(str::trim)
            .filter(|pair| {
                pair.split_once('=')
                    .is_some_and(|(name, value)| !name.trim().is_empty() && !value.is_empty())
            })
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Send a GET, retrying connect errors, timeouts and 5xx responses.
    async fn get_with_retry(
        &self,
        url: &Url,
        credential: &Credential,
    ) -> Result<Response, ClientError> {
        let mut attempt = 0;
        loop {
            let request = Self::authorize(self.client.get(url.clone()), credential);
            match request.send().await {
                Ok(resp) if resp.status().is_server_error() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::debug!(
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        status = %resp.status(),
                        path = url.path(),
                        "Retrying request after server error"
                    );
                    Self::sleep(delay).await;
                    attempt += 1;
                }
                Ok(resp) => return Ok(resp),
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::debug!(
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        path = url.path(),
                        "Retrying request after network error"
                    );
                    Self::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    async fn sleep(delay: Duration) {
        tokio::time::sleep(delay).await;
    }

    #[cfg(target_arch = "wasm32")]
    async fn sleep(_delay: Duration) {}

    /// Split a response into (status, body text).
    async fn read(resp: Response) -> Result<(StatusCode, String), ClientError> {
        let status = resp.status();
        let body = resp.text().await?;
        Ok((status, body))
    }

    /// Error for a non-2xx response on an authorised endpoint.
    fn authorised_error(status: StatusCode, body: &str) -> ClientError {
        let message = wire::server_message(body);
        if status == StatusCode::UNAUTHORIZED {
            return ClientError::SessionExpired(
                message.unwrap_or_else(|| SESSION_EXPIRED_MESSAGE.to_string()),
            );
        }
        ClientError::Api {
            status: status.as_u16(),
            message: message.unwrap_or_default(),
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl PortfolioBackend for HttpBackend {
    fn name(&self) -> &str {
        "HTTP"
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginReply, ClientError> {
        let url = self.endpoint(&["login"])?;
        let resp = self
            .client
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        // On wasm32 the browser keeps the cookie and hides `Set-Cookie`.
        #[cfg(target_arch = "wasm32")]
        let cookie = Some(String::new());
        #[cfg(not(target_arch = "wasm32"))]
        let cookie = Self::session_cookie(resp.headers());
        let (status, body) = Self::read(resp).await?;

        if status.is_success() {
            // Cookie deployments may answer with an empty body.
            let parsed: LoginResponse = if body.trim().is_empty() {
                LoginResponse::default()
            } else {
                serde_json::from_str(&body).map_err(|e| {
                    ClientError::MalformedPayload(format!("Failed to parse login response: {e}"))
                })?
            };
            return Ok(LoginReply {
                message: parsed.message,
                token: parsed.token.filter(|t| !t.is_empty()),
                cookie,
            });
        }

        let message = wire::server_message(&body);
        if status.is_client_error() {
            Err(ClientError::InvalidCredentials(
                message.unwrap_or_else(|| GENERIC_LOGIN_FAILURE.to_string()),
            ))
        } else {
            Err(ClientError::Api {
                status: status.as_u16(),
                message: message.unwrap_or_default(),
            })
        }
    }

    async fn logout(&self, credential: &Credential) -> Result<(), ClientError> {
        let url = self.endpoint(&["logout"])?;
        let resp = Self::authorize(self.client.get(url), credential).send().await?;
        let (status, body) = Self::read(resp).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::authorised_error(status, &body))
        }
    }

    async fn fetch_portfolio(
        &self,
        credential: &Credential,
        username: &str,
    ) -> Result<Portfolio, ClientError> {
        let url = self.portfolio_url(username)?;
        let resp = self.get_with_retry(&url, credential).await?;
        let (status, body) = Self::read(resp).await?;
        if !status.is_success() {
            return Err(Self::authorised_error(status, &body));
        }
        wire::parse_portfolio(&body)
    }

    async fn fetch_history(
        &self,
        credential: &Credential,
        query: &EffectiveQuery,
    ) -> Result<Vec<PricePoint>, ClientError> {
        let url = self.history_url(query)?;
        let resp = self.get_with_retry(&url, credential).await?;
        let (status, body) = Self::read(resp).await?;
        if !status.is_success() {
            return Err(Self::authorised_error(status, &body));
        }
        wire::parse_history(&body)
    }

    async fn update_holding(
        &self,
        credential: &Credential,
        username: &str,
        request: &MutationRequest,
    ) -> Result<String, ClientError> {
        let url = self.endpoint(&["update_user"])?;
        let resp = Self::authorize(self.client.put(url), credential)
            .json(&UpdateUserRequest::new(username, request))
            .send()
            .await?;
        let (status, body) = Self::read(resp).await?;

        if status.is_success() {
            let message = serde_json::from_str::<MessageResponse>(&body)
                .ok()
                .and_then(MessageResponse::into_message);
            return Ok(message.unwrap_or_else(|| DEFAULT_UPDATE_MESSAGE.to_string()));
        }

        if status.is_client_error() && status != StatusCode::UNAUTHORIZED {
            return Err(ClientError::MutationRejected(
                wire::server_message(&body).unwrap_or_else(|| GENERIC_UPDATE_FAILURE.to_string()),
            ));
        }
        Err(Self::authorised_error(status, &body))
    }
}
