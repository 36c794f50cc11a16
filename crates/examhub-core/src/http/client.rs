use std::sync::Arc;

use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use url::Url;

use crate::auth::SessionContext;
use crate::config::ApiConfig;

use super::request::{replay, ApiOrigin, RequestDescriptor};
use super::response::{error_message, ApiEnvelope, ApiResponse};
use super::{HttpError, HttpResult};

const USER_AGENT: &str = "examhub/0.1.0";

/// Endpoint exchanging a refresh token for a new access token.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// How the client resolved a request that came back 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefreshOutcome {
    /// The replay with the refreshed token succeeded.
    ReplaySuccess,
    /// The replay was sent and failed; its error is returned as-is.
    ReplayFailed,
    /// No refresh token was stored; the session was expired.
    NoRefreshToken,
    /// The refresh endpoint rejected the token or could not be reached.
    RefreshRejected,
    /// A redirect to login is already under way, nothing was attempted.
    RedirectPending,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshPayload {
    access_token: String,
    refresh_token: Option<String>,
}

/// REST client for the primary and analytics APIs.
///
/// Every request carries the stored access token. A 401 triggers at most one
/// token refresh and one replay of the failed request; concurrent failures
/// share a single refresh.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    config: ApiConfig,
    context: SessionContext,
    refresh_gate: Arc<Mutex<()>>,
}

impl ApiClient {
    pub fn new(config: ApiConfig, context: SessionContext) -> HttpResult<Self> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            config,
            context,
            refresh_gate: Arc::new(Mutex::new(())),
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub async fn get(&self, origin: ApiOrigin, path: &str) -> HttpResult<ApiResponse> {
        self.send(RequestDescriptor::new(Method::GET, origin, path))
            .await
    }

    pub async fn post(
        &self,
        origin: ApiOrigin,
        path: &str,
        body: Value,
    ) -> HttpResult<ApiResponse> {
        self.send(RequestDescriptor::new(Method::POST, origin, path).with_body(body))
            .await
    }

    pub async fn patch(
        &self,
        origin: ApiOrigin,
        path: &str,
        body: Value,
    ) -> HttpResult<ApiResponse> {
        self.send(RequestDescriptor::new(Method::PATCH, origin, path).with_body(body))
            .await
    }

    pub async fn delete(&self, origin: ApiOrigin, path: &str) -> HttpResult<ApiResponse> {
        self.send(RequestDescriptor::new(Method::DELETE, origin, path))
            .await
    }

    /// Issue `request`, attaching the current access token and recovering from a 401 once.
    pub async fn send(&self, request: RequestDescriptor) -> HttpResult<ApiResponse> {
        let request = self.authorize(request);
        match self.execute(&request).await {
            Err(err) if err.is_unauthorized() => {
                let (outcome, result) = self.recover_unauthorized(&request, err).await;
                tracing::debug!(path = %request.path, ?outcome, "resolved unauthorized response");
                result
            }
            other => other,
        }
    }

    fn authorize(&self, mut request: RequestDescriptor) -> RequestDescriptor {
        if request.bearer.is_none() {
            request.bearer = self.context.tokens().access_token();
        }
        request
    }

    async fn recover_unauthorized(
        &self,
        failed: &RequestDescriptor,
        original: HttpError,
    ) -> (RefreshOutcome, HttpResult<ApiResponse>) {
        if self.context.redirect().is_latched() {
            return (RefreshOutcome::RedirectPending, Err(original));
        }

        let token = match self.refresh_access_token(failed.bearer.as_deref()).await {
            Ok(token) => token,
            Err(outcome) => return (outcome, Err(original)),
        };

        let replayed = replay(failed, &token);
        match self.execute(&replayed).await {
            Ok(response) => (RefreshOutcome::ReplaySuccess, Ok(response)),
            Err(err) => (RefreshOutcome::ReplayFailed, Err(err)),
        }
    }

    /// Obtain a usable access token after `stale` was rejected.
    async fn refresh_access_token(&self, stale: Option<&str>) -> Result<String, RefreshOutcome> {
        let _gate = self.refresh_gate.lock().await;

        if self.context.redirect().is_latched() {
            return Err(RefreshOutcome::RedirectPending);
        }

        let tokens = self.context.tokens();
        if let Some(current) = tokens.access_token() {
            if stale != Some(current.as_str()) {
                tracing::debug!("access token already refreshed by a concurrent request");
                return Ok(current);
            }
        }

        let Some(refresh_token) = tokens.refresh_token() else {
            tracing::info!("no refresh token stored, expiring session");
            self.context.expire();
            return Err(RefreshOutcome::NoRefreshToken);
        };

        match self.request_refresh(&refresh_token).await {
            Ok(payload) => {
                let refresh = payload.refresh_token.unwrap_or(refresh_token);
                tokens.set_tokens(&payload.access_token, &refresh);
                tracing::debug!("access token refreshed");
                Ok(payload.access_token)
            }
            Err(err) => {
                tracing::warn!(error = %err, "token refresh failed, expiring session");
                self.context.expire();
                Err(RefreshOutcome::RefreshRejected)
            }
        }
    }

    // Goes straight to `execute` so a 401 here never recurses into another refresh.
    async fn request_refresh(&self, refresh_token: &str) -> HttpResult<RefreshPayload> {
        let request = RequestDescriptor::new(Method::POST, ApiOrigin::Primary, REFRESH_PATH)
            .with_body(json!({ "refreshToken": refresh_token }));
        let response = self.execute(&request).await?;
        let status = response.status();
        let envelope: ApiEnvelope<RefreshPayload> = response.json()?;
        match envelope.data {
            Some(payload) if envelope.success => Ok(payload),
            _ => Err(HttpError::Status {
                status,
                message: envelope.message,
            }),
        }
    }

    async fn execute(&self, request: &RequestDescriptor) -> HttpResult<ApiResponse> {
        let url = self.url_for(request)?;
        tracing::debug!(
            method = %request.method,
            %url,
            authorized = request.bearer.is_some(),
            "sending request"
        );

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .timeout(request.origin.timeout());
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(HttpError::Status {
                status,
                message: error_message(&text),
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok(ApiResponse::new(status, body))
    }

    fn url_for(&self, request: &RequestDescriptor) -> HttpResult<Url> {
        let base = request.origin.base_url(&self.config).trim_end_matches('/');
        let path = request.path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }
}
