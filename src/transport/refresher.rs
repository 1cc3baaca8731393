use super::exempt::{REFRESH_TOKEN_PATH, is_refresh_call};
use super::{ExemptPaths, HttpRequest, HttpResponse, Transport, bearer_header, bearer_token, duplicate};
use crate::api::schemas::auth::{Refresh, RefreshResponse};
use crate::api::schemas::envelope::error_message;
use crate::domain::session::TokenPair;
use crate::error::{ClientError, Result};
use crate::storage::TokenStore;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{Method, StatusCode, Uri};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    refresh_total: Counter<u64>,
    retry_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("medtrack-session");
        Self {
            refresh_total: meter
                .u64_counter("session_refresh_total")
                .with_description("Token refresh attempts by outcome")
                .build(),
            retry_total: meter
                .u64_counter("session_retry_total")
                .with_description("Requests replayed after a token refresh")
                .build(),
        }
    }
}

/// Result of asking the [`TokenRefresher`] for a usable access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The endpoint issued a new pair, which is now stored.
    Refreshed(String),
    /// Another caller refreshed while this one waited; the stored token is newer than the rejected one.
    AlreadyRefreshed(String),
    /// No refresh token is stored.
    NoRefreshToken,
    /// The exchange failed and the session was cleared.
    Failed,
}

/// Exchanges the stored refresh token for a new pair.
///
/// Only one exchange runs at a time. A caller that queued behind a
/// successful exchange reuses its result instead of issuing another call.
/// The exchange runs on its own task, so a caller that gives up does not
/// abandon a rotation the server has already performed.
#[derive(Debug)]
pub struct TokenRefresher {
    exchange: Exchange,
}

#[derive(Debug, Clone)]
struct Exchange {
    network: Arc<dyn Transport>,
    refresh_uri: Uri,
    tokens: Arc<TokenStore>,
    in_flight: Arc<Mutex<()>>,
    metrics: Metrics,
}

impl TokenRefresher {
    /// Creates a refresher that calls the refresh endpoint under `base_url`.
    ///
    /// `network` must be the raw transport, not the authorized pipeline.
    ///
    /// # Errors
    /// Returns `ClientError::InvalidRequest` if the endpoint URL cannot be parsed.
    pub fn new(network: Arc<dyn Transport>, base_url: &str, tokens: Arc<TokenStore>) -> Result<Self> {
        let refresh_uri = format!("{}{REFRESH_TOKEN_PATH}", base_url.trim_end_matches('/'))
            .parse::<Uri>()
            .map_err(|e| ClientError::InvalidRequest(format!("invalid base URL {base_url}: {e}")))?;
        let exchange =
            Exchange { network, refresh_uri, tokens, in_flight: Arc::new(Mutex::new(())), metrics: Metrics::new() };
        Ok(Self { exchange })
    }

    /// Obtains a fresh access token after `rejected` was refused by the server.
    ///
    /// On a failed exchange the stored session is cleared.
    #[tracing::instrument(level = "debug", skip_all, fields(outcome = tracing::field::Empty))]
    pub async fn refresh(&self, rejected: Option<&str>) -> RefreshOutcome {
        let task = self.exchange.clone().run(rejected.map(str::to_owned));
        match tokio::spawn(task.in_current_span()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Token refresh task aborted");
                RefreshOutcome::Failed
            }
        }
    }
}

impl Exchange {
    async fn run(self, rejected: Option<String>) -> RefreshOutcome {
        let _guard = self.in_flight.lock().await;

        let outcome = self.refresh_locked(rejected.as_deref()).await;
        let label = match &outcome {
            RefreshOutcome::Refreshed(_) => "success",
            RefreshOutcome::AlreadyRefreshed(_) => "coalesced",
            RefreshOutcome::NoRefreshToken => "no_refresh_token",
            RefreshOutcome::Failed => "failure",
        };
        tracing::Span::current().record("outcome", label);
        self.metrics.refresh_total.add(1, &[KeyValue::new("outcome", label)]);
        outcome
    }

    async fn refresh_locked(&self, rejected: Option<&str>) -> RefreshOutcome {
        if let Some(current) = self.tokens.access_token().await
            && Some(current.as_str()) != rejected
        {
            tracing::debug!("Access token already replaced by a concurrent refresh");
            return RefreshOutcome::AlreadyRefreshed(current);
        }

        let Some(refresh_token) = self.tokens.refresh_token().await else {
            tracing::debug!("No refresh token stored, cannot refresh");
            return RefreshOutcome::NoRefreshToken;
        };

        match self.exchange(refresh_token).await {
            Ok(tokens) => {
                self.tokens.save_token_pair(&tokens).await;
                tracing::info!("Access token refreshed");
                RefreshOutcome::Refreshed(tokens.access_token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, clearing session");
                self.tokens.clear_tokens().await;
                RefreshOutcome::Failed
            }
        }
    }

    async fn exchange(&self, refresh_token: String) -> Result<TokenPair> {
        let body = serde_json::to_vec(&Refresh { refresh_token })?;
        let request = http::Request::builder()
            .method(Method::POST)
            .uri(self.refresh_uri.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(Bytes::from(body))?;

        let response = self.network.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Api { status, message: error_message(status, response.body()) });
        }

        let parsed: RefreshResponse = serde_json::from_slice(response.body())?;
        Ok(parsed.into())
    }
}

/// Recovers from an expired access token by refreshing once and replaying the request.
#[derive(Debug)]
pub struct SessionRefresher<T> {
    inner: T,
    refresher: Arc<TokenRefresher>,
    exempt: Arc<ExemptPaths>,
    metrics: Metrics,
}

impl<T> SessionRefresher<T> {
    #[must_use]
    pub fn new(inner: T, refresher: Arc<TokenRefresher>, exempt: Arc<ExemptPaths>) -> Self {
        Self { inner, refresher, exempt, metrics: Metrics::new() }
    }
}

#[async_trait]
impl<T: Transport> Transport for SessionRefresher<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let path = request.uri().path();
        if is_refresh_call(path) || self.exempt.is_exempt(request.method(), path) {
            return self.inner.send(request).await;
        }

        let replay = duplicate(&request);
        let rejected = bearer_token(request.headers()).map(str::to_owned);

        let response = self.inner.send(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::debug!(path = %replay.uri().path(), "Request unauthorized, attempting token refresh");

        match self.refresher.refresh(rejected.as_deref()).await {
            RefreshOutcome::Refreshed(token) | RefreshOutcome::AlreadyRefreshed(token) => {
                let mut retry = replay;
                retry.headers_mut().insert(AUTHORIZATION, bearer_header(&token)?);
                self.metrics.retry_total.add(1, &[]);
                self.inner.send(retry).await
            }
            RefreshOutcome::NoRefreshToken | RefreshOutcome::Failed => Ok(response),
        }
    }
}
