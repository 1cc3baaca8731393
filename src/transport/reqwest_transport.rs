use super::{HttpRequest, HttpResponse, Transport};
use crate::config::HttpConfig;
use crate::error::Result;
use async_trait::async_trait;
use http::header::HeaderValue;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The network hop: sends requests with reqwest and buffers the response.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client with the configured timeouts.
    ///
    /// # Errors
    /// Returns `ClientError::Network` if the TLS backend cannot be initialized.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        let request_id = match request.headers().get(REQUEST_ID_HEADER) {
            Some(existing) => existing.to_str().unwrap_or_default().to_string(),
            None => {
                let id = Uuid::now_v7().to_string();
                if let Ok(value) = HeaderValue::from_str(&id) {
                    request.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                id
            }
        };

        let span = tracing::debug_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id,
            status = tracing::field::Empty,
        );

        async move {
            let request = reqwest::Request::try_from(request)?;
            let response = self.client.execute(request).await.inspect_err(|e| {
                tracing::warn!(error = %e, timeout = e.is_timeout(), "Request failed");
            })?;

            let status = response.status();
            tracing::Span::current().record("status", status.as_u16());

            let mut builder = http::Response::builder().status(status).version(response.version());
            if let Some(headers) = builder.headers_mut() {
                headers.extend(response.headers().iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            let body = response.bytes().await?;
            tracing::debug!(bytes = body.len(), "Response received");
            Ok(builder.body(body)?)
        }
        .instrument(span)
        .await
    }
}
