use crate::error::{ClientError, Result};
use crate::transport::{ExemptPaths, HttpRequest, HttpResponse, Transport};
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Method, StatusCode, Uri};
use schemas::envelope::{Envelope, error_message};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub mod schemas;

pub const API_PREFIX: &str = "/api/v1";

/// JSON client for the MedTrack REST API, sending through the authorized pipeline.
#[derive(Debug, Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    exempt: Arc<ExemptPaths>,
    base_url: String,
}

impl ApiClient {
    /// # Errors
    /// Returns `ClientError::InvalidRequest` if `base_url` is not an absolute URL.
    pub fn new(transport: Arc<dyn Transport>, exempt: Arc<ExemptPaths>, base_url: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let parsed: Uri =
            base_url.parse().map_err(|e| ClientError::InvalidRequest(format!("invalid base URL {base_url}: {e}")))?;
        if parsed.scheme().is_none() || parsed.authority().is_none() {
            return Err(ClientError::InvalidRequest(format!("base URL must be absolute: {base_url}")));
        }
        Ok(Self { transport, exempt, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds a request for `path` (relative to the base URL) with an optional JSON body.
    ///
    /// # Errors
    /// Returns an error if the body cannot be encoded or the URL is invalid.
    pub fn request<B: Serialize + ?Sized>(&self, method: Method, path: &str, body: Option<&B>) -> Result<HttpRequest> {
        let separator = if path.starts_with('/') { "" } else { "/" };
        let builder = http::Request::builder()
            .method(method)
            .uri(format!("{}{separator}{path}", self.base_url))
            .header(ACCEPT, "application/json");

        let request = match body {
            Some(body) => builder.header(CONTENT_TYPE, "application/json").body(Bytes::from(serde_json::to_vec(body)?))?,
            None => builder.body(Bytes::new())?,
        };
        Ok(request)
    }

    /// Sends a request and returns the raw response, whatever its status.
    ///
    /// # Errors
    /// Returns an error on transport failure or if the request cannot be built.
    pub async fn send<B: Serialize + ?Sized + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<HttpResponse> {
        let request = self.request(method, path, body)?;
        self.dispatch(request).await
    }

    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(method = %request.method(), path = %request.uri().path(), status = tracing::field::Empty),
        err(level = "debug")
    )]
    async fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.transport.send(request).await?;
        tracing::Span::current().record("status", response.status().as_u16());
        Ok(response)
    }

    /// Sends a request and maps error statuses, judging exemption on the
    /// path the request was actually sent to, without its query.
    async fn send_checked<B: Serialize + ?Sized + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<HttpResponse> {
        let request = self.request(method, path, body)?;
        let method = request.method().clone();
        let sent_path = request.uri().path().to_owned();
        let response = self.dispatch(request).await?;
        self.check(&method, &sent_path, response)
    }

    /// GETs `path` and decodes the JSON body.
    ///
    /// # Errors
    /// Returns `ClientError::Api` for error statuses and `ClientError::Decode` for unexpected bodies.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send_checked::<()>(Method::GET, path, None).await?;
        Ok(serde_json::from_slice(response.body())?)
    }

    /// POSTs a JSON body and decodes the JSON response.
    ///
    /// # Errors
    /// Returns `ClientError::Api` for error statuses and `ClientError::Decode` for unexpected bodies.
    pub async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self.send_checked(Method::POST, path, Some(body)).await?;
        Ok(serde_json::from_slice(response.body())?)
    }

    /// Sends a request whose response uses the `{ success, message, data }` envelope.
    ///
    /// A 2xx response with `success: false` is reported as `ClientError::Api`.
    ///
    /// # Errors
    /// Returns `ClientError::Api` for error statuses or unsuccessful envelopes.
    pub async fn envelope<B: Serialize + ?Sized + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Envelope<T>> {
        let response = self.send_checked(method, path, body).await?;
        let status = response.status();

        let envelope: Envelope<T> = if response.body().is_empty() {
            Envelope { success: true, message: None, data: None }
        } else {
            serde_json::from_slice(response.body())?
        };

        if !envelope.success {
            return Err(ClientError::Api { status, message: envelope.message_or_default() });
        }
        Ok(envelope)
    }

    /// # Errors
    /// Returns `ClientError::Api` for error statuses.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send_checked::<()>(Method::DELETE, path, None).await?;
        Ok(())
    }

    /// Maps error statuses to `ClientError`.
    ///
    /// A 401 on a protected path means the session is gone even after the
    /// refresh step. On an exempt path it is an ordinary server answer such
    /// as bad credentials, so its message is kept.
    fn check(&self, method: &Method, path: &str, response: HttpResponse) -> Result<HttpResponse> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED && !self.exempt.is_exempt(method, path) {
            tracing::debug!(path = %path, "Session rejected by server");
            return Err(ClientError::Unauthorized);
        }

        let message = error_message(status, response.body());
        tracing::debug!(path = %path, status = %status, message = %message, "API returned an error");
        Err(ClientError::Api { status, message })
    }
}
