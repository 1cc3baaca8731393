use crate::error::{ClientError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use std::sync::Arc;

pub mod authorizer;
pub mod exempt;
pub mod refresher;
pub mod reqwest_transport;
#[cfg(test)]
pub(crate) mod testing;

pub use authorizer::RequestAuthorizer;
pub use exempt::ExemptPaths;
pub use refresher::{RefreshOutcome, SessionRefresher, TokenRefresher};
pub use reqwest_transport::ReqwestTransport;

pub type HttpRequest = http::Request<Bytes>;
pub type HttpResponse = http::Response<Bytes>;

const BEARER_PREFIX: &str = "Bearer ";

/// One hop of the outbound request pipeline.
///
/// Every HTTP status is an `Ok` response; only transport failures are errors.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Sends a request and buffers the whole response body.
    ///
    /// # Errors
    /// Returns `ClientError::Network` on connection failures and timeouts.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).send(request).await
    }
}

/// Builds the `Authorization` value for an access token.
///
/// # Errors
/// Returns `ClientError::InvalidRequest` if the token contains bytes not allowed in a header.
pub fn bearer_header(access_token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("{BEARER_PREFIX}{access_token}"))
        .map_err(|_| ClientError::InvalidRequest("access token is not a valid header value".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Access token carried by a request, if any.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION)?.to_str().ok()?.strip_prefix(BEARER_PREFIX)
}

/// Copies everything needed to send the request again. Extensions are not carried over.
#[must_use]
pub fn duplicate(request: &HttpRequest) -> HttpRequest {
    let mut copy = http::Request::new(request.body().clone());
    *copy.method_mut() = request.method().clone();
    *copy.uri_mut() = request.uri().clone();
    *copy.version_mut() = request.version();
    *copy.headers_mut() = request.headers().clone();
    copy
}
