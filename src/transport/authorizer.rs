use super::{ExemptPaths, HttpRequest, HttpResponse, Transport, bearer_header};
use crate::error::Result;
use crate::storage::TokenStore;
use async_trait::async_trait;
use http::header::AUTHORIZATION;
use std::sync::Arc;

/// Attaches the stored access token to every non-exempt request.
#[derive(Debug)]
pub struct RequestAuthorizer<T> {
    inner: T,
    tokens: Arc<TokenStore>,
    exempt: Arc<ExemptPaths>,
}

impl<T> RequestAuthorizer<T> {
    #[must_use]
    pub const fn new(inner: T, tokens: Arc<TokenStore>, exempt: Arc<ExemptPaths>) -> Self {
        Self { inner, tokens, exempt }
    }
}

#[async_trait]
impl<T: Transport> Transport for RequestAuthorizer<T> {
    async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        if self.exempt.is_exempt(request.method(), request.uri().path()) {
            tracing::trace!(path = %request.uri().path(), "Exempt path, sending without token");
            return self.inner.send(request).await;
        }

        match self.tokens.access_token().await {
            Some(token) => {
                request.headers_mut().insert(AUTHORIZATION, bearer_header(&token)?);
            }
            None => tracing::debug!(path = %request.uri().path(), "No access token stored, sending unauthenticated"),
        }

        self.inner.send(request).await
    }
}
