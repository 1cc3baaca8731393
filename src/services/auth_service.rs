use crate::api::schemas::auth::{
    AuthData, EmailAddress, Login, Logout, PasswordReset, Registration, User, VerificationToken,
};
use crate::api::{API_PREFIX, ApiClient};
use crate::domain::session::UserInfo;
use crate::error::{ClientError, Result};
use crate::storage::TokenStore;
use crate::transport::{RefreshOutcome, TokenRefresher};
use http::Method;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;

#[derive(Clone, Debug)]
struct Metrics {
    login_total: Counter<u64>,
    logout_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("medtrack-session");
        Self {
            login_total: meter
                .u64_counter("auth_login_total")
                .with_description("Login and registration attempts by outcome")
                .build(),
            logout_total: meter
                .u64_counter("auth_logout_total")
                .with_description("Logouts by scope")
                .build(),
        }
    }
}

fn path(endpoint: &str) -> String {
    format!("{API_PREFIX}{endpoint}")
}

/// Account and session use cases on top of the API client and token store.
#[derive(Clone, Debug)]
pub struct AuthService {
    api: ApiClient,
    tokens: Arc<TokenStore>,
    refresher: Arc<TokenRefresher>,
    metrics: Metrics,
}

impl AuthService {
    #[must_use]
    pub fn new(api: ApiClient, tokens: Arc<TokenStore>, refresher: Arc<TokenRefresher>) -> Self {
        Self { api, tokens, refresher, metrics: Metrics::new() }
    }

    /// Logs in and persists the returned session.
    ///
    /// # Errors
    /// Returns `ClientError::Api` with the server's message for rejected credentials.
    #[tracing::instrument(skip(self, username_or_email, password), fields(user_id = tracing::field::Empty), err(level = "warn"))]
    pub async fn login(&self, username_or_email: &str, password: &str) -> Result<UserInfo> {
        let body = Login { username_or_email: username_or_email.to_string(), password: password.to_string() };
        let result = self.api.envelope::<_, AuthData>(Method::POST, &path("/auth/login"), Some(&body)).await;

        let data = match result {
            Ok(envelope) => envelope.data.ok_or_else(|| ClientError::Api {
                status: http::StatusCode::OK,
                message: "Login response did not contain a session".to_string(),
            }),
            Err(e) => Err(e),
        };

        let data = data.inspect_err(|_| self.metrics.login_total.add(1, &[KeyValue::new("outcome", "failure")]))?;
        let user = self.store_session(data).await;
        tracing::Span::current().record("user_id", tracing::field::display(&user.user_id));
        tracing::info!("Logged in");
        self.metrics.login_total.add(1, &[KeyValue::new("outcome", "success")]);
        Ok(user)
    }

    /// Registers an account. When the server hands out tokens straight away the
    /// session is stored and the user is returned; otherwise email verification
    /// is pending and `None` is returned.
    ///
    /// # Errors
    /// Returns `ClientError::Api` with the server's validation message.
    #[tracing::instrument(skip(self, registration), fields(username = %registration.username), err(level = "warn"))]
    pub async fn register(&self, registration: Registration) -> Result<Option<UserInfo>> {
        let envelope =
            self.api.envelope::<_, AuthData>(Method::POST, &path("/auth/register"), Some(&registration)).await?;

        match envelope.data {
            Some(data) => {
                tracing::info!("Registered and logged in");
                Ok(Some(self.store_session(data).await))
            }
            None => {
                tracing::info!(message = ?envelope.message, "Registered, verification pending");
                Ok(None)
            }
        }
    }

    /// # Errors
    /// Returns `ClientError::Api` if the server rejects the request.
    #[tracing::instrument(skip_all, err(level = "warn"))]
    pub async fn forgot_password(&self, email: &str) -> Result<String> {
        self.message_call("/auth/forgot-password", &EmailAddress { email: email.to_string() }).await
    }

    /// # Errors
    /// Returns `ClientError::Api` if the token is invalid or the password is rejected.
    #[tracing::instrument(skip_all, err(level = "warn"))]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<String> {
        let body = PasswordReset { token: token.to_string(), new_password: new_password.to_string() };
        self.message_call("/auth/reset-password", &body).await
    }

    /// # Errors
    /// Returns `ClientError::Api` if the token is invalid or expired.
    #[tracing::instrument(skip_all, err(level = "warn"))]
    pub async fn verify_email(&self, token: &str) -> Result<String> {
        self.message_call("/auth/verify-email", &VerificationToken { token: token.to_string() }).await
    }

    /// # Errors
    /// Returns `ClientError::Api` if the server rejects the request.
    #[tracing::instrument(skip_all, err(level = "warn"))]
    pub async fn resend_verification(&self, email: &str) -> Result<String> {
        self.message_call("/auth/resend-verification", &EmailAddress { email: email.to_string() }).await
    }

    /// Fetches the profile of the logged-in user and updates the stored identity.
    ///
    /// # Errors
    /// Returns `ClientError::NotLoggedIn` without a stored session and
    /// `ClientError::Unauthorized` if the server rejects it.
    #[tracing::instrument(skip(self), err(level = "debug"))]
    pub async fn current_user(&self) -> Result<UserInfo> {
        if !self.tokens.is_logged_in().await {
            return Err(ClientError::NotLoggedIn);
        }

        let envelope = self.api.envelope::<(), User>(Method::GET, &path("/users/me"), None).await?;
        let user: UserInfo = envelope
            .data
            .ok_or_else(|| ClientError::Api {
                status: http::StatusCode::OK,
                message: "Profile response did not contain a user".to_string(),
            })?
            .into();
        self.tokens.save_user_info(&user).await;
        Ok(user)
    }

    /// Forces a token exchange outside the request pipeline.
    ///
    /// # Errors
    /// Returns `ClientError::NotLoggedIn` if there is nothing to refresh and
    /// `ClientError::Unauthorized` if the exchange failed and the session was cleared.
    #[tracing::instrument(skip(self), err(level = "warn"))]
    pub async fn refresh_session(&self) -> Result<()> {
        let current = self.tokens.access_token().await;
        match self.refresher.refresh(current.as_deref()).await {
            RefreshOutcome::Refreshed(_) | RefreshOutcome::AlreadyRefreshed(_) => Ok(()),
            RefreshOutcome::NoRefreshToken => Err(ClientError::NotLoggedIn),
            RefreshOutcome::Failed => Err(ClientError::Unauthorized),
        }
    }

    /// Revokes the refresh token on the server, then clears local tokens regardless of the outcome.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.tokens.refresh_token().await {
            let body = Logout { refresh_token };
            if let Err(e) = self.api.envelope::<_, serde_json::Value>(Method::POST, &path("/auth/logout"), Some(&body)).await
            {
                tracing::warn!(error = %e, "Server-side logout failed, clearing local session anyway");
            }
        }
        self.tokens.clear_tokens().await;
        self.metrics.logout_total.add(1, &[KeyValue::new("scope", "device")]);
        tracing::info!("Logged out");
    }

    /// Signs out of every device and wipes all local preferences.
    #[tracing::instrument(skip(self))]
    pub async fn logout_everywhere(&self) {
        if self.tokens.access_token().await.is_some()
            && let Err(e) = self.api.envelope::<(), serde_json::Value>(Method::POST, &path("/auth/logout-all"), None).await
        {
            tracing::warn!(error = %e, "Server-side logout-all failed, wiping local data anyway");
        }
        self.tokens.clear_all_data().await;
        self.metrics.logout_total.add(1, &[KeyValue::new("scope", "everywhere")]);
        tracing::info!("Logged out everywhere");
    }

    async fn store_session(&self, data: AuthData) -> UserInfo {
        let tokens = data.tokens();
        let user = UserInfo::from(data.user);
        self.tokens.save_token_pair(&tokens).await;
        self.tokens.save_user_info(&user).await;
        user
    }

    async fn message_call<B: serde::Serialize + Sync>(&self, endpoint: &str, body: &B) -> Result<String> {
        let envelope = self.api.envelope::<_, serde_json::Value>(Method::POST, &path(endpoint), Some(body)).await?;
        Ok(envelope.message.unwrap_or_default())
    }
}
