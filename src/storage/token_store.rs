use super::{PreferenceEdit, PreferenceStore};
use crate::domain::session::{Session, TokenPair, UserInfo};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub const KEY_ACCESS_TOKEN: &str = "access_token";
pub const KEY_REFRESH_TOKEN: &str = "refresh_token";
pub const KEY_USER_ID: &str = "user_id";
pub const KEY_USERNAME: &str = "username";
pub const KEY_EMAIL: &str = "email";
pub const KEY_IS_LOGGED_IN: &str = "is_logged_in";

const TRUE: &str = "true";
const FALSE: &str = "false";

/// Owner of the persisted session.
///
/// Reads never fail: a storage error is logged and reported as an absent
/// value. Writes are best effort and only logged on failure. The login state
/// watch is re-derived from storage after every write.
#[derive(Debug)]
pub struct TokenStore {
    prefs: Arc<dyn PreferenceStore>,
    logged_in: watch::Sender<bool>,
}

impl TokenStore {
    /// Opens the store and loads the current login state.
    pub async fn open(prefs: Arc<dyn PreferenceStore>) -> Self {
        let (logged_in, _) = watch::channel(false);
        let store = Self { prefs, logged_in };
        store.publish_login_state().await;
        store
    }

    /// Replaces both tokens and marks the session logged in.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn save_tokens(&self, access_token: &str, refresh_token: &str) {
        let edit = PreferenceEdit::new()
            .put(KEY_ACCESS_TOKEN, access_token)
            .put(KEY_REFRESH_TOKEN, refresh_token)
            .put(KEY_IS_LOGGED_IN, TRUE);
        self.write(edit, "save tokens").await;
    }

    pub async fn save_token_pair(&self, tokens: &TokenPair) {
        self.save_tokens(&tokens.access_token, &tokens.refresh_token).await;
    }

    #[tracing::instrument(level = "debug", skip(self, user), fields(user_id = %user.user_id))]
    pub async fn save_user_info(&self, user: &UserInfo) {
        let edit = PreferenceEdit::new()
            .put(KEY_USER_ID, user.user_id.as_str())
            .put(KEY_USERNAME, user.username.as_str())
            .put(KEY_EMAIL, user.email.as_str());
        self.write(edit, "save user info").await;
    }

    pub async fn access_token(&self) -> Option<String> {
        self.read(KEY_ACCESS_TOKEN).await
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.read(KEY_REFRESH_TOKEN).await
    }

    /// Stored identity, if every field is present.
    pub async fn user_info(&self) -> Option<UserInfo> {
        Some(UserInfo {
            user_id: self.read(KEY_USER_ID).await?,
            username: self.read(KEY_USERNAME).await?,
            email: self.read(KEY_EMAIL).await?,
        })
    }

    /// Full session view, if both tokens are present.
    pub async fn session(&self) -> Option<Session> {
        let tokens = TokenPair { access_token: self.access_token().await?, refresh_token: self.refresh_token().await? };
        Some(Session { tokens, user: self.user_info().await, logged_in: self.is_logged_in().await })
    }

    pub async fn is_logged_in(&self) -> bool {
        self.read(KEY_IS_LOGGED_IN).await.as_deref() == Some(TRUE)
    }

    /// Receiver that observes login state changes.
    #[must_use]
    pub fn login_state(&self) -> watch::Receiver<bool> {
        self.logged_in.subscribe()
    }

    #[must_use]
    pub fn login_state_stream(&self) -> WatchStream<bool> {
        WatchStream::new(self.logged_in.subscribe())
    }

    /// Drops tokens and identity and marks the session logged out.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn clear_tokens(&self) {
        let edit = PreferenceEdit::new()
            .remove(KEY_ACCESS_TOKEN)
            .remove(KEY_REFRESH_TOKEN)
            .remove(KEY_USER_ID)
            .remove(KEY_USERNAME)
            .remove(KEY_EMAIL)
            .put(KEY_IS_LOGGED_IN, FALSE);
        self.write(edit, "clear tokens").await;
    }

    /// Wipes the whole preference namespace.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn clear_all_data(&self) {
        if let Err(e) = self.prefs.clear().await {
            tracing::error!(error = %e, "Failed to clear preference data");
        }
        self.publish_login_state().await;
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.prefs.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to read preference, treating as absent");
                None
            }
        }
    }

    async fn write(&self, edit: PreferenceEdit, operation: &'static str) {
        if let Err(e) = self.prefs.edit(edit).await {
            tracing::error!(operation = operation, error = %e, "Failed to persist session data");
        }
        self.publish_login_state().await;
    }

    async fn publish_login_state(&self) {
        let logged_in = self.is_logged_in().await;
        self.logged_in.send_if_modified(|current| {
            if *current == logged_in {
                false
            } else {
                *current = logged_in;
                true
            }
        });
    }
}
