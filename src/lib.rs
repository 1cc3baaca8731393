#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use crate::api::ApiClient;
use crate::config::Config;
use crate::error::Result;
use crate::services::auth_service::AuthService;
use crate::storage::{FilePreferenceStore, PreferenceStore, TokenStore};
use crate::transport::{ExemptPaths, RequestAuthorizer, ReqwestTransport, SessionRefresher, TokenRefresher, Transport};
use std::sync::Arc;

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod storage;
pub mod telemetry;
pub mod transport;

/// Everything a running client needs, wired once at start-up.
///
/// There is no global session; pass this (or its parts) to whatever needs it.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub tokens: Arc<TokenStore>,
    pub api: ApiClient,
    pub auth: AuthService,
}

impl SessionContext {
    /// Logs out and releases the context.
    pub async fn teardown(self) {
        self.auth.logout().await;
    }
}

#[derive(Debug)]
pub struct ClientBuilder {
    config: Config,
    prefs: Option<Arc<dyn PreferenceStore>>,
    network: Option<Arc<dyn Transport>>,
    exempt: ExemptPaths,
}

impl ClientBuilder {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config, prefs: None, network: None, exempt: ExemptPaths::default() }
    }

    /// Overrides the file-backed preference store from the configuration.
    #[must_use]
    pub fn with_preference_store(mut self, prefs: Arc<dyn PreferenceStore>) -> Self {
        self.prefs = Some(prefs);
        self
    }

    /// Overrides the reqwest network transport.
    #[must_use]
    pub fn with_transport(mut self, network: Arc<dyn Transport>) -> Self {
        self.network = Some(network);
        self
    }

    #[must_use]
    pub fn with_exempt_paths(mut self, exempt: ExemptPaths) -> Self {
        self.exempt = exempt;
        self
    }

    /// Opens the token store and assembles the authorized pipeline:
    /// authorizer, then refresher, then the network.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub async fn build(self) -> Result<SessionContext> {
        let base_url = self.config.server.base_url.as_str();

        let prefs = match self.prefs {
            Some(prefs) => prefs,
            None => Arc::new(FilePreferenceStore::new(&self.config.storage.session_file)),
        };
        let network = match self.network {
            Some(network) => network,
            None => Arc::new(ReqwestTransport::new(&self.config.http)?),
        };

        let tokens = Arc::new(TokenStore::open(prefs).await);
        let exempt = Arc::new(self.exempt);
        let refresher = Arc::new(TokenRefresher::new(Arc::clone(&network), base_url, Arc::clone(&tokens))?);

        let pipeline: Arc<dyn Transport> = Arc::new(RequestAuthorizer::new(
            SessionRefresher::new(network, Arc::clone(&refresher), Arc::clone(&exempt)),
            Arc::clone(&tokens),
            Arc::clone(&exempt),
        ));

        let api = ApiClient::new(pipeline, exempt, base_url)?;
        let auth = AuthService::new(api.clone(), Arc::clone(&tokens), refresher);

        tracing::debug!(base_url = %base_url, logged_in = tokens.is_logged_in().await, "Session context ready");
        Ok(SessionContext { tokens, api, auth })
    }
}

/// Routes panics through tracing before the default hook runs.
pub fn setup_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(panic = %info, "Application panicked");
        default_hook(info);
    }));
}
