use http::Method;
use regex::Regex;
use std::sync::LazyLock;

/// Path of the token exchange endpoint.
pub const REFRESH_TOKEN_PATH: &str = "/api/v1/auth/refresh-token";

const DEFAULT_FRAGMENTS: [&str; 7] = [
    "auth/login",
    "auth/register",
    "auth/forgot-password",
    "auth/reset-password",
    "auth/verify-email",
    "auth/resend-verification",
    "medicines/search",
];

#[allow(clippy::expect_used)]
static MEDICINE_BY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"medicines/\d+/?$").expect("medicine id pattern is valid"));

/// Request paths that are sent without a bearer token.
#[derive(Debug, Clone)]
pub struct ExemptPaths {
    fragments: Vec<String>,
}

impl Default for ExemptPaths {
    fn default() -> Self {
        Self { fragments: DEFAULT_FRAGMENTS.iter().map(ToString::to_string).collect() }
    }
}

impl ExemptPaths {
    /// Adds a path fragment matched by substring.
    #[must_use]
    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragments.push(fragment.into());
        self
    }

    /// Whether a request must go out unauthenticated.
    ///
    /// Fragments match anywhere in the path. The numeric medicine lookup is
    /// exempt for `GET` only.
    #[must_use]
    pub fn is_exempt(&self, method: &Method, path: &str) -> bool {
        self.fragments.iter().any(|f| path.contains(f.as_str())) || (*method == Method::GET && MEDICINE_BY_ID.is_match(path))
    }
}

/// Whether the request is the token exchange itself, which must never trigger a refresh.
#[must_use]
pub fn is_refresh_call(path: &str) -> bool {
    path.contains("auth/refresh-token")
}
