use crate::domain::session::{TokenPair, UserInfo};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Refresh {
    pub refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Logout {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct EmailAddress {
    pub email: String,
}

#[derive(Serialize)]
pub struct VerificationToken {
    pub token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
    pub token: String,
    pub new_password: String,
}

fn bearer() -> String {
    "Bearer".to_string()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
}

impl From<TokenResponse> for TokenPair {
    fn from(r: TokenResponse) -> Self {
        Self { access_token: r.access_token, refresh_token: r.refresh_token }
    }
}

/// The refresh endpoint answers with a bare token object; some deployments wrap it in an envelope.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum RefreshResponse {
    Wrapped { data: TokenResponse },
    Bare(TokenResponse),
}

impl From<RefreshResponse> for TokenPair {
    fn from(r: RefreshResponse) -> Self {
        match r {
            RefreshResponse::Wrapped { data } | RefreshResponse::Bare(data) => data.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
    pub user: User,
}

impl AuthData {
    #[must_use]
    pub fn tokens(&self) -> TokenPair {
        TokenPair::new(self.access_token.as_str(), self.refresh_token.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
}

impl From<User> for UserInfo {
    fn from(u: User) -> Self {
        Self { user_id: u.id, username: u.username, email: u.email }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Id {
    Text(String),
    Number(serde_json::Number),
}

fn id_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
