use http::StatusCode;
use serde::Deserialize;

const DEFAULT_FAILURE: &str = "Request failed";

const fn default_success() -> bool {
    true
}

/// Standard response wrapper: `{ success, message, data }`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    #[must_use]
    pub fn message_or_default(&self) -> String {
        self.message.clone().unwrap_or_else(|| DEFAULT_FAILURE.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
    errors: Option<serde_json::Value>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        if let Some(m) = self.message.filter(|m| !m.trim().is_empty()) {
            return Some(m);
        }
        if let Some(e) = self.error.filter(|e| !e.trim().is_empty()) {
            return Some(e);
        }

        let details: Vec<String> = match self.errors? {
            serde_json::Value::Object(fields) => {
                fields.into_iter().filter_map(|(field, v)| v.as_str().map(|msg| format!("{field}: {msg}"))).collect()
            }
            serde_json::Value::Array(items) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            serde_json::Value::String(s) => vec![s],
            _ => Vec::new(),
        };

        if details.is_empty() { None } else { Some(details.join("; ")) }
    }
}

/// Best-effort human message for a failed response.
///
/// Prefers the server's error envelope, then a short plain-text body, then the status reason.
#[must_use]
pub fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body)
        && let Some(message) = parsed.into_message()
    {
        return message;
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() && !text.starts_with('<') && !text.starts_with('{') && text.len() <= 512 {
        return text.to_string();
    }

    status.canonical_reason().unwrap_or(DEFAULT_FAILURE).to_string()
}
