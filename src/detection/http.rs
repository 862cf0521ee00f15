use crate::error::AppError;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

const LOGGED_BODY_LIMIT: usize = 2048;

const CREDENTIAL_MARKERS: [&str; 6] = ["api key", "api_key", "apikey", "token", "bearer", "sk-"];

pub(crate) fn build_client() -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .user_agent(concat!("greenscore/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Reads a backend response as JSON, turning non-2xx statuses into
/// [`AppError::Upstream`] carrying the body's reason when a caller may see it.
pub(crate) async fn read_json_response(response: reqwest::Response) -> Result<Value, AppError> {
    let status = response.status();
    let text = response.text().await?;
    debug!("Backend responded with {} ({} bytes)", status, text.len());

    let parsed = serde_json::from_str::<Value>(&text);

    if !status.is_success() {
        warn!(
            "Backend error {}: {}",
            status,
            truncate(&text, LOGGED_BODY_LIMIT)
        );
        let reason = parsed
            .ok()
            .as_ref()
            .and_then(upstream_message)
            .filter(|message| is_caller_safe(status, message));
        return Err(AppError::Upstream {
            status: status.as_u16(),
            reason,
        });
    }

    parsed.map_err(|e| {
        warn!("Backend returned non-JSON body: {}", truncate(&text, LOGGED_BODY_LIMIT));
        AppError::Parse(format!("response body is not valid JSON: {}", e))
    })
}

/// `error` as a string, `error.message`, or a top-level `message`.
pub(crate) fn upstream_message(body: &Value) -> Option<String> {
    let message = match body.get("error") {
        Some(Value::String(message)) => Some(message.as_str()),
        Some(Value::Object(error)) => error.get("message").and_then(Value::as_str),
        _ => body.get("message").and_then(Value::as_str),
    }?;
    let message = message.trim();
    if message.is_empty() {
        None
    } else {
        Some(message.to_string())
    }
}

/// Auth failures and anything naming a key stay in the logs.
fn is_caller_safe(status: StatusCode, message: &str) -> bool {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return false;
    }
    let lowered = message.to_lowercase();
    !CREDENTIAL_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
