use super::backend::DetectionBackend;
use super::http::{build_client, read_json_response};
use super::types::{PhotoPayload, RawDetectionResponse};
use crate::config::VisionEndpoint;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

pub const TREE_COUNT_PROMPT: &str = "You are an AI that analyzes images of land areas to detect trees. \
Analyze the image provided and count the trees present. \
Respond with a JSON object only, in the form {\"numberOfTrees\": <integer>}.";

/// Asks a general vision model to count the trees.
///
/// The model's structured answer is returned under `model_output`, e.g.
/// `{ "model_output": { "numberOfTrees": 4 } }`.
pub struct VisionPromptBackend {
    http: reqwest::Client,
    endpoint: VisionEndpoint,
}

impl VisionPromptBackend {
    pub fn new(endpoint: VisionEndpoint) -> Result<Self, AppError> {
        if endpoint.api_key.trim().is_empty() {
            return Err(AppError::Configuration(
                "vision API key is empty".to_string(),
            ));
        }
        Ok(Self {
            http: build_client()?,
            endpoint,
        })
    }

    fn payload(&self, photo: &PhotoPayload) -> Value {
        json!({
            "model": self.endpoint.model,
            "input": [{
                "role": "user",
                "content": [
                    {"type": "input_text", "text": TREE_COUNT_PROMPT},
                    {"type": "input_image", "image_url": photo.to_data_uri()},
                ],
            }],
            "text": {"format": {"type": "json_object"}},
        })
    }
}

#[async_trait]
impl DetectionBackend for VisionPromptBackend {
    async fn detect(&self, photo: &PhotoPayload) -> Result<RawDetectionResponse, AppError> {
        debug!(
            "Asking {} to count trees in {} byte photo",
            self.endpoint.model,
            photo.size()
        );
        let response = self
            .http
            .post(self.endpoint.url.clone())
            .bearer_auth(&self.endpoint.api_key)
            .json(&self.payload(photo))
            .send()
            .await?;
        let body = read_json_response(response).await?;

        let text = output_text(&body);
        if text.is_empty() {
            return Err(AppError::Parse("model returned no output text".to_string()));
        }
        let structured: Value = serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| AppError::Parse(format!("model output is not JSON: {}", e)))?;

        Ok(json!({ "model_output": structured }))
    }

    fn name(&self) -> &'static str {
        "vision"
    }
}

/// Concatenated text of a responses-API body: `output_text` when present,
/// otherwise every text chunk of every output message.
fn output_text(response: &Value) -> String {
    if let Some(text) = response.get("output_text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return text.trim().to_string();
        }
    }

    let mut parts: Vec<&str> = Vec::new();
    let rows = response
        .get("output")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for row in rows {
        let content = row
            .get("content")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for chunk in content {
            let kind = chunk.get("type").and_then(Value::as_str);
            if !matches!(kind, Some("output_text") | Some("text")) {
                continue;
            }
            if let Some(text) = chunk.get("text").and_then(Value::as_str) {
                if !text.trim().is_empty() {
                    parts.push(text.trim());
                }
            }
        }
    }
    parts.join("\n")
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}
