use super::backend::DetectionBackend;
use super::http::{build_client, read_json_response};
use super::types::{PhotoPayload, RawDetectionResponse};
use crate::config::{Settings, WorkflowEndpoint};
use crate::error::AppError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Body accepted by a detection workflow endpoint.
#[derive(Serialize)]
pub struct WorkflowRequest<'a> {
    api_key: &'a str,
    inputs: WorkflowInputs<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<WorkflowOptions>,
}

#[derive(Debug, Serialize)]
struct WorkflowInputs<'a> {
    image: WorkflowImage<'a>,
}

#[derive(Debug, Serialize)]
struct WorkflowImage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

impl<'a> WorkflowRequest<'a> {
    pub fn new(api_key: &'a str, photo: &'a PhotoPayload, options: Option<WorkflowOptions>) -> Self {
        Self {
            api_key,
            inputs: WorkflowInputs {
                image: WorkflowImage {
                    kind: "base64",
                    value: photo.base64_body(),
                },
            },
            options,
        }
    }
}

/// Rendering options a workflow applies to its visualization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WorkflowOptions {
    pub show_labels: bool,
    pub show_confidence: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
}

impl WorkflowOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            show_labels: settings.show_labels,
            show_confidence: settings.show_confidence,
            confidence_threshold: settings.confidence_threshold,
        }
    }
}

struct WorkflowClient {
    http: reqwest::Client,
    endpoint: WorkflowEndpoint,
}

impl WorkflowClient {
    fn new(endpoint: WorkflowEndpoint) -> Result<Self, AppError> {
        if endpoint.api_key.trim().is_empty() {
            return Err(AppError::Configuration(
                "workflow API key is empty".to_string(),
            ));
        }
        Ok(Self {
            http: build_client()?,
            endpoint,
        })
    }

    async fn post(
        &self,
        photo: &PhotoPayload,
        options: Option<WorkflowOptions>,
    ) -> Result<Value, AppError> {
        debug!(
            "Posting {} byte photo to workflow {}",
            photo.size(),
            self.endpoint.url
        );
        let body = WorkflowRequest::new(&self.endpoint.api_key, photo, options);
        let response = self
            .http
            .post(self.endpoint.url.clone())
            .json(&body)
            .send()
            .await?;
        read_json_response(response).await
    }
}

/// Sends the photo to a named detection workflow and expects workflow-shaped
/// output (`{ "outputs": [ ... ] }`).
pub struct CustomToolBackend {
    client: WorkflowClient,
}

impl CustomToolBackend {
    pub fn new(endpoint: WorkflowEndpoint) -> Result<Self, AppError> {
        Ok(Self {
            client: WorkflowClient::new(endpoint)?,
        })
    }
}

#[async_trait]
impl DetectionBackend for CustomToolBackend {
    async fn detect(&self, photo: &PhotoPayload) -> Result<RawDetectionResponse, AppError> {
        let response = self.client.post(photo, None).await?;
        if !response.get("outputs").is_some_and(Value::is_array) {
            warn!("Workflow response has no outputs array; the count will read as zero");
        }
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "workflow"
    }
}

/// Forwards the photo and rendering options to a workflow and hands back the
/// body exactly as received.
pub struct DirectApiBackend {
    client: WorkflowClient,
    options: WorkflowOptions,
}

impl DirectApiBackend {
    pub fn new(endpoint: WorkflowEndpoint, options: WorkflowOptions) -> Result<Self, AppError> {
        Ok(Self {
            client: WorkflowClient::new(endpoint)?,
            options,
        })
    }
}

#[async_trait]
impl DetectionBackend for DirectApiBackend {
    async fn detect(&self, photo: &PhotoPayload) -> Result<RawDetectionResponse, AppError> {
        self.client.post(photo, Some(self.options)).await
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde_json::json;

    fn photo() -> PhotoPayload {
        let body = STANDARD.encode(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR");
        PhotoPayload::parse(&format!("data:image/png;base64,{}", body)).unwrap()
    }

    #[test]
    fn test_request_body_strips_data_uri_and_omits_absent_options() {
        let photo = photo();
        let body = serde_json::to_value(WorkflowRequest::new("key", &photo, None)).unwrap();
        assert_eq!(
            body,
            json!({
                "api_key": "key",
                "inputs": { "image": { "type": "base64", "value": photo.base64_body() } }
            })
        );
    }

    #[test]
    fn test_request_body_with_options() {
        let photo = photo();
        let options = WorkflowOptions {
            show_labels: false,
            show_confidence: false,
            confidence_threshold: Some(0.2),
        };
        let body = serde_json::to_value(WorkflowRequest::new("key", &photo, Some(options))).unwrap();
        assert_eq!(
            body["options"],
            json!({ "show_labels": false, "show_confidence": false, "confidence_threshold": 0.2 })
        );

        let body = serde_json::to_value(WorkflowRequest::new(
            "key",
            &photo,
            Some(WorkflowOptions::default()),
        ))
        .unwrap();
        assert_eq!(
            body["options"],
            json!({ "show_labels": false, "show_confidence": false })
        );
    }

    #[test]
    fn test_empty_key_fails_before_any_request() {
        let endpoint = WorkflowEndpoint {
            url: "http://127.0.0.1:9/workflow".parse().unwrap(),
            api_key: " ".to_string(),
        };
        assert!(matches!(
            CustomToolBackend::new(endpoint),
            Err(AppError::Configuration(_))
        ));
    }
}
