use crate::error::AppError;
use ::config::{Config, Environment, File};
use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_VISION_URL: &str = "https://api.openai.com/v1/responses";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";
pub const MAX_RETRIES: u32 = 10;
pub const MAX_RETRY_BACKOFF_MS: u64 = 60_000;

/// Which detection backend produces the tree count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Named detection workflow, response normalized by this crate.
    Workflow,
    /// General vision model asked to count trees.
    Vision,
    /// Workflow call that forwards display options and returns the body untouched.
    Direct,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Workflow => "workflow",
            BackendKind::Vision => "vision",
            BackendKind::Direct => "direct",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: BackendKind,
    pub fallback_backend: Option<BackendKind>,
    pub workflow_url: Option<String>,
    pub workflow_api_key: Option<String>,
    pub vision_url: String,
    pub vision_api_key: Option<String>,
    pub vision_model: String,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub show_labels: bool,
    pub show_confidence: bool,
    pub confidence_threshold: Option<f64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Workflow,
            fallback_backend: None,
            workflow_url: None,
            workflow_api_key: None,
            vision_url: DEFAULT_VISION_URL.to_string(),
            vision_api_key: None,
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            request_timeout_ms: 30_000,
            max_retries: 2,
            retry_backoff_ms: 250,
            show_labels: false,
            show_confidence: false,
            confidence_threshold: None,
        }
    }
}

/// Where and how to reach a detection workflow.
#[derive(Clone)]
pub struct WorkflowEndpoint {
    pub url: Url,
    pub api_key: String,
}

/// Where and how to reach a vision model.
#[derive(Clone)]
pub struct VisionEndpoint {
    pub url: Url,
    pub api_key: String,
    pub model: String,
}

// Keys stay out of logs.
impl fmt::Debug for WorkflowEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowEndpoint")
            .field("url", &self.url.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for VisionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionEndpoint")
            .field("url", &self.url.as_str())
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl Settings {
    /// Defaults, then `greenscore.toml` if present, then `GREENSCORE_*` variables.
    pub fn load() -> Result<Self, AppError> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name("greenscore").required(false))
            .add_source(Environment::with_prefix("GREENSCORE").try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks everything the selected backends will need before any request is served.
    pub fn validate(&self) -> Result<(), AppError> {
        for kind in self.backend_chain() {
            match kind {
                BackendKind::Workflow | BackendKind::Direct => {
                    self.workflow_endpoint()?;
                }
                BackendKind::Vision => {
                    self.vision_endpoint()?;
                }
            }
        }

        if self.request_timeout_ms == 0 {
            return Err(AppError::Configuration(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.max_retries > MAX_RETRIES {
            return Err(AppError::Configuration(format!(
                "max_retries must be at most {}",
                MAX_RETRIES
            )));
        }

        if self.retry_backoff_ms > MAX_RETRY_BACKOFF_MS {
            return Err(AppError::Configuration(format!(
                "retry_backoff_ms must be at most {}",
                MAX_RETRY_BACKOFF_MS
            )));
        }

        if let Some(threshold) = self.confidence_threshold {
            if !(threshold > 0.0 && threshold <= 1.0) {
                return Err(AppError::Configuration(
                    "confidence_threshold must be in (0, 1]".to_string(),
                ));
            }
        }

        if self.fallback_backend == Some(self.backend) {
            return Err(AppError::Configuration(
                "fallback_backend must differ from backend".to_string(),
            ));
        }

        Ok(())
    }

    /// Primary backend first, then the fallback if one is set.
    pub fn backend_chain(&self) -> Vec<BackendKind> {
        let mut chain = vec![self.backend];
        chain.extend(self.fallback_backend);
        chain
    }

    pub fn workflow_endpoint(&self) -> Result<WorkflowEndpoint, AppError> {
        let url = required(&self.workflow_url, "workflow_url")?;
        let api_key = required(&self.workflow_api_key, "workflow_api_key")?;
        Ok(WorkflowEndpoint {
            url: parse_url(url, "workflow_url")?,
            api_key: api_key.to_string(),
        })
    }

    pub fn vision_endpoint(&self) -> Result<VisionEndpoint, AppError> {
        let api_key = required(&self.vision_api_key, "vision_api_key")?;
        if self.vision_model.trim().is_empty() {
            return Err(AppError::Configuration(
                "vision_model must not be empty".to_string(),
            ));
        }
        Ok(VisionEndpoint {
            url: parse_url(&self.vision_url, "vision_url")?,
            api_key: api_key.to_string(),
            model: self.vision_model.clone(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str, AppError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::Configuration(format!(
            "GREENSCORE_{} is not set",
            key.to_uppercase()
        ))),
    }
}

fn parse_url(value: &str, key: &str) -> Result<Url, AppError> {
    Url::parse(value.trim())
        .map_err(|e| AppError::Configuration(format!("{} is not a valid URL: {}", key, e)))
}
