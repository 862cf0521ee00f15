use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// `reason` is the upstream's own explanation, already cleared of anything
    /// that must not reach a caller.
    #[error("Upstream returned {status}: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Upstream { status: u16, reason: Option<String> },
    #[error("Failed to parse backend response: {0}")]
    Parse(String),
    #[error("Cannot compute score: {0}")]
    Computation(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Backend did not respond within {0:?}")]
    Timeout(Duration),
    #[error("Request was cancelled")]
    Cancelled,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Network-level failures that may succeed on another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Transport(_) | AppError::Timeout(_))
    }

    /// The upstream's own explanation, when it gave one.
    pub fn upstream_reason(&self) -> Option<&str> {
        match self {
            AppError::Upstream {
                reason: Some(reason),
                ..
            } if !reason.is_empty() => Some(reason),
            _ => None,
        }
    }
}

// Only failures to reach the backend or move bytes are transient.
impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_builder() || e.is_redirect() {
            AppError::Configuration(e.to_string())
        } else if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
            AppError::Transport(e.to_string())
        } else {
            AppError::Parse(e.to_string())
        }
    }
}

impl From<::config::ConfigError> for AppError {
    fn from(e: ::config::ConfigError) -> Self {
        AppError::Configuration(e.to_string())
    }
}

/// Every failed field of a caller input, in the order the fields were checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationError {
    fields: IndexMap<String, Vec<String>>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut error = Self::new();
        error.add(field, message);
        error
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &IndexMap<String, Vec<String>> {
        &self.fields
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationError> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self
            .fields
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        write!(f, "{}", messages.join(", "))
    }
}

impl std::error::Error for ValidationError {}

/// What a caller of the gateway gets back when a request fails.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("{0}")]
    Invalid(ValidationError),
    #[error("{message}")]
    Failed { message: String },
}

impl ActionError {
    pub const GENERIC_FAILURE: &'static str = "Failed to calculate GreenScore.";

    pub fn failed(reason: Option<&str>) -> Self {
        let message = match reason {
            Some(reason) => format!("{} {}", Self::GENERIC_FAILURE, reason),
            None => Self::GENERIC_FAILURE.to_string(),
        };
        ActionError::Failed { message }
    }
}

#[derive(Serialize)]
struct ActionErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a ValidationError>,
}

impl Serialize for ActionError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = match self {
            ActionError::Invalid(validation) => ActionErrorBody {
                error: validation.to_string(),
                fields: Some(validation),
            },
            ActionError::Failed { message } => ActionErrorBody {
                error: message.clone(),
                fields: None,
            },
        };
        body.serialize(serializer)
    }
}
