//! Caller-facing entry point: checks raw input, runs the orchestrator, and
//! turns internal failures into messages safe to show a user.

use crate::detection::{
    DetectionOrchestrator, DetectionRequest, GreenScoreReport, PhotoError, PhotoPayload,
};
use crate::error::{ActionError, AppError, ValidationError};
use crate::scoring::Unit;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Input as a form or JSON body delivers it. Numbers may arrive as strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionInput {
    #[serde(alias = "photoDataUri")]
    pub photo: Option<Value>,
    pub land_width: Option<Value>,
    pub land_height: Option<Value>,
    pub unit: Option<Value>,
}

pub struct ActionGateway {
    orchestrator: Arc<DetectionOrchestrator>,
}

impl ActionGateway {
    pub fn new(orchestrator: Arc<DetectionOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Validates every field and reports all failures at once.
    pub fn validate(input: &ActionInput) -> Result<DetectionRequest, ValidationError> {
        let mut errors = ValidationError::new();

        let photo = match input.photo.as_ref() {
            Some(Value::String(s)) => PhotoPayload::parse(s)
                .map_err(|e| errors.add("photo", e.to_string()))
                .ok(),
            Some(Value::Null) | None => {
                errors.add("photo", PhotoError::Empty.to_string());
                None
            }
            Some(_) => {
                errors.add("photo", "Photo must be an encoded image string.");
                None
            }
        };

        let land_width = coerce_dimension(input.land_width.as_ref(), "Width")
            .map_err(|message| errors.add("landWidth", message))
            .ok();
        let land_height = coerce_dimension(input.land_height.as_ref(), "Height")
            .map_err(|message| errors.add("landHeight", message))
            .ok();
        let unit = coerce_unit(input.unit.as_ref())
            .map_err(|message| errors.add("unit", message))
            .ok();

        if let (Some(width), Some(height), Some(unit)) = (land_width, land_height, unit) {
            let area = unit.to_canonical_area(width, height);
            if !area.is_finite() {
                errors.add("landArea", "Land area is too large.");
            } else if area <= 0.0 {
                errors.add("landArea", "Land area is too small.");
            }
        }

        match (photo, land_width, land_height, unit) {
            (Some(photo), Some(land_width), Some(land_height), Some(unit)) if errors.is_empty() => {
                Ok(DetectionRequest {
                    photo,
                    land_width,
                    land_height,
                    unit,
                })
            }
            _ => Err(errors),
        }
    }

    pub async fn handle(&self, input: ActionInput) -> Result<GreenScoreReport, ActionError> {
        let request = Self::validate(&input).map_err(|e| {
            warn!("Rejected GreenScore request: {}", e);
            ActionError::Invalid(e)
        })?;

        info!(
            "Scoring {} x {} {} plot",
            request.land_width, request.land_height, request.unit
        );
        self.orchestrator
            .run(&request)
            .await
            .map_err(to_action_error)
    }

    /// Like [`handle`](Self::handle) for an arbitrary JSON body.
    pub async fn handle_json(&self, body: Value) -> Result<GreenScoreReport, ActionError> {
        self.handle(parse_body(body)?).await
    }

    /// Like [`handle`](Self::handle), abandoning the backend call once `cancel` fires.
    pub async fn handle_cancellable(
        &self,
        input: ActionInput,
        cancel: CancellationToken,
    ) -> Result<GreenScoreReport, ActionError> {
        let request = Self::validate(&input).map_err(ActionError::Invalid)?;
        self.orchestrator
            .run_cancellable(&request, cancel)
            .await
            .map_err(to_action_error)
    }

    /// Sends `{ "image": ... }` to the configured backend and returns its JSON untouched.
    pub async fn passthrough(&self, body: &Value) -> Result<Value, ActionError> {
        let photo = match body.get("image") {
            Some(Value::String(image)) if !image.trim().is_empty() => PhotoPayload::parse(image)
                .map_err(|e| ActionError::Invalid(ValidationError::single("image", e.to_string())))?,
            _ => {
                return Err(ActionError::Invalid(ValidationError::single(
                    "image",
                    "No image provided",
                )))
            }
        };

        let raw = self
            .orchestrator
            .detect_raw(&photo)
            .await
            .map_err(to_action_error)?;
        Ok(raw.response)
    }
}

fn parse_body(body: Value) -> Result<ActionInput, ActionError> {
    if !body.is_object() {
        return Err(ActionError::Invalid(ValidationError::single(
            "request",
            "Request body must be a JSON object.",
        )));
    }
    serde_json::from_value(body).map_err(|e| {
        ActionError::Invalid(ValidationError::single(
            "request",
            format!("Malformed request: {}", e),
        ))
    })
}

/// Numbers, or strings holding numbers, that are positive and finite.
fn coerce_dimension(value: Option<&Value>, label: &str) -> Result<f64, String> {
    let number = match value {
        None | Some(Value::Null) => return Err(format!("{} is required.", label)),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    }
    .ok_or_else(|| format!("{} must be a number.", label))?;

    if number.is_nan() || number <= 0.0 {
        return Err(format!("{} must be a positive number.", label));
    }
    if number.is_infinite() {
        return Err(format!("{} must be a finite number.", label));
    }
    Ok(number)
}

fn coerce_unit(value: Option<&Value>) -> Result<Unit, String> {
    match value {
        None | Some(Value::Null) => Err("Please select a unit.".to_string()),
        Some(Value::String(s)) => s
            .parse::<Unit>()
            .map_err(|_| "Unit must be one of: sqft, sqm.".to_string()),
        Some(_) => Err("Unit must be one of: sqft, sqm.".to_string()),
    }
}

/// Full detail goes to the log; the caller gets a generic message plus the
/// upstream's own reason when it gave one.
fn to_action_error(err: AppError) -> ActionError {
    error!("GreenScore request failed: {}", err);
    match err {
        AppError::Validation(validation) => ActionError::Invalid(validation),
        AppError::Computation(_) => ActionError::Invalid(ValidationError::single(
            "landArea",
            "Land area must be a positive number.",
        )),
        AppError::Cancelled => ActionError::Failed {
            message: "Request was cancelled.".to_string(),
        },
        other => ActionError::failed(other.upstream_reason()),
    }
}
