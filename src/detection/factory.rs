use super::backend::DetectionBackend;
use super::orchestrator::DetectionOrchestrator;
use super::resilient::{BackendResilience, RetryPolicy};
use super::vision::VisionPromptBackend;
use super::workflow::{CustomToolBackend, DirectApiBackend, WorkflowOptions};
use crate::config::{BackendKind, Settings};
use crate::error::AppError;
use tracing::info;

/// Builds detection backends and orchestrators from [`Settings`].
pub struct BackendFactory;

impl BackendFactory {
    /// An orchestrator over the configured backend chain. Fails on missing
    /// credentials before anything touches the network.
    pub fn create_orchestrator(settings: &Settings) -> Result<DetectionOrchestrator, AppError> {
        settings.validate()?;

        let mut chain = settings.backend_chain().into_iter();
        let primary = chain
            .next()
            .ok_or_else(|| AppError::Configuration("no detection backend configured".into()))?;

        let mut orchestrator = DetectionOrchestrator::new(Self::create_backend(primary, settings)?);
        for fallback in chain {
            orchestrator = orchestrator.with_fallback(Self::create_backend(fallback, settings)?);
        }

        info!(
            "Detection backends: {}",
            orchestrator.backend_names().join(" -> ")
        );
        Ok(orchestrator)
    }

    /// One backend with the configured timeout and retries applied.
    pub fn create_backend(
        kind: BackendKind,
        settings: &Settings,
    ) -> Result<Box<dyn DetectionBackend>, AppError> {
        let policy = RetryPolicy::from_settings(settings);
        let backend: Box<dyn DetectionBackend> = match kind {
            BackendKind::Workflow => {
                Box::new(CustomToolBackend::new(settings.workflow_endpoint()?)?.resilient(policy))
            }
            BackendKind::Direct => Box::new(
                DirectApiBackend::new(
                    settings.workflow_endpoint()?,
                    WorkflowOptions::from_settings(settings),
                )?
                .resilient(policy),
            ),
            BackendKind::Vision => {
                Box::new(VisionPromptBackend::new(settings.vision_endpoint()?)?.resilient(policy))
            }
        };
        Ok(backend)
    }
}
