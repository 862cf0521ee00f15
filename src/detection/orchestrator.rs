use super::backend::DetectionBackend;
use super::response::ResponseNormalizer;
use super::types::{AnnotatedImage, DetectionRequest, DetectionResult, PhotoPayload, RawDetectionResponse};
use crate::error::AppError;
use crate::scoring::{ScoreBand, ScoreCalculator, ScoreResult};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A backend's untouched response and which backend produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub response: RawDetectionResponse,
    pub backend: &'static str,
}

/// Everything a caller learns about one scored plot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GreenScoreReport {
    pub number_of_trees: u64,
    pub green_score: u8,
    pub trees_required: f64,
    pub band: ScoreBand,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_image: Option<AnnotatedImage>,
    pub backend: &'static str,
}

impl GreenScoreReport {
    pub fn score(&self) -> ScoreResult {
        ScoreResult {
            green_score: self.green_score,
            trees_required: self.trees_required,
        }
    }
}

/// Runs one request through detection, normalization and scoring.
///
/// Holds an ordered chain of backends: the first is primary, the rest are tried
/// in turn only when the previous one failed transiently.
pub struct DetectionOrchestrator {
    backends: Vec<Box<dyn DetectionBackend>>,
    normalizer: ResponseNormalizer,
}

impl DetectionOrchestrator {
    pub fn new(primary: Box<dyn DetectionBackend>) -> Self {
        Self {
            backends: vec![primary],
            normalizer: ResponseNormalizer::default(),
        }
    }

    pub fn with_fallback(mut self, backend: Box<dyn DetectionBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn with_normalizer(mut self, normalizer: ResponseNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// The first successful backend response, untouched.
    pub async fn detect_raw(&self, photo: &PhotoPayload) -> Result<RawDetection, AppError> {
        let mut last_error = None;
        for backend in &self.backends {
            debug!("Calling detection backend {}", backend.name());
            match backend.detect(photo).await {
                Ok(response) => {
                    return Ok(RawDetection {
                        response,
                        backend: backend.name(),
                    })
                }
                Err(e) if e.is_transient() => {
                    warn!("Backend {} unavailable: {}", backend.name(), e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error
            .unwrap_or_else(|| AppError::Configuration("no detection backend configured".into())))
    }

    pub async fn detect(
        &self,
        photo: &PhotoPayload,
    ) -> Result<(DetectionResult, &'static str), AppError> {
        let raw = self.detect_raw(photo).await?;
        Ok((self.normalizer.normalize(&raw.response), raw.backend))
    }

    /// Scores one plot. The area is checked before any backend is called.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4(), unit = %request.unit))]
    pub async fn run(&self, request: &DetectionRequest) -> Result<GreenScoreReport, AppError> {
        let canonical_area = request.canonical_area();
        if !canonical_area.is_finite() || canonical_area <= 0.0 {
            return Err(AppError::Computation(format!(
                "land area of {} x {} {} is not a positive finite area",
                request.land_width, request.land_height, request.unit
            )));
        }

        let (detection, backend) = self.detect(&request.photo).await?;
        let score = ScoreCalculator::compute(detection.number_of_trees, canonical_area)?;

        info!(
            backend,
            trees = detection.number_of_trees,
            area_sqft = canonical_area,
            score = score.green_score,
            "GreenScore computed"
        );

        Ok(GreenScoreReport {
            number_of_trees: detection.number_of_trees,
            green_score: score.green_score,
            trees_required: score.trees_required,
            band: score.band(),
            annotated_image: detection.annotated_image,
            backend,
        })
    }

    /// Like [`run`](Self::run), abandoning the outbound call once `cancel` fires.
    pub async fn run_cancellable(
        &self,
        request: &DetectionRequest,
        cancel: CancellationToken,
    ) -> Result<GreenScoreReport, AppError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Request cancelled by caller");
                Err(AppError::Cancelled)
            }
            result = self.run(request) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Unit;
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct StaticBackend {
        response: Value,
        calls: Arc<AtomicUsize>,
    }

    impl StaticBackend {
        fn boxed(response: Value) -> (Box<dyn DetectionBackend>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let backend = Self {
                response,
                calls: calls.clone(),
            };
            (Box::new(backend), calls)
        }
    }

    #[async_trait]
    impl DetectionBackend for StaticBackend {
        async fn detect(&self, _photo: &PhotoPayload) -> Result<RawDetectionResponse, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }

        fn name(&self) -> &'static str {
            "static"
        }
    }

    struct FailingBackend(fn() -> AppError);

    #[async_trait]
    impl DetectionBackend for FailingBackend {
        async fn detect(&self, _photo: &PhotoPayload) -> Result<RawDetectionResponse, AppError> {
            Err((self.0)())
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct HangingBackend;

    #[async_trait]
    impl DetectionBackend for HangingBackend {
        async fn detect(&self, _photo: &PhotoPayload) -> Result<RawDetectionResponse, AppError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!({}))
        }

        fn name(&self) -> &'static str {
            "hanging"
        }
    }

    fn request(width: f64, height: f64, unit: Unit) -> DetectionRequest {
        DetectionRequest {
            photo: PhotoPayload::parse(&STANDARD.encode(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"))
                .unwrap(),
            land_width: width,
            land_height: height,
            unit,
        }
    }

    fn workflow_response(count: u64) -> Value {
        json!({"outputs": [{"count_objects": count, "detection_visualization": {"value": "img"}}]})
    }

    #[tokio::test]
    async fn test_run_composes_detection_and_score() {
        let (backend, _) = StaticBackend::boxed(workflow_response(5));
        let orchestrator = DetectionOrchestrator::new(backend);

        let report = orchestrator
            .run(&request(20.0, 50.0, Unit::SquareFeet))
            .await
            .unwrap();
        assert_eq!(report.number_of_trees, 5);
        assert_eq!(report.green_score, 100);
        assert_eq!(report.trees_required, 5.0);
        assert_eq!(report.band, ScoreBand::High);
        assert_eq!(report.annotated_image, Some(AnnotatedImage::new("img")));
        assert_eq!(report.backend, "static");
    }

    #[tokio::test]
    async fn test_square_meters_and_half_density() {
        let (backend, _) = StaticBackend::boxed(workflow_response(5));
        let orchestrator = DetectionOrchestrator::new(backend);

        let report = orchestrator
            .run(&request(10.0, 10.0, Unit::SquareMeters))
            .await
            .unwrap();
        assert_eq!(report.green_score, 93);

        let report = orchestrator
            .run(&request(40.0, 50.0, Unit::SquareFeet))
            .await
            .unwrap();
        assert_eq!(report.green_score, 50);
    }

    #[tokio::test]
    async fn test_identical_inputs_give_identical_reports() {
        let (backend, _) = StaticBackend::boxed(workflow_response(3));
        let orchestrator = DetectionOrchestrator::new(backend);
        let request = request(30.0, 30.0, Unit::SquareFeet);

        let first = orchestrator.run(&request).await.unwrap();
        let second = orchestrator.run(&request).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_zero_area_fails_without_calling_backend() {
        let (backend, calls) = StaticBackend::boxed(workflow_response(5));
        let orchestrator = DetectionOrchestrator::new(backend);

        let err = orchestrator
            .run(&request(0.0, 100.0, Unit::SquareFeet))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Computation(_)));

        let err = orchestrator
            .run(&request(1e200, 1e200, Unit::SquareMeters))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Computation(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_falls_back() {
        let (fallback, calls) = StaticBackend::boxed(workflow_response(2));
        let orchestrator = DetectionOrchestrator::new(Box::new(FailingBackend(|| {
            AppError::Transport("connection refused".into())
        })))
        .with_fallback(fallback);

        let report = orchestrator
            .run(&request(20.0, 50.0, Unit::SquareFeet))
            .await
            .unwrap();
        assert_eq!(report.number_of_trees, 2);
        assert_eq!(report.backend, "static");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_does_not_fall_back() {
        let (fallback, calls) = StaticBackend::boxed(workflow_response(2));
        let orchestrator = DetectionOrchestrator::new(Box::new(FailingBackend(|| {
            AppError::Upstream {
                status: 403,
                reason: Some("Forbidden".into()),
            }
        })))
        .with_fallback(fallback);

        let err = orchestrator
            .run(&request(20.0, 50.0, Unit::SquareFeet))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream { status: 403, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_last_transient_error_surfaces_when_chain_exhausted() {
        let orchestrator = DetectionOrchestrator::new(Box::new(FailingBackend(|| {
            AppError::Timeout(Duration::from_secs(1))
        })))
        .with_fallback(Box::new(FailingBackend(|| {
            AppError::Transport("dns failure".into())
        })));

        let err = orchestrator
            .run(&request(20.0, 50.0, Unit::SquareFeet))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Transport(_)));
    }

    #[tokio::test]
    async fn test_cancellation_abandons_the_call() {
        let orchestrator = DetectionOrchestrator::new(Box::new(HangingBackend));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = orchestrator
            .run_cancellable(&request(20.0, 50.0, Unit::SquareFeet), token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
    }

    #[tokio::test]
    async fn test_detect_raw_returns_body_untouched() {
        let body = json!({"outputs": [{"anything": [1, 2, 3]}], "profiler_trace": []});
        let (backend, _) = StaticBackend::boxed(body.clone());
        let orchestrator = DetectionOrchestrator::new(backend);

        let raw = orchestrator
            .detect_raw(&request(1.0, 1.0, Unit::SquareFeet).photo)
            .await
            .unwrap();
        assert_eq!(raw.response, body);
        assert_eq!(raw.backend, "static");
    }
}
