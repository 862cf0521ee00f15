pub mod config;
pub mod detection;
pub mod error;
pub mod gateway;
pub mod scoring;

pub use config::{BackendKind, Settings};
pub use detection::{
    BackendFactory, DetectionBackend, DetectionOrchestrator, DetectionRequest, GreenScoreReport,
    PhotoPayload, ResponseNormalizer,
};
pub use error::{ActionError, AppError, ValidationError};
pub use gateway::{ActionGateway, ActionInput};
pub use scoring::{ScoreBand, ScoreCalculator, ScoreResult, Unit};
