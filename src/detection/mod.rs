pub mod backend;
pub mod factory;
mod http;
pub mod orchestrator;
pub mod resilient;
pub mod response;
pub mod types;
pub mod vision;
pub mod workflow;

pub use backend::DetectionBackend;
pub use factory::BackendFactory;
pub use orchestrator::{DetectionOrchestrator, GreenScoreReport, RawDetection};
pub use resilient::{BackendResilience, ResilientBackend, RetryPolicy};
pub use response::{CountRule, ImageRule, ResponseNormalizer};
pub use types::{
    AnnotatedImage, DetectionRequest, DetectionResult, PhotoError, PhotoPayload,
    RawDetectionResponse,
};
pub use vision::VisionPromptBackend;
pub use workflow::{CustomToolBackend, DirectApiBackend, WorkflowOptions, WorkflowRequest};
