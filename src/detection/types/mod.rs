mod photo;
mod request;
mod result;

pub use photo::{PhotoError, PhotoPayload};
pub use request::DetectionRequest;
pub use result::{AnnotatedImage, DetectionResult};

/// Backend-specific JSON, consumed once by the response normalizer.
pub type RawDetectionResponse = serde_json::Value;
