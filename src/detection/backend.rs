use super::types::{PhotoPayload, RawDetectionResponse};
use crate::error::AppError;
use async_trait::async_trait;

/// Anything that can look at a photo and report on the trees in it.
///
/// One call is one outbound request. Implementations do not retry; wrap them in
/// [`ResilientBackend`](super::resilient::ResilientBackend) for that.
#[async_trait]
pub trait DetectionBackend: Send + Sync {
    async fn detect(&self, photo: &PhotoPayload) -> Result<RawDetectionResponse, AppError>;
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<B> DetectionBackend for Box<B>
where
    B: DetectionBackend + ?Sized,
{
    async fn detect(&self, photo: &PhotoPayload) -> Result<RawDetectionResponse, AppError> {
        (**self).detect(photo).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
