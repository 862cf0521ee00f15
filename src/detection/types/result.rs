use serde::{Deserialize, Serialize};

/// Visualization of the detected trees as returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotatedImage(String);

impl AnnotatedImage {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Something an `<img src>` can display. Bare base64 is assumed to be JPEG,
    /// which is what detection workflows render.
    pub fn to_data_uri(&self) -> String {
        let value = self.0.as_str();
        if value.starts_with("data:") || value.starts_with("http://") || value.starts_with("https://")
        {
            value.to_string()
        } else {
            format!("data:image/jpeg;base64,{}", value)
        }
    }
}

/// Tree count extracted from a backend response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetectionResult {
    pub number_of_trees: u64,
    pub annotated_image: Option<AnnotatedImage>,
}
