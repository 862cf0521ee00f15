use super::types::{AnnotatedImage, DetectionResult, RawDetectionResponse};
use serde_json::Value;
use tracing::debug;

/// A place a backend may report its tree count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountRule {
    /// `outputs[0].trees.count`
    AggregateCount,
    /// Number of `outputs[0].predictions`, flat or nested one level.
    PredictionList,
    /// `outputs[0].count_objects`
    CountedObjects,
    /// `model_output.numberOfTrees` from the vision backend.
    ModelOutput,
}

impl CountRule {
    pub const PRIORITY: [CountRule; 4] = [
        CountRule::AggregateCount,
        CountRule::PredictionList,
        CountRule::CountedObjects,
        CountRule::ModelOutput,
    ];

    pub fn pointer(self) -> &'static str {
        match self {
            CountRule::AggregateCount => "/outputs/0/trees/count",
            CountRule::PredictionList => "/outputs/0/predictions",
            CountRule::CountedObjects => "/outputs/0/count_objects",
            CountRule::ModelOutput => "/model_output/numberOfTrees",
        }
    }

    /// The count at this rule's path, if one is there.
    pub fn apply(self, raw: &Value) -> Option<u64> {
        let value = raw.pointer(self.pointer())?;
        match self {
            CountRule::PredictionList => match value {
                Value::Array(items) => Some(items.len() as u64),
                Value::Object(map) => map
                    .get("predictions")
                    .and_then(Value::as_array)
                    .map(|items| items.len() as u64),
                _ => None,
            },
            _ => count_from(value),
        }
    }
}

/// Non-negative finite numbers only; fractional counts round to nearest.
fn count_from(value: &Value) -> Option<u64> {
    if let Some(count) = value.as_u64() {
        return Some(count);
    }
    let count = value.as_f64()?;
    if count.is_finite() && count >= 0.0 {
        Some(count.round() as u64)
    } else {
        None
    }
}

/// A place a backend may put its visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRule {
    /// `outputs[0].visualization`
    Visualization,
    /// `outputs[0].detection_visualization.value`
    DetectionVisualization,
}

impl ImageRule {
    pub const PRIORITY: [ImageRule; 2] = [ImageRule::Visualization, ImageRule::DetectionVisualization];

    pub fn pointer(self) -> &'static str {
        match self {
            ImageRule::Visualization => "/outputs/0/visualization",
            ImageRule::DetectionVisualization => "/outputs/0/detection_visualization/value",
        }
    }

    pub fn apply(self, raw: &Value) -> Option<AnnotatedImage> {
        let value = raw.pointer(self.pointer())?;
        // Workflow image outputs are either a bare string or `{ type, value }`.
        let image = match value {
            Value::String(s) => s.as_str(),
            Value::Object(map) => map.get("value").and_then(Value::as_str)?,
            _ => return None,
        };
        if image.is_empty() {
            None
        } else {
            Some(AnnotatedImage::new(image))
        }
    }
}

/// Pulls a tree count and optional visualization out of any backend's response.
///
/// Rules are evaluated in order and the first that resolves wins. A response with
/// no recognizable count is zero trees, not an error.
#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    count_rules: Vec<CountRule>,
    image_rules: Vec<ImageRule>,
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self {
            count_rules: CountRule::PRIORITY.to_vec(),
            image_rules: ImageRule::PRIORITY.to_vec(),
        }
    }
}

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count_rules(mut self, rules: Vec<CountRule>) -> Self {
        self.count_rules = rules;
        self
    }

    pub fn with_image_rules(mut self, rules: Vec<ImageRule>) -> Self {
        self.image_rules = rules;
        self
    }

    pub fn extract_count(&self, raw: &RawDetectionResponse) -> u64 {
        for rule in &self.count_rules {
            if let Some(count) = rule.apply(raw) {
                debug!("Tree count {} found by {:?}", count, rule);
                return count;
            }
        }
        debug!("No tree count in backend response, treating as zero");
        0
    }

    pub fn extract_annotated_image(&self, raw: &RawDetectionResponse) -> Option<AnnotatedImage> {
        self.image_rules.iter().find_map(|rule| rule.apply(raw))
    }

    pub fn normalize(&self, raw: &RawDetectionResponse) -> DetectionResult {
        DetectionResult {
            number_of_trees: self.extract_count(raw),
            annotated_image: self.extract_annotated_image(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_each_count_rule_in_isolation() {
        assert_eq!(
            CountRule::AggregateCount.apply(&json!({"outputs": [{"trees": {"count": 7}}]})),
            Some(7)
        );
        assert_eq!(
            CountRule::PredictionList.apply(&json!({"outputs": [{"predictions": [{}, {}, {}]}]})),
            Some(3)
        );
        assert_eq!(
            CountRule::PredictionList.apply(
                &json!({"outputs": [{"predictions": {"image": {}, "predictions": [{}, {}]}}]})
            ),
            Some(2)
        );
        assert_eq!(
            CountRule::CountedObjects.apply(&json!({"outputs": [{"count_objects": 12}]})),
            Some(12)
        );
        assert_eq!(
            CountRule::ModelOutput.apply(&json!({"model_output": {"numberOfTrees": 4}})),
            Some(4)
        );
    }

    #[test]
    fn test_first_listed_rule_wins() {
        let normalizer = ResponseNormalizer::new();
        let raw = json!({
            "outputs": [{
                "trees": {"count": 9},
                "predictions": [{}, {}],
                "count_objects": 30
            }]
        });
        assert_eq!(normalizer.extract_count(&raw), 9);

        let raw = json!({"outputs": [{"predictions": [{}, {}], "count_objects": 30}]});
        assert_eq!(normalizer.extract_count(&raw), 2);

        let raw = json!({"outputs": [{"count_objects": 30}], "model_output": {"numberOfTrees": 1}});
        assert_eq!(normalizer.extract_count(&raw), 30);
    }

    #[test]
    fn test_rule_order_is_configurable() {
        let normalizer = ResponseNormalizer::new()
            .with_count_rules(vec![CountRule::CountedObjects, CountRule::AggregateCount]);
        let raw = json!({"outputs": [{"trees": {"count": 9}, "count_objects": 30}]});
        assert_eq!(normalizer.extract_count(&raw), 30);
    }

    #[test]
    fn test_missing_count_is_zero() {
        let normalizer = ResponseNormalizer::new();
        assert_eq!(normalizer.extract_count(&json!({})), 0);
        assert_eq!(normalizer.extract_count(&json!({"outputs": []})), 0);
        assert_eq!(normalizer.extract_count(&json!(null)), 0);
        assert_eq!(normalizer.extract_count(&json!("text")), 0);
    }

    #[test]
    fn test_unusable_values_fall_through() {
        let normalizer = ResponseNormalizer::new();
        let raw = json!({"outputs": [{"trees": {"count": null}, "count_objects": 5}]});
        assert_eq!(normalizer.extract_count(&raw), 5);

        let raw = json!({"outputs": [{"trees": {"count": -3}, "count_objects": 5}]});
        assert_eq!(normalizer.extract_count(&raw), 5);

        let raw = json!({"outputs": [{"trees": {"count": "7"}, "predictions": "none"}]});
        assert_eq!(normalizer.extract_count(&raw), 0);

        let raw = json!({"outputs": [{"trees": {"count": 6.6}}]});
        assert_eq!(normalizer.extract_count(&raw), 7);
    }

    #[test]
    fn test_annotated_image_precedence_and_absence() {
        let normalizer = ResponseNormalizer::new();
        let raw = json!({
            "outputs": [{
                "visualization": {"type": "base64", "value": "first"},
                "detection_visualization": {"type": "base64", "value": "second"}
            }]
        });
        assert_eq!(
            normalizer.extract_annotated_image(&raw),
            Some(AnnotatedImage::new("first"))
        );

        let raw = json!({"outputs": [{"detection_visualization": {"value": "second"}}]});
        assert_eq!(
            normalizer.extract_annotated_image(&raw),
            Some(AnnotatedImage::new("second"))
        );

        let raw = json!({"outputs": [{"visualization": "", "count_objects": 1}]});
        assert_eq!(normalizer.extract_annotated_image(&raw), None);
        assert_eq!(normalizer.extract_annotated_image(&json!({})), None);
    }

    #[test]
    fn test_normalize_combines_both() {
        let raw = json!({"outputs": [{"count_objects": 3, "visualization": "abc"}]});
        assert_eq!(
            ResponseNormalizer::new().normalize(&raw),
            DetectionResult {
                number_of_trees: 3,
                annotated_image: Some(AnnotatedImage::new("abc")),
            }
        );
    }
}
