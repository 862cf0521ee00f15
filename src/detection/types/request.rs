use super::photo::PhotoPayload;
use crate::scoring::Unit;

/// A validated request to score one parcel of land.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRequest {
    pub photo: PhotoPayload,
    pub land_width: f64,
    pub land_height: f64,
    pub unit: Unit,
}

impl DetectionRequest {
    /// Plot area in square feet.
    pub fn canonical_area(&self) -> f64 {
        self.unit.to_canonical_area(self.land_width, self.land_height)
    }
}
