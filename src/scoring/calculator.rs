use super::unit::Unit;
use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// Trees per 1000 square feet needed for a full score.
pub const REFERENCE_DENSITY: f64 = 5.0;

const AREA_PER_DENSITY_UNIT: f64 = 1000.0;

/// Tree count and plot size awaiting a score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreInput {
    pub detected_trees: u64,
    /// Area in `unit`.
    pub land_area: f64,
    pub unit: Unit,
}

impl ScoreInput {
    pub fn canonical_area(&self) -> f64 {
        self.land_area * self.unit.canonical_factor()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub green_score: u8,
    /// The reference density, not the count this plot would need.
    pub trees_required: f64,
}

impl ScoreResult {
    pub fn band(&self) -> ScoreBand {
        ScoreBand::of(self.green_score)
    }
}

/// Coarse reading of a GreenScore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    Low,
    Moderate,
    High,
}

impl ScoreBand {
    pub fn of(score: u8) -> Self {
        match score {
            0..=39 => ScoreBand::Low,
            40..=69 => ScoreBand::Moderate,
            _ => ScoreBand::High,
        }
    }
}

pub struct ScoreCalculator;

impl ScoreCalculator {
    /// Scores `detected_trees` against a plot of `canonical_area` square feet.
    ///
    /// The percentage of the reference density is rounded half away from zero and
    /// clamped to `[0, 100]`. A non-positive or non-finite area is a
    /// [`AppError::Computation`], never an infinite ratio.
    pub fn compute(detected_trees: u64, canonical_area: f64) -> Result<ScoreResult, AppError> {
        let required = Self::required_for_plot(canonical_area)?;
        let ratio = detected_trees as f64 / required;
        let percentage = (ratio * 100.0).round();

        Ok(ScoreResult {
            green_score: percentage.clamp(0.0, 100.0) as u8,
            trees_required: REFERENCE_DENSITY,
        })
    }

    pub fn score(input: &ScoreInput) -> Result<ScoreResult, AppError> {
        Self::compute(input.detected_trees, input.canonical_area())
    }

    /// Trees this specific plot needs for a full score.
    pub(crate) fn required_for_plot(canonical_area: f64) -> Result<f64, AppError> {
        if !canonical_area.is_finite() || canonical_area <= 0.0 {
            return Err(AppError::Computation(format!(
                "land area must be a positive finite number, got {}",
                canonical_area
            )));
        }
        Ok(canonical_area / AREA_PER_DENSITY_UNIT * REFERENCE_DENSITY)
    }
}
