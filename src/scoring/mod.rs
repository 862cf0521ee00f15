pub mod calculator;
pub mod unit;

pub use calculator::{ScoreBand, ScoreCalculator, ScoreInput, ScoreResult, REFERENCE_DENSITY};
pub use unit::{to_canonical_area, Unit, UnknownUnit, SQFT_PER_SQM};
