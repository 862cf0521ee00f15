use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Square feet in one square meter.
pub const SQFT_PER_SQM: f64 = 10.764;

/// Unit a caller's land dimensions are expressed in.
///
/// Square feet is the canonical unit: all density math happens in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "sqft")]
    SquareFeet,
    #[serde(rename = "sqm")]
    SquareMeters,
}

impl Unit {
    pub const ALL: [Unit; 2] = [Unit::SquareFeet, Unit::SquareMeters];

    pub fn as_str(self) -> &'static str {
        match self {
            Unit::SquareFeet => "sqft",
            Unit::SquareMeters => "sqm",
        }
    }

    /// Multiplier taking an area in this unit to square feet.
    pub fn canonical_factor(self) -> f64 {
        match self {
            Unit::SquareFeet => 1.0,
            Unit::SquareMeters => SQFT_PER_SQM,
        }
    }

    /// Area of a `width` x `height` plot in square feet. No rounding.
    pub fn to_canonical_area(self, width: f64, height: f64) -> f64 {
        width * height * self.canonical_factor()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownUnit(pub String);

impl fmt::Display for UnknownUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown unit '{}', expected sqft or sqm", self.0)
    }
}

impl std::error::Error for UnknownUnit {}

impl FromStr for Unit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::ALL
            .into_iter()
            .find(|unit| unit.as_str() == s)
            .ok_or_else(|| UnknownUnit(s.to_string()))
    }
}

pub fn to_canonical_area(width: f64, height: f64, unit: Unit) -> f64 {
    unit.to_canonical_area(width, height)
}
