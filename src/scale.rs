//! Axis scales and the quadrant midpoint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// A closed integer interval for one axis, e.g. `1-5` or `0-10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScaleRange {
    min: i32,
    max: i32,
}

impl ScaleRange {
    pub fn new(min: i32, max: i32) -> Result<Self> {
        if min < 0 {
            return Err(EngineError::InvalidScale(format!(
                "minimum must not be negative, got {min}"
            )));
        }
        if min >= max {
            return Err(EngineError::InvalidScale(format!(
                "minimum ({min}) must be lower than maximum ({max})"
            )));
        }
        Ok(Self { min, max })
    }

    /// Parse the `"min-max"` notation used by import templates.
    pub fn parse(value: &str) -> Result<Self> {
        let (min, max) = value
            .trim()
            .split_once('-')
            .ok_or_else(|| EngineError::InvalidScale(format!("expected 'min-max', got '{value}'")))?;
        let min = min
            .trim()
            .parse::<i32>()
            .map_err(|_| EngineError::InvalidScale(format!("'{min}' is not an integer")))?;
        let max = max
            .trim()
            .parse::<i32>()
            .map_err(|_| EngineError::InvalidScale(format!("'{max}' is not an integer")))?;
        Self::new(min, max)
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    /// Number of cells between the two ends of the axis.
    pub fn span(&self) -> u32 {
        (self.max - self.min) as u32
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min as f64 && value <= self.max as f64
    }

    /// The arithmetic centre of the axis.
    pub fn centre(&self) -> f64 {
        (self.min + self.max) as f64 / 2.0
    }

    /// True when `value` lies strictly between the two ends.
    pub fn is_interior(&self, value: f64) -> bool {
        value.is_finite() && value > self.min as f64 && value < self.max as f64
    }
}

impl fmt::Display for ScaleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

impl FromStr for ScaleRange {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ScaleRange {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ScaleRange> for String {
    fn from(value: ScaleRange) -> Self {
        value.to_string()
    }
}

/// The satisfaction and loyalty scales of one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalePair {
    pub satisfaction: ScaleRange,
    pub loyalty: ScaleRange,
}

impl ScalePair {
    pub fn new(satisfaction: ScaleRange, loyalty: ScaleRange) -> Self {
        Self {
            satisfaction,
            loyalty,
        }
    }
}

/// The quadrant split. Values at or above a threshold count as "high".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Midpoint {
    pub satisfaction: f64,
    pub loyalty: f64,
}

impl Midpoint {
    /// Build a midpoint, rejecting thresholds that are not strictly inside both scales.
    pub fn new(satisfaction: f64, loyalty: f64, scales: &ScalePair) -> Result<Self> {
        let midpoint = Self {
            satisfaction,
            loyalty,
        };
        midpoint.validate(scales)?;
        Ok(midpoint)
    }

    pub fn default_for(scales: &ScalePair) -> Self {
        Self {
            satisfaction: scales.satisfaction.centre(),
            loyalty: scales.loyalty.centre(),
        }
    }

    pub fn validate(&self, scales: &ScalePair) -> Result<()> {
        if !scales.satisfaction.is_interior(self.satisfaction) {
            return Err(EngineError::InvalidMidpoint(format!(
                "satisfaction threshold {} must lie strictly inside {}",
                self.satisfaction, scales.satisfaction
            )));
        }
        if !scales.loyalty.is_interior(self.loyalty) {
            return Err(EngineError::InvalidMidpoint(format!(
                "loyalty threshold {} must lie strictly inside {}",
                self.loyalty, scales.loyalty
            )));
        }
        Ok(())
    }

    /// Parse `"sat,loy"`.
    pub fn parse_pair(value: &str) -> Result<(f64, f64)> {
        let (sat, loy) = value.split_once(',').ok_or_else(|| {
            EngineError::InvalidMidpoint(format!("expected 'satisfaction,loyalty', got '{value}'"))
        })?;
        let parse = |raw: &str| {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| EngineError::InvalidMidpoint(format!("'{raw}' is not a number")))
        };
        Ok((parse(sat)?, parse(loy)?))
    }
}
