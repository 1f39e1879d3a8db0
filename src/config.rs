//! Typed engine configuration.
//!
//! Feature toggles arrive from older templates as a bag of string tokens
//! (`SHOW_SPECIAL_ZONES`, `SPECIAL_ZONE_SIZE=2`, ...). They are parsed once,
//! here, into [`EngineConfig`]; nothing downstream inspects raw tokens.

use serde::{Deserialize, Serialize};

use crate::dates::DateFormat;
use crate::error::{EngineError, Result};
use crate::scale::{Midpoint, ScalePair};

pub const DEFAULT_PROXIMITY_THRESHOLD: u32 = 1;
pub const DEFAULT_SPECIAL_ZONE_SIZE: u32 = 1;
pub const DEFAULT_ID_PREFIX: &str = "CUST-";

/// Corner zone settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialZones {
    /// Classify the extreme corners as their own segments.
    pub enabled: bool,
    /// Label the ring of cells around each corner zone separately.
    pub near_corner: bool,
    /// Requested side length of each corner zone, in cells.
    pub size: u32,
}

impl Default for SpecialZones {
    fn default() -> Self {
        Self {
            enabled: true,
            near_corner: false,
            size: DEFAULT_SPECIAL_ZONE_SIZE,
        }
    }
}

/// Where the quadrant split comes from and whether it may move.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MidpointSettings {
    /// Let the user move the split at runtime.
    pub adjustable: bool,
    /// Starting split; the centre of each scale when absent.
    pub initial: Option<Midpoint>,
}

/// Which boundary claims a point that is near both internal boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisPriority {
    /// The loyalty boundary (the horizontal split) is attributed first.
    #[default]
    LoyaltyFirst,
    /// The satisfaction boundary (the vertical split) is attributed first.
    SatisfactionFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximitySettings {
    /// Distance in cells that still counts as "near" a boundary.
    pub threshold: u32,
    pub axis_priority: AxisPriority,
}

impl Default for ProximitySettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PROXIMITY_THRESHOLD,
            axis_priority: AxisPriority::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub special_zones: SpecialZones,
    pub midpoint: MidpointSettings,
    pub proximity: ProximitySettings,
    /// A date pattern locked by the caller; overrides header inference.
    pub date_format: Option<DateFormat>,
    pub id_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            special_zones: SpecialZones::default(),
            midpoint: MidpointSettings::default(),
            proximity: ProximitySettings::default(),
            date_format: None,
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
        }
    }
}

impl EngineConfig {
    /// Build a configuration from legacy flag tokens. Later tokens override earlier ones.
    pub fn from_tokens<'a, I>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut config = Self::default();

        for token in tokens {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (key, value) = match token.split_once(['=', ':']) {
                Some((key, value)) => (key.trim().to_ascii_uppercase(), Some(value.trim())),
                None => (token.to_ascii_uppercase(), None),
            };

            match (key.as_str(), value) {
                ("SHOW_SPECIAL_ZONES", None) => config.special_zones.enabled = true,
                ("HIDE_SPECIAL_ZONES", None) => config.special_zones.enabled = false,
                ("SHOW_NEAR_SPECIAL_ZONES", None) => config.special_zones.near_corner = true,
                ("HIDE_NEAR_SPECIAL_ZONES", None) => config.special_zones.near_corner = false,
                ("ADJUSTABLE_MIDPOINT", None) => config.midpoint.adjustable = true,
                ("SPECIAL_ZONE_SIZE", Some(v)) => {
                    let size = parse_count(&key, v)?;
                    if size == 0 {
                        return Err(EngineError::InvalidConfig(
                            "SPECIAL_ZONE_SIZE must be at least 1".to_string(),
                        ));
                    }
                    config.special_zones.size = size;
                }
                ("PROXIMITY_THRESHOLD", Some(v)) => {
                    config.proximity.threshold = parse_count(&key, v)?;
                }
                ("AXIS_PRIORITY", Some(v)) => {
                    config.proximity.axis_priority = match v.to_ascii_lowercase().as_str() {
                        "loyalty" => AxisPriority::LoyaltyFirst,
                        "satisfaction" => AxisPriority::SatisfactionFirst,
                        other => {
                            return Err(EngineError::InvalidConfig(format!(
                                "AXIS_PRIORITY must be 'loyalty' or 'satisfaction', got '{other}'"
                            )))
                        }
                    };
                }
                ("MIDPOINT", Some(v)) => {
                    let (satisfaction, loyalty) = Midpoint::parse_pair(v)?;
                    config.midpoint.initial = Some(Midpoint {
                        satisfaction,
                        loyalty,
                    });
                }
                ("DATE_FORMAT", Some(v)) => config.date_format = Some(DateFormat::parse(v)?),
                ("ID_PREFIX", Some(v)) => config.id_prefix = v.to_string(),
                _ => {
                    return Err(EngineError::InvalidConfig(format!(
                        "unrecognised flag '{token}'"
                    )))
                }
            }
        }

        Ok(config)
    }

    /// The starting midpoint for `scales`, validated against them.
    pub fn resolve_midpoint(&self, scales: &ScalePair) -> Result<Midpoint> {
        match self.midpoint.initial {
            None => Ok(Midpoint::default_for(scales)),
            Some(m) => {
                m.validate(scales)?;
                Ok(m)
            }
        }
    }
}

fn parse_count(key: &str, value: &str) -> Result<u32> {
    value.parse::<u32>().map_err(|_| {
        EngineError::InvalidConfig(format!("{key} expects a non-negative integer, got '{value}'"))
    })
}
