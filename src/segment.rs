//! Quadrant classification and segment distribution.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SpecialZones;
use crate::geometry::GridGeometry;
use crate::models::CustomerRecord;

/// The label a record receives for a given geometry.
///
/// The four quadrants are named for their position, not the axis meaning:
///
/// | label         | satisfaction | loyalty |
/// |---------------|--------------|---------|
/// | `Loyalists`   | high         | high    |
/// | `Mercenaries` | high         | low     |
/// | `Hostages`    | low          | high    |
/// | `Defectors`   | low          | low     |
///
/// `Apostles` and `Terrorists` are the extreme high and low corner zones;
/// `NearApostles` and `NearTerrorists` are the cells ringing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Apostles,
    NearApostles,
    Loyalists,
    Mercenaries,
    Hostages,
    Defectors,
    NearTerrorists,
    Terrorists,
}

impl Segment {
    pub const QUADRANTS: [Segment; 4] = [
        Segment::Loyalists,
        Segment::Mercenaries,
        Segment::Hostages,
        Segment::Defectors,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apostles => "apostles",
            Self::NearApostles => "near-apostles",
            Self::Loyalists => "loyalists",
            Self::Mercenaries => "mercenaries",
            Self::Hostages => "hostages",
            Self::Defectors => "defectors",
            Self::NearTerrorists => "near-terrorists",
            Self::Terrorists => "terrorists",
        }
    }

    /// The quadrant for a high/low position on each axis.
    pub fn quadrant(high_satisfaction: bool, high_loyalty: bool) -> Self {
        match (high_satisfaction, high_loyalty) {
            (true, true) => Self::Loyalists,
            (true, false) => Self::Mercenaries,
            (false, true) => Self::Hostages,
            (false, false) => Self::Defectors,
        }
    }

    pub fn is_corner(&self) -> bool {
        matches!(self, Self::Apostles | Self::Terrorists)
    }

    /// The quadrant a label sits in. Corner zones never cross the split, so
    /// this is total.
    pub fn base_quadrant(&self) -> Self {
        match self {
            Self::Apostles | Self::NearApostles => Self::Loyalists,
            Self::Terrorists | Self::NearTerrorists => Self::Defectors,
            other => *other,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quadrant from the midpoint comparison alone, ignoring corner zones.
pub fn quadrant_of(satisfaction: f64, loyalty: f64, geometry: &GridGeometry) -> Segment {
    Segment::quadrant(
        geometry.is_high_satisfaction(satisfaction),
        geometry.is_high_loyalty(loyalty),
    )
}

/// Assign exactly one label to a point.
///
/// Values must lie inside the geometry's scales; validation rejects anything
/// else before it gets here. Corner zones are checked before the quadrant
/// comparison so a corner is never also counted as a quadrant member.
pub fn classify(
    satisfaction: f64,
    loyalty: f64,
    geometry: &GridGeometry,
    zones: &SpecialZones,
) -> Segment {
    if zones.enabled {
        if geometry.in_high_zone(satisfaction, loyalty) {
            return Segment::Apostles;
        }
        if geometry.in_low_zone(satisfaction, loyalty) {
            return Segment::Terrorists;
        }
    }

    let quadrant = quadrant_of(satisfaction, loyalty, geometry);

    if zones.enabled && zones.near_corner {
        if quadrant == Segment::Loyalists
            && geometry.high_corner_room
            && geometry.in_high_ring(satisfaction, loyalty)
        {
            return Segment::NearApostles;
        }
        if quadrant == Segment::Defectors
            && geometry.low_corner_room
            && geometry.in_low_ring(satisfaction, loyalty)
        {
            return Segment::NearTerrorists;
        }
    }

    quadrant
}

pub fn classify_record(
    record: &CustomerRecord,
    geometry: &GridGeometry,
    zones: &SpecialZones,
) -> Segment {
    classify(record.satisfaction, record.loyalty, geometry, zones)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentTally {
    pub count: usize,
    pub percentage: f64,
}

/// Per-label counts over the active records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentDistribution {
    pub active_total: usize,
    pub excluded: usize,
    pub segments: BTreeMap<Segment, SegmentTally>,
}

impl SegmentDistribution {
    pub fn count(&self, segment: Segment) -> usize {
        self.segments.get(&segment).map(|t| t.count).unwrap_or(0)
    }
}

pub fn distribution(
    records: &[CustomerRecord],
    geometry: &GridGeometry,
    zones: &SpecialZones,
) -> SegmentDistribution {
    let mut counts: BTreeMap<Segment, usize> = BTreeMap::new();
    let mut excluded = 0usize;

    for record in records {
        if record.excluded {
            excluded += 1;
            continue;
        }
        *counts
            .entry(classify_record(record, geometry, zones))
            .or_insert(0) += 1;
    }

    let active_total = records.len() - excluded;
    let segments = counts
        .into_iter()
        .map(|(segment, count)| {
            (
                segment,
                SegmentTally {
                    count,
                    percentage: percentage(count, active_total),
                },
            )
        })
        .collect();

    SegmentDistribution {
        active_total,
        excluded,
        segments,
    }
}

pub(crate) fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}
