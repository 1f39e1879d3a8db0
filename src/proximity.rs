//! Boundary proximity: which in-quadrant points sit close to a neighbouring
//! segment, for risk and opportunity counts.
//!
//! Distances are measured in cells from the point to the midpoint line of
//! each axis (a point on the line is at distance 0). A point within the
//! threshold of a boundary is "near" the quadrant across it. A point near
//! both boundaries is attributed to one of them according to
//! [`AxisPriority`]; the priority is fixed per configuration and never
//! depends on which distance is smaller.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::config::{AxisPriority, ProximitySettings, SpecialZones};
use crate::geometry::GridGeometry;
use crate::models::CustomerRecord;
use crate::segment::{self, percentage, Segment, SegmentTally};

/// A named pair of segments plus the distance that makes a point in
/// `source` count as close to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ProximityRelationship {
    pub source: Segment,
    pub target: Segment,
    pub threshold: u32,
}

impl fmt::Display for ProximityRelationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} near {}", self.source, self.target)
    }
}

/// Aggregation key for one proximity count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityBucket {
    /// Not within the threshold of any boundary.
    Solid(Segment),
    Near { source: Segment, target: Segment },
}

impl fmt::Display for ProximityBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Solid(segment) => write!(f, "solid {segment}"),
            Self::Near { source, target } => write!(f, "{source} near {target}"),
        }
    }
}

/// Proximity facts for a single non-corner point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointProximity {
    pub quadrant: Segment,
    /// Signed cells from the satisfaction threshold; negative on the low side.
    pub satisfaction_distance: f64,
    /// Signed cells from the loyalty threshold; negative on the low side.
    pub loyalty_distance: f64,
    /// The neighbouring quadrant this point is attributed to, if any.
    pub near_quadrant: Option<Segment>,
    /// The corner zone this point is within the threshold of, if any.
    pub near_corner: Option<Segment>,
}

impl PointProximity {
    pub fn bucket(&self) -> ProximityBucket {
        match self.near_quadrant {
            Some(target) => ProximityBucket::Near {
                source: self.quadrant,
                target,
            },
            None => ProximityBucket::Solid(self.quadrant),
        }
    }
}

/// Proximity for one point. Returns `None` for points inside a corner zone.
pub fn point_proximity(
    satisfaction: f64,
    loyalty: f64,
    geometry: &GridGeometry,
    settings: &ProximitySettings,
    zones: &SpecialZones,
) -> Option<PointProximity> {
    if segment::classify(satisfaction, loyalty, geometry, zones).is_corner() {
        return None;
    }

    let threshold = settings.threshold as f64;
    let high_sat = geometry.is_high_satisfaction(satisfaction);
    let high_loy = geometry.is_high_loyalty(loyalty);
    let quadrant = Segment::quadrant(high_sat, high_loy);

    let satisfaction_distance = satisfaction - geometry.midpoint.satisfaction;
    let loyalty_distance = loyalty - geometry.midpoint.loyalty;

    let across_satisfaction = (satisfaction_distance.abs() <= threshold)
        .then(|| Segment::quadrant(!high_sat, high_loy));
    let across_loyalty =
        (loyalty_distance.abs() <= threshold).then(|| Segment::quadrant(high_sat, !high_loy));

    let near_quadrant = match settings.axis_priority {
        AxisPriority::LoyaltyFirst => across_loyalty.or(across_satisfaction),
        AxisPriority::SatisfactionFirst => across_satisfaction.or(across_loyalty),
    };

    let near_corner = if zones.enabled {
        corner_target(satisfaction, loyalty, quadrant, geometry, threshold)
    } else {
        None
    };

    Some(PointProximity {
        quadrant,
        satisfaction_distance,
        loyalty_distance,
        near_quadrant,
        near_corner,
    })
}

/// Distance to a corner zone is measured against the zone's two interior
/// edges; only the zone inside the point's own quadrant is considered.
fn corner_target(
    satisfaction: f64,
    loyalty: f64,
    quadrant: Segment,
    geometry: &GridGeometry,
    threshold: f64,
) -> Option<Segment> {
    match quadrant {
        Segment::Loyalists => {
            let (sat_edge, loy_edge) = geometry.high_zone_edge();
            let distance = (sat_edge - satisfaction).max(loy_edge - loyalty).max(0.0);
            (distance <= threshold).then_some(Segment::Apostles)
        }
        Segment::Defectors => {
            let (sat_edge, loy_edge) = geometry.low_zone_edge();
            let distance = (satisfaction - sat_edge).max(loyalty - loy_edge).max(0.0);
            (distance <= threshold).then_some(Segment::Terrorists)
        }
        _ => None,
    }
}

/// Aggregated proximity counts for one classification pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityReport {
    pub threshold: u32,
    pub axis_priority: AxisPriority,
    /// Non-excluded records, corner members included.
    pub active_total: usize,
    /// Each non-corner active point appears in exactly one bucket.
    pub boundaries: BTreeMap<ProximityBucket, SegmentTally>,
    /// Points within the threshold of their quadrant's corner zone.
    pub corners: BTreeMap<ProximityBucket, SegmentTally>,
}

impl ProximityReport {
    pub fn count(&self, bucket: ProximityBucket) -> usize {
        self.boundaries
            .get(&bucket)
            .or_else(|| self.corners.get(&bucket))
            .map(|t| t.count)
            .unwrap_or(0)
    }

    /// The "near" relationships that occurred in this pass.
    pub fn relationships(&self) -> Vec<ProximityRelationship> {
        self.boundaries
            .keys()
            .chain(self.corners.keys())
            .filter_map(|bucket| match bucket {
                ProximityBucket::Near { source, target } => Some(ProximityRelationship {
                    source: *source,
                    target: *target,
                    threshold: self.threshold,
                }),
                ProximityBucket::Solid(_) => None,
            })
            .collect()
    }
}

pub fn classify_proximity(
    records: &[CustomerRecord],
    geometry: &GridGeometry,
    settings: &ProximitySettings,
    zones: &SpecialZones,
) -> ProximityReport {
    let mut boundary_counts: BTreeMap<ProximityBucket, usize> = BTreeMap::new();
    let mut corner_counts: BTreeMap<ProximityBucket, usize> = BTreeMap::new();
    let mut active_total = 0usize;

    for record in records.iter().filter(|r| r.is_active()) {
        active_total += 1;
        let Some(point) =
            point_proximity(record.satisfaction, record.loyalty, geometry, settings, zones)
        else {
            continue;
        };

        *boundary_counts.entry(point.bucket()).or_insert(0) += 1;
        if let Some(target) = point.near_corner {
            *corner_counts
                .entry(ProximityBucket::Near {
                    source: point.quadrant,
                    target,
                })
                .or_insert(0) += 1;
        }
    }

    let tally = |counts: BTreeMap<ProximityBucket, usize>| {
        counts
            .into_iter()
            .map(|(bucket, count)| {
                (
                    bucket,
                    SegmentTally {
                        count,
                        percentage: percentage(count, active_total),
                    },
                )
            })
            .collect::<BTreeMap<_, _>>()
    };

    tracing::debug!(
        active_total,
        buckets = boundary_counts.len(),
        threshold = settings.threshold,
        "Proximity pass complete",
    );

    ProximityReport {
        threshold: settings.threshold,
        axis_priority: settings.axis_priority,
        active_total,
        boundaries: tally(boundary_counts),
        corners: tally(corner_counts),
    }
}
