//! Layout-agnostic grid geometry for a scale pair and midpoint.
//!
//! Cell sizes are percentages of the axis, not pixels. A geometry is a
//! snapshot: moving the midpoint or rescaling an axis means computing a new
//! one, since either change can remove room for the near-corner cells.

use serde::Serialize;

use crate::error::Result;
use crate::scale::{Midpoint, ScalePair};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridGeometry {
    pub scales: ScalePair,
    pub midpoint: Midpoint,
    /// Width of one satisfaction cell, as a percentage of the axis.
    pub cell_width: f64,
    /// Height of one loyalty cell, as a percentage of the axis.
    pub cell_height: f64,
    pub total_cols: u32,
    pub total_rows: u32,
    /// Column offset of the satisfaction threshold from the axis minimum.
    pub midpoint_col: f64,
    /// Row offset of the loyalty threshold from the axis minimum.
    pub midpoint_row: f64,
    /// Side length of each corner zone after fitting it inside its quadrant.
    pub special_zone_size: u32,
    pub high_corner_room: bool,
    pub low_corner_room: bool,
    /// Both corners have room for their near-corner cells.
    pub has_room_for_near_corner: bool,
}

impl GridGeometry {
    /// Geometry with single-cell corner zones.
    pub fn compute(scales: &ScalePair, midpoint: Midpoint) -> Result<Self> {
        Self::compute_with_zone(scales, midpoint, 1)
    }

    /// Geometry with `requested_zone`-sized corner zones, shrunk if needed so a
    /// zone never crosses the midpoint split.
    pub fn compute_with_zone(
        scales: &ScalePair,
        midpoint: Midpoint,
        requested_zone: u32,
    ) -> Result<Self> {
        midpoint.validate(scales)?;

        let sat = scales.satisfaction;
        let loy = scales.loyalty;
        let total_cols = sat.span();
        let total_rows = loy.span();
        let midpoint_col = midpoint.satisfaction - sat.min() as f64;
        let midpoint_row = midpoint.loyalty - loy.min() as f64;
        let cols_to_high = total_cols as f64 - midpoint_col;
        let rows_to_high = total_rows as f64 - midpoint_row;

        let fits = [
            cols_to_high.floor() + 1.0,
            rows_to_high.floor() + 1.0,
            midpoint_col.ceil(),
            midpoint_row.ceil(),
        ]
        .into_iter()
        .fold(f64::INFINITY, f64::min)
        .max(1.0) as u32;
        let special_zone_size = requested_zone.clamp(1, fits);
        if special_zone_size < requested_zone {
            tracing::warn!(
                requested_zone,
                special_zone_size,
                midpoint_sat = midpoint.satisfaction,
                midpoint_loy = midpoint.loyalty,
                "Special zone clamped to fit inside its quadrant",
            );
        }

        let k = special_zone_size as f64;
        let high_corner_room = cols_to_high >= k + 1.0 && rows_to_high >= k;
        let low_corner_room = midpoint_col >= k + 1.0 && midpoint_row >= k;

        Ok(Self {
            scales: *scales,
            midpoint,
            cell_width: 100.0 / total_cols as f64,
            cell_height: 100.0 / total_rows as f64,
            total_cols,
            total_rows,
            midpoint_col,
            midpoint_row,
            special_zone_size,
            high_corner_room,
            low_corner_room,
            has_room_for_near_corner: high_corner_room && low_corner_room,
        })
    }

    pub fn is_high_satisfaction(&self, satisfaction: f64) -> bool {
        satisfaction >= self.midpoint.satisfaction
    }

    pub fn is_high_loyalty(&self, loyalty: f64) -> bool {
        loyalty >= self.midpoint.loyalty
    }

    /// Lowest satisfaction / loyalty value inside the high corner zone.
    pub fn high_zone_edge(&self) -> (f64, f64) {
        let k = self.special_zone_size as f64;
        (
            self.scales.satisfaction.max() as f64 - k + 1.0,
            self.scales.loyalty.max() as f64 - k + 1.0,
        )
    }

    /// Highest satisfaction / loyalty value inside the low corner zone.
    pub fn low_zone_edge(&self) -> (f64, f64) {
        let k = self.special_zone_size as f64;
        (
            self.scales.satisfaction.min() as f64 + k - 1.0,
            self.scales.loyalty.min() as f64 + k - 1.0,
        )
    }

    pub fn in_high_zone(&self, satisfaction: f64, loyalty: f64) -> bool {
        let (sat_edge, loy_edge) = self.high_zone_edge();
        satisfaction >= sat_edge && loyalty >= loy_edge
    }

    pub fn in_low_zone(&self, satisfaction: f64, loyalty: f64) -> bool {
        let (sat_edge, loy_edge) = self.low_zone_edge();
        satisfaction <= sat_edge && loyalty <= loy_edge
    }

    /// Within one cell of the high zone but outside it.
    pub fn in_high_ring(&self, satisfaction: f64, loyalty: f64) -> bool {
        let (sat_edge, loy_edge) = self.high_zone_edge();
        satisfaction >= sat_edge - 1.0
            && loyalty >= loy_edge - 1.0
            && !self.in_high_zone(satisfaction, loyalty)
    }

    /// Within one cell of the low zone but outside it.
    pub fn in_low_ring(&self, satisfaction: f64, loyalty: f64) -> bool {
        let (sat_edge, loy_edge) = self.low_zone_edge();
        satisfaction <= sat_edge + 1.0
            && loyalty <= loy_edge + 1.0
            && !self.in_low_zone(satisfaction, loyalty)
    }
}
