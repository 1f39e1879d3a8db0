//! A classification session over one dataset.
//!
//! The session owns the current geometry and a cache of segment labels.
//! Any change to the midpoint, the scales or the records builds the new
//! geometry first and then drops the cache, so labels are never computed
//! against a half-updated configuration.

use serde::Serialize;

use crate::config::EngineConfig;
use crate::dataset::Dataset;
use crate::error::{EngineError, Result};
use crate::geometry::GridGeometry;
use crate::models::CustomerRecord;
use crate::proximity::{self, ProximityReport};
use crate::scale::{Midpoint, ScalePair};
use crate::segment::{self, Segment, SegmentDistribution};

/// A stored record that no longer fits a proposed scale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleViolation {
    pub index: usize,
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct SegmentModel {
    dataset: Dataset,
    config: EngineConfig,
    geometry: GridGeometry,
    labels: Option<Vec<Segment>>,
}

impl SegmentModel {
    pub fn new(dataset: Dataset, config: EngineConfig) -> Result<Self> {
        let scales = dataset.scales();
        let midpoint = config.resolve_midpoint(&scales)?;
        let geometry = Self::build_geometry(&scales, midpoint, &config)?;
        Ok(Self {
            dataset,
            config,
            geometry,
            labels: None,
        })
    }

    fn build_geometry(
        scales: &ScalePair,
        midpoint: Midpoint,
        config: &EngineConfig,
    ) -> Result<GridGeometry> {
        GridGeometry::compute_with_zone(scales, midpoint, config.special_zones.size)
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn records(&self) -> &[CustomerRecord] {
        self.dataset.records()
    }

    /// Move the quadrant split. Only allowed in adjustable-midpoint mode.
    pub fn set_midpoint(&mut self, midpoint: Midpoint) -> Result<()> {
        if !self.config.midpoint.adjustable {
            return Err(EngineError::InvalidConfig(
                "midpoint is fixed for this dataset".to_string(),
            ));
        }
        let geometry = Self::build_geometry(&self.dataset.scales(), midpoint, &self.config)?;
        self.replace_geometry(geometry);
        Ok(())
    }

    /// Records that fall outside `scales`, by position.
    pub fn scale_violations(&self, scales: &ScalePair) -> Vec<ScaleViolation> {
        self.records()
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                let reason = if !scales.satisfaction.contains(record.satisfaction) {
                    format!(
                        "Satisfaction {} is outside {}",
                        record.satisfaction, scales.satisfaction
                    )
                } else if !scales.loyalty.contains(record.loyalty) {
                    format!("Loyalty {} is outside {}", record.loyalty, scales.loyalty)
                } else {
                    return None;
                };
                Some(ScaleViolation {
                    index,
                    id: record.id.clone(),
                    reason,
                })
            })
            .collect()
    }

    /// Switch to new scales after revalidating every stored record.
    ///
    /// When any record falls outside the new scales nothing changes and the
    /// offending records are returned. A midpoint that is no longer interior
    /// falls back to the centre of the new scales.
    pub fn rescale(&mut self, scales: ScalePair) -> Result<Vec<ScaleViolation>> {
        let violations = self.scale_violations(&scales);
        if !violations.is_empty() {
            tracing::info!(
                violations = violations.len(),
                scales = %format!("{} x {}", scales.satisfaction, scales.loyalty),
                "Rescale refused",
            );
            return Ok(violations);
        }

        let midpoint = match self.geometry.midpoint.validate(&scales) {
            Ok(()) => self.geometry.midpoint,
            Err(_) => Midpoint::default_for(&scales),
        };
        let geometry = Self::build_geometry(&scales, midpoint, &self.config)?;
        self.dataset = Dataset::new(scales, self.dataset.records().to_vec(), &self.config.id_prefix);
        self.replace_geometry(geometry);
        Ok(Vec::new())
    }

    pub fn add(&mut self, record: CustomerRecord) -> Result<()> {
        self.dataset.add(record)?;
        self.labels = None;
        Ok(())
    }

    pub fn edit(&mut self, index: usize, record: CustomerRecord) -> Result<()> {
        self.dataset.edit(index, record)?;
        self.labels = None;
        Ok(())
    }

    pub fn set_excluded(&mut self, index: usize, excluded: bool) -> Result<()> {
        self.dataset.set_excluded(index, excluded)?;
        self.labels = None;
        Ok(())
    }

    pub fn extend(&mut self, records: Vec<CustomerRecord>) {
        self.dataset.extend(records);
        self.labels = None;
    }

    /// One label per stored record, in record order.
    pub fn labels(&mut self) -> &[Segment] {
        let geometry = &self.geometry;
        let zones = &self.config.special_zones;
        let records = self.dataset.records();
        self.labels.get_or_insert_with(|| {
            records
                .iter()
                .map(|r| segment::classify_record(r, geometry, zones))
                .collect()
        })
    }

    pub fn distribution(&self) -> SegmentDistribution {
        segment::distribution(self.records(), &self.geometry, &self.config.special_zones)
    }

    pub fn proximity(&self) -> ProximityReport {
        proximity::classify_proximity(
            self.records(),
            &self.geometry,
            &self.config.proximity,
            &self.config.special_zones,
        )
    }

    fn replace_geometry(&mut self, geometry: GridGeometry) {
        tracing::debug!(
            midpoint_sat = geometry.midpoint.satisfaction,
            midpoint_loy = geometry.midpoint.loyalty,
            near_corner_room = geometry.has_room_for_near_corner,
            "Geometry recomputed",
        );
        self.geometry = geometry;
        self.labels = None;
    }
}
