//! Customer loyalty segmentation.
//!
//! Customers are placed on a satisfaction x loyalty grid, split into four
//! quadrants by a midpoint, with optional corner zones for the extremes.
//! The crate classifies records into segments, measures how close each
//! record sits to a neighbouring segment, and validates tabular imports.

pub mod config;
pub mod csv_source;
pub mod dataset;
pub mod dates;
pub mod db;
pub mod duplicates;
pub mod error;
pub mod geometry;
pub mod headers;
pub mod ids;
pub mod model;
pub mod models;
pub mod proximity;
pub mod report;
pub mod scale;
pub mod segment;
pub mod validation;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use geometry::GridGeometry;
pub use models::CustomerRecord;
pub use scale::{Midpoint, ScalePair, ScaleRange};
pub use segment::Segment;
