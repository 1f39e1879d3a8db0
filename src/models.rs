use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dates::DateFormat;

/// One survey response for one customer at one point in time.
///
/// The same `id` may appear on several records with different dates; those
/// are historical entries for the same customer, not duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub satisfaction: f64,
    pub loyalty: f64,
    /// The date as written in `date_format`.
    pub date: Option<String>,
    pub date_format: Option<DateFormat>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub excluded: bool,
}

impl CustomerRecord {
    pub fn new(id: impl Into<String>, satisfaction: f64, loyalty: f64) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
            satisfaction,
            loyalty,
            date: None,
            date_format: None,
            attributes: BTreeMap::new(),
            excluded: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn is_active(&self) -> bool {
        !self.excluded
    }
}

/// A parsed but uninterpreted tabular import: one header row plus data rows.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }
}

/// One line of a [`ValidationReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Source row number, counting the header as row 1.
    pub row: usize,
    pub id: Option<String>,
    pub reason: String,
    /// Short rendering of the offending field values.
    pub excerpt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub rejected: Vec<ReportEntry>,
    pub warnings: Vec<ReportEntry>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.warnings.is_empty()
    }
}

/// Result of one import run.
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub records: Vec<CustomerRecord>,
    pub report: ValidationReport,
    /// Rows dropped before validation (blank or template marker rows).
    pub skipped_rows: usize,
}
