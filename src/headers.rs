//! Header-name heuristics for locating optional import columns.
//!
//! Each optional role has one predicate over the normalized header text.
//! Roles are tried in [`HEADER_RULES`] order and the first unclaimed header
//! that satisfies a role's predicate is assigned to it. The satisfaction and
//! loyalty columns are named explicitly by the caller and never take part.

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderRole {
    Id,
    Email,
    Date,
    Name,
}

pub struct HeaderRule {
    pub role: HeaderRole,
    pub matches: fn(&str) -> bool,
}

/// Ordered matching strategy.
pub const HEADER_RULES: &[HeaderRule] = &[
    HeaderRule {
        role: HeaderRole::Id,
        matches: is_id_header,
    },
    HeaderRule {
        role: HeaderRole::Email,
        matches: is_email_header,
    },
    HeaderRule {
        role: HeaderRole::Date,
        matches: is_date_header,
    },
    HeaderRule {
        role: HeaderRole::Name,
        matches: is_name_header,
    },
];

const ID_HEADERS: &[&str] = &[
    "id",
    "customerid",
    "clientid",
    "respondentid",
    "recordid",
    "customernumber",
    "customerno",
];

/// Lower-case, separators folded to single spaces.
pub fn normalize_header(header: &str) -> String {
    header
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn compact(normalized: &str) -> String {
    normalized.chars().filter(|c| c.is_alphanumeric()).collect()
}

pub fn is_id_header(normalized: &str) -> bool {
    ID_HEADERS.contains(&compact(normalized).as_str())
}

pub fn is_email_header(normalized: &str) -> bool {
    compact(normalized).contains("email")
}

pub fn is_date_header(normalized: &str) -> bool {
    normalized.contains("date")
}

pub fn is_name_header(normalized: &str) -> bool {
    let compact = compact(normalized);
    compact.contains("name") && compact != "username" && compact != "filename"
}

/// Resolved column positions for one import.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnMap {
    pub satisfaction: usize,
    pub loyalty: usize,
    pub id: Option<usize>,
    pub email: Option<usize>,
    pub date: Option<usize>,
    pub name: Option<usize>,
}

impl ColumnMap {
    /// True when the column at `index` has no recognised role.
    pub fn is_extra(&self, index: usize) -> bool {
        index != self.satisfaction
            && index != self.loyalty
            && Some(index) != self.id
            && Some(index) != self.email
            && Some(index) != self.date
            && Some(index) != self.name
    }

    fn slot(&mut self, role: HeaderRole) -> &mut Option<usize> {
        match role {
            HeaderRole::Id => &mut self.id,
            HeaderRole::Email => &mut self.email,
            HeaderRole::Date => &mut self.date,
            HeaderRole::Name => &mut self.name,
        }
    }
}

/// Locate the required score columns and guess the optional ones.
///
/// Fails only when a required column is absent.
pub fn map_columns(
    headers: &[String],
    satisfaction_header: &str,
    loyalty_header: &str,
) -> Result<ColumnMap> {
    let find = |wanted: &str| {
        let wanted = normalize_header(wanted);
        headers
            .iter()
            .position(|h| normalize_header(h) == wanted)
            .ok_or_else(|| EngineError::MissingColumn(wanted.clone()))
    };

    let mut map = ColumnMap {
        satisfaction: find(satisfaction_header)?,
        loyalty: find(loyalty_header)?,
        ..ColumnMap::default()
    };

    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    for rule in HEADER_RULES {
        let found = normalized
            .iter()
            .enumerate()
            .find(|(index, header)| map.is_extra(*index) && (rule.matches)(header.as_str()))
            .map(|(index, _)| index);
        *map.slot(rule.role) = found;
    }

    Ok(map)
}
