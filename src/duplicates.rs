//! Duplicate detection with historical tracking.
//!
//! The same customer may legitimately appear once per data collection
//! round. A candidate is a duplicate of an existing record only when their
//! identities match and, if both carry a date, the dates match too. Without
//! a date on either side there is no way to tell rounds apart, so an identity
//! match alone is enough.

use std::fmt;

use serde::Serialize;

use crate::dates::{canonical_date, DateFormat};
use crate::models::CustomerRecord;

/// Which identity key linked two records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKey {
    Id,
    Email,
    Name,
}

impl MatchKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Email => "email",
            Self::Name => "name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DuplicateReason {
    pub key: MatchKey,
    /// Both records carried the same date.
    pub date_matched: bool,
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.date_matched {
            write!(f, "{} and date", self.key.as_str())
        } else {
            f.write_str(self.key.as_str())
        }
    }
}

/// The identity fields compared by [`check_for_duplicate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity<'a> {
    pub id: Option<&'a str>,
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub date: Option<&'a str>,
    /// Pattern `date` is written in; dates are compared as calendar days.
    pub date_format: Option<DateFormat>,
}

impl<'a> From<&'a CustomerRecord> for Identity<'a> {
    fn from(record: &'a CustomerRecord) -> Self {
        Self {
            id: Some(record.id.as_str()),
            name: record.name.as_deref(),
            email: record.email.as_deref(),
            date: record.date.as_deref(),
            date_format: record.date_format,
        }
    }
}

/// Trimmed, lower-cased where relevant, dates in ISO form, and empty values dropped.
struct Normalized {
    id: Option<String>,
    name: Option<String>,
    email: Option<String>,
    date: Option<String>,
}

impl Normalized {
    fn of(identity: &Identity<'_>) -> Self {
        Self {
            id: non_empty(identity.id.map(str::trim)),
            name: non_empty(identity.name.map(str::trim)),
            email: non_empty(identity.email.map(|e| e.trim().to_lowercase())),
            date: non_empty(identity.date.map(|d| {
                canonical_date(d, identity.date_format).unwrap_or_else(|| d.trim().to_string())
            })),
        }
    }

    fn identity_match(&self, other: &Self) -> Option<MatchKey> {
        if self.id.is_some() && self.id == other.id {
            return Some(MatchKey::Id);
        }
        if self.email.is_some() && self.email == other.email {
            return Some(MatchKey::Email);
        }
        // A shared name only counts while neither side has the stronger email key.
        if self.email.is_none()
            && other.email.is_none()
            && self.name.is_some()
            && self.name == other.name
        {
            return Some(MatchKey::Name);
        }
        None
    }
}

fn non_empty<S: Into<String>>(value: Option<S>) -> Option<String> {
    value.map(Into::into).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicateCheck<'a> {
    pub is_duplicate: bool,
    pub matched: Option<&'a CustomerRecord>,
    pub reason: Option<DuplicateReason>,
}

impl DuplicateCheck<'_> {
    fn unique() -> Self {
        Self {
            is_duplicate: false,
            matched: None,
            reason: None,
        }
    }
}

/// Check `candidate` against `existing` in order; the first duplicate wins.
///
/// Records whose id equals `excluded_id` are skipped, so a record being
/// edited is never reported as a duplicate of itself.
pub fn check_for_duplicate<'a, I>(
    candidate: Identity<'_>,
    existing: I,
    excluded_id: Option<&str>,
) -> DuplicateCheck<'a>
where
    I: IntoIterator<Item = &'a CustomerRecord>,
{
    let candidate = Normalized::of(&candidate);
    let excluded_id = excluded_id.map(str::trim);

    for record in existing {
        if excluded_id == Some(record.id.trim()) {
            continue;
        }
        let other = Normalized::of(&Identity::from(record));
        let Some(key) = candidate.identity_match(&other) else {
            continue;
        };

        let reason = match (&candidate.date, &other.date) {
            (Some(a), Some(b)) if a == b => DuplicateReason {
                key,
                date_matched: true,
            },
            // Same customer, different collection round.
            (Some(_), Some(_)) => continue,
            _ => DuplicateReason {
                key,
                date_matched: false,
            },
        };

        tracing::debug!(
            matched_id = %record.id,
            reason = %reason,
            "Duplicate record detected",
        );
        return DuplicateCheck {
            is_duplicate: true,
            matched: Some(record),
            reason: Some(reason),
        };
    }

    DuplicateCheck::unique()
}
