//! Date pattern inference, parsing and plausibility checks for imported rows.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Earliest year that is not flagged as implausible.
pub const PLAUSIBLE_YEAR_FLOOR: i32 = 1950;

static HEADER_PATTERN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(d{1,2}|m{1,2}|y{2,4})[/.\-](d{1,2}|m{1,2}|y{2,4})[/.\-](d{1,2}|m{1,2}|y{2,4})\b")
        .expect("valid regex")
});

static HEADER_SHORTHAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^a-z])(dmy|mdy|ymd)(?:$|[^a-z])").expect("valid regex"));

/// Field order of a date value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateFormat {
    #[serde(rename = "DD/MM/YYYY")]
    DayMonthYear,
    #[serde(rename = "MM/DD/YYYY")]
    MonthDayYear,
    #[serde(rename = "YYYY-MM-DD")]
    YearMonthDay,
}

impl DateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DayMonthYear => "DD/MM/YYYY",
            Self::MonthDayYear => "MM/DD/YYYY",
            Self::YearMonthDay => "YYYY-MM-DD",
        }
    }

    /// Accepts the display names as well as `dmy` / `mdy` / `ymd` shorthands.
    pub fn parse(value: &str) -> Result<Self> {
        let normalized: String = value
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        match normalized.as_str() {
            "ddmmyyyy" | "dmy" => Ok(Self::DayMonthYear),
            "mmddyyyy" | "mdy" => Ok(Self::MonthDayYear),
            "yyyymmdd" | "ymd" | "iso" => Ok(Self::YearMonthDay),
            _ => Err(EngineError::InvalidDateFormat(value.to_string())),
        }
    }

    /// Infer the field order from a header such as `Date (MM/DD/YYYY)` or `visit_date_ymd`.
    pub fn from_header(header: &str) -> Option<Self> {
        if let Some(caps) = HEADER_PATTERN_RE.captures(header) {
            let order: String = (1..=3)
                .filter_map(|i| caps.get(i))
                .filter_map(|m| m.as_str().chars().next())
                .map(|c| c.to_ascii_lowercase())
                .collect();
            return Self::from_order(&order);
        }
        HEADER_SHORTHAND_RE
            .captures(header)
            .and_then(|caps| caps.get(1))
            .and_then(|m| Self::from_order(&m.as_str().to_ascii_lowercase()))
    }

    fn from_order(order: &str) -> Option<Self> {
        match order {
            "dmy" => Some(Self::DayMonthYear),
            "mdy" => Some(Self::MonthDayYear),
            "ymd" => Some(Self::YearMonthDay),
            _ => None,
        }
    }

    /// Read `raw` in this field order. `None` when it is not a real date.
    pub fn parse_value(&self, raw: &str) -> Option<NaiveDate> {
        let parts = split_date(raw.trim())?;
        let (day, month, year) = match self {
            Self::DayMonthYear => (parts[0], parts[1], parts[2]),
            Self::MonthDayYear => (parts[1], parts[0], parts[2]),
            Self::YearMonthDay => (parts[2], parts[1], parts[0]),
        };
        NaiveDate::from_ymd_opt(parse_year(year)?, month.parse().ok()?, day.parse().ok()?)
    }

    pub fn format(&self, date: NaiveDate) -> String {
        match self {
            Self::DayMonthYear => date.format("%d/%m/%Y").to_string(),
            Self::MonthDayYear => date.format("%m/%d/%Y").to_string(),
            Self::YearMonthDay => date.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the pattern used for a value was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternSource {
    Locked,
    Header,
    Detected,
    Defaulted,
}

/// A successfully parsed date plus any plausibility warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDate {
    pub date: NaiveDate,
    pub format: DateFormat,
    pub warnings: Vec<String>,
}

impl ParsedDate {
    /// The value rendered back in the pattern it was parsed under.
    pub fn display(&self) -> String {
        self.format.format(self.date)
    }
}

/// Parses date cells for one import column.
#[derive(Debug, Clone)]
pub struct DateParser {
    locked: Option<DateFormat>,
    hinted: Option<DateFormat>,
    today: NaiveDate,
}

impl DateParser {
    pub fn new(locked: Option<DateFormat>, header: Option<&str>, today: NaiveDate) -> Self {
        Self {
            locked,
            hinted: header.and_then(DateFormat::from_header),
            today,
        }
    }

    /// Parse one cell. The error is a human-readable row-level reason.
    pub fn parse(&self, raw: &str) -> std::result::Result<ParsedDate, String> {
        let value = raw.trim();
        let (format, source) = self.pattern_for(value);
        let invalid = || format!("Invalid date '{value}' (expected {format})");

        let date = format.parse_value(value).ok_or_else(invalid)?;
        let (day, month) = (date.day(), date.month());

        let mut warnings = Vec::new();
        if date > self.today {
            warnings.push(format!("Date '{value}' is in the future"));
        }
        if date.year() < PLAUSIBLE_YEAR_FLOOR {
            warnings.push(format!("Date '{value}' is implausibly old"));
        }
        if source == PatternSource::Defaulted && day <= 12 && month <= 12 && day != month {
            warnings.push(format!("Ambiguous date '{value}' interpreted as {format}"));
        }

        Ok(ParsedDate {
            date,
            format,
            warnings,
        })
    }

    fn pattern_for(&self, value: &str) -> (DateFormat, PatternSource) {
        if let Some(format) = self.locked {
            return (format, PatternSource::Locked);
        }
        if let Some(format) = self.hinted {
            return (format, PatternSource::Header);
        }
        if has_leading_year(value) {
            (DateFormat::YearMonthDay, PatternSource::Detected)
        } else {
            (DateFormat::DayMonthYear, PatternSource::Defaulted)
        }
    }
}

/// The date in `raw` as `YYYY-MM-DD`, so values written under different
/// patterns compare equal. Without a known pattern only a year-first value
/// can be read.
pub fn canonical_date(raw: &str, format: Option<DateFormat>) -> Option<String> {
    let format = format.or_else(|| has_leading_year(raw).then_some(DateFormat::YearMonthDay))?;
    format
        .parse_value(raw)
        .map(|date| date.format("%Y-%m-%d").to_string())
}

fn has_leading_year(value: &str) -> bool {
    split_date(value.trim())
        .map(|parts| parts[0].len() == 4)
        .unwrap_or(false)
}

/// Split `value` into three numeric parts, dropping any trailing time component.
fn split_date(value: &str) -> Option<[&str; 3]> {
    let date_part = value.split_whitespace().next()?;
    let date_part = date_part.split('T').next()?;
    let parts: Vec<&str> = date_part.split(['/', '-', '.']).collect();
    if parts.len() != 3 {
        return None;
    }
    if parts
        .iter()
        .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }
    Some([parts[0], parts[1], parts[2]])
}

fn parse_year(raw: &str) -> Option<i32> {
    let year = raw.parse::<i32>().ok()?;
    match raw.len() {
        2 => Some(2000 + year),
        4 => Some(year),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    #[test]
    fn header_hints_pick_field_order() {
        assert_eq!(
            DateFormat::from_header("Date (MM/DD/YYYY)"),
            Some(DateFormat::MonthDayYear)
        );
        assert_eq!(
            DateFormat::from_header("survey date dd-mm-yy"),
            Some(DateFormat::DayMonthYear)
        );
        assert_eq!(
            DateFormat::from_header("visit_date_ymd"),
            Some(DateFormat::YearMonthDay)
        );
        assert_eq!(DateFormat::from_header("Date"), None);
    }

    #[test]
    fn locked_pattern_wins_over_header() {
        let parser = DateParser::new(
            Some(DateFormat::MonthDayYear),
            Some("Date (DD/MM/YYYY)"),
            today(),
        );
        let parsed = parser.parse("02/03/2024").unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 2, 3).unwrap());
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn iso_dates_are_detected_without_hint() {
        let parser = DateParser::new(None, Some("Date"), today());
        let parsed = parser.parse("2024-01-15").unwrap();
        assert_eq!(parsed.format, DateFormat::YearMonthDay);
        assert_eq!(parsed.display(), "2024-01-15");
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn defaulted_pattern_warns_when_ambiguous() {
        let parser = DateParser::new(None, None, today());
        let parsed = parser.parse("03/04/2024").unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 4, 3).unwrap());
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].contains("Ambiguous"));

        let unambiguous = parser.parse("25/04/2024").unwrap();
        assert!(unambiguous.warnings.is_empty());
    }

    #[test]
    fn two_digit_years_map_to_this_century() {
        let parser = DateParser::new(Some(DateFormat::DayMonthYear), None, today());
        let parsed = parser.parse("15.01.24").unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(parsed.display(), "15/01/2024");
    }

    #[test]
    fn impossible_dates_are_errors() {
        let parser = DateParser::new(Some(DateFormat::DayMonthYear), None, today());
        let err = parser.parse("31/02/2024").unwrap_err();
        assert!(err.contains("Invalid date '31/02/2024'"));
        assert!(parser.parse("yesterday").is_err());
        assert!(parser.parse("1/2").is_err());
        assert!(parser.parse("1/2/202").is_err());
    }

    #[test]
    fn suspicious_dates_only_warn() {
        let parser = DateParser::new(Some(DateFormat::YearMonthDay), None, today());
        let future = parser.parse("2030-01-01").unwrap();
        assert!(future.warnings[0].contains("future"));
        let old = parser.parse("1901-05-05").unwrap();
        assert!(old.warnings[0].contains("implausibly old"));
    }

    #[test]
    fn trailing_time_is_ignored() {
        let parser = DateParser::new(None, None, today());
        let parsed = parser.parse("2024-01-15T10:30:00").unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn canonical_form_ignores_the_written_pattern() {
        let iso = canonical_date("2024-03-14", None);
        assert_eq!(iso.as_deref(), Some("2024-03-14"));
        assert_eq!(canonical_date("14/03/2024", Some(DateFormat::DayMonthYear)), iso);
        assert_eq!(canonical_date("03/14/2024", Some(DateFormat::MonthDayYear)), iso);
        assert_eq!(canonical_date("14/03/2024", None), None);
        assert_eq!(canonical_date("31/02/2024", Some(DateFormat::DayMonthYear)), None);
    }

    #[test]
    fn format_names_parse_loosely() {
        assert_eq!(DateFormat::parse("dd/mm/yyyy").unwrap(), DateFormat::DayMonthYear);
        assert_eq!(DateFormat::parse("MDY").unwrap(), DateFormat::MonthDayYear);
        assert_eq!(DateFormat::parse("YYYY-MM-DD").unwrap(), DateFormat::YearMonthDay);
        assert!(DateFormat::parse("julian").is_err());
    }
}
