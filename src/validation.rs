//! Import validation: raw rows in, clean records plus a report out.
//!
//! Rows are processed strictly in source order. Duplicate detection for a
//! row sees the pre-existing dataset and every row accepted before it, so
//! identifier reuse and duplicate verdicts are deterministic. Row-level
//! problems never abort the run; only a missing score column does.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::dates::{DateFormat, DateParser, ParsedDate};
use crate::duplicates::{check_for_duplicate, Identity};
use crate::error::Result;
use crate::headers::{self, ColumnMap};
use crate::ids::IdSequence;
use crate::models::{CustomerRecord, ImportOutcome, RawTable, ReportEntry, ValidationReport};
use crate::scale::{ScalePair, ScaleRange};

/// Marker values that template files put in place of data.
pub const SENTINEL_TOKENS: &[&str] = &["optional", "required"];

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Validates imported rows against one pair of scales.
#[derive(Debug, Clone)]
pub struct ImportValidator {
    satisfaction_header: String,
    loyalty_header: String,
    scales: ScalePair,
    date_format: Option<DateFormat>,
    today: NaiveDate,
}

impl ImportValidator {
    /// `today` anchors the "date in the future" warning.
    pub fn new(
        satisfaction_header: impl Into<String>,
        loyalty_header: impl Into<String>,
        scales: ScalePair,
        today: NaiveDate,
    ) -> Self {
        Self {
            satisfaction_header: satisfaction_header.into(),
            loyalty_header: loyalty_header.into(),
            scales,
            date_format: None,
            today,
        }
    }

    /// Lock the date pattern instead of inferring it from the header.
    pub fn with_date_format(mut self, date_format: Option<DateFormat>) -> Self {
        self.date_format = date_format;
        self
    }

    /// Validate every row of `table` against `existing`, minting ids from `ids`.
    pub fn validate(
        &self,
        table: &RawTable,
        existing: &[CustomerRecord],
        ids: &mut IdSequence,
    ) -> Result<ImportOutcome> {
        let columns = headers::map_columns(
            &table.headers,
            &self.satisfaction_header,
            &self.loyalty_header,
        )?;
        let date_parser = DateParser::new(
            self.date_format,
            columns.date.map(|i| table.headers[i].as_str()),
            self.today,
        );

        let mut accepted: Vec<CustomerRecord> = Vec::new();
        let mut report = ValidationReport::default();
        let mut skipped_rows = 0usize;

        for (index, row) in table.rows.iter().enumerate() {
            // Row 1 is the header.
            let row_number = index + 2;
            if is_blank(row) || is_sentinel_row(row) {
                skipped_rows += 1;
                continue;
            }

            let draft = self.inspect_row(row, &columns, &date_parser, existing);
            if !draft.errors.is_empty() {
                tracing::debug!(row = row_number, reasons = ?draft.errors, "Row rejected");
                report.rejected.push(ReportEntry {
                    row: row_number,
                    id: draft.attempted_id.clone(),
                    reason: draft.errors.join("; "),
                    excerpt: draft.excerpt.join(", "),
                });
                continue;
            }

            let date_display = draft.date.as_ref().map(ParsedDate::display);
            let duplicate = {
                let identity = Identity {
                    id: draft.attempted_id.as_deref(),
                    name: draft.name.as_deref(),
                    email: draft.email.as_deref(),
                    date: date_display.as_deref(),
                    date_format: draft.date.as_ref().map(|d| d.format),
                };
                let check = check_for_duplicate(identity, existing.iter().chain(&accepted), None);
                check.matched.zip(check.reason).map(|(m, r)| (m.id.clone(), r))
            };
            if let Some((matched_id, reason)) = duplicate {
                report.rejected.push(ReportEntry {
                    row: row_number,
                    id: draft.attempted_id.clone(),
                    reason: format!("Duplicate of record '{matched_id}' (matched on {reason})"),
                    excerpt: draft.identity_excerpt(date_display.as_deref()),
                });
                continue;
            }

            let id = match draft.attempted_id.clone() {
                Some(id) => {
                    ids.observe(&id);
                    id
                }
                None => ids.mint()?,
            };
            if let Some(parsed) = &draft.date {
                for warning in &parsed.warnings {
                    report.warnings.push(ReportEntry {
                        row: row_number,
                        id: Some(id.clone()),
                        reason: warning.clone(),
                        excerpt: format!("date={}", draft.raw_date.as_deref().unwrap_or_default()),
                    });
                }
            }

            accepted.push(CustomerRecord {
                id,
                name: draft.name,
                email: draft.email,
                satisfaction: draft.satisfaction.unwrap_or_default(),
                loyalty: draft.loyalty.unwrap_or_default(),
                date: date_display,
                date_format: draft.date.map(|d| d.format),
                attributes: extra_attributes(&table.headers, row, &columns),
                excluded: false,
            });
        }

        tracing::info!(
            accepted = accepted.len(),
            rejected = report.rejected.len(),
            warnings = report.warnings.len(),
            skipped = skipped_rows,
            "Import validated",
        );

        Ok(ImportOutcome {
            records: accepted,
            report,
            skipped_rows,
        })
    }

    fn inspect_row(
        &self,
        row: &[String],
        columns: &ColumnMap,
        date_parser: &DateParser,
        existing: &[CustomerRecord],
    ) -> RowDraft {
        let mut draft = RowDraft::default();

        draft.satisfaction = parse_score(
            "Satisfaction",
            cell(row, columns.satisfaction),
            &self.scales.satisfaction,
            &mut draft,
        );
        draft.loyalty = parse_score(
            "Loyalty",
            cell(row, columns.loyalty),
            &self.scales.loyalty,
            &mut draft,
        );

        draft.name = optional_cell(row, columns.name);
        draft.email = optional_cell(row, columns.email);
        if let Some(email) = &draft.email {
            if !is_valid_email(email) {
                draft.errors.push(format!("Invalid email format '{email}'"));
                draft.excerpt.push(format!("email={email}"));
            }
        }

        draft.attempted_id = optional_cell(row, columns.id).or_else(|| {
            // Link a returning customer to the id they already have.
            let email = draft.email.as_deref()?;
            existing
                .iter()
                .find(|r| {
                    r.email
                        .as_deref()
                        .is_some_and(|e| e.trim().eq_ignore_ascii_case(email))
                })
                .map(|r| r.id.clone())
        });

        draft.raw_date = optional_cell(row, columns.date);
        if let Some(raw) = &draft.raw_date {
            match date_parser.parse(raw) {
                Ok(parsed) => draft.date = Some(parsed),
                Err(reason) => {
                    draft.errors.push(reason);
                    draft.excerpt.push(format!("date={raw}"));
                }
            }
        }

        draft
    }
}

/// What one row turned into before the accept/reject decision.
#[derive(Debug, Default)]
struct RowDraft {
    satisfaction: Option<f64>,
    loyalty: Option<f64>,
    name: Option<String>,
    email: Option<String>,
    attempted_id: Option<String>,
    raw_date: Option<String>,
    date: Option<ParsedDate>,
    errors: Vec<String>,
    excerpt: Vec<String>,
}

impl RowDraft {
    fn identity_excerpt(&self, date: Option<&str>) -> String {
        let mut parts = Vec::new();
        if let Some(id) = &self.attempted_id {
            parts.push(format!("id={id}"));
        }
        if let Some(email) = &self.email {
            parts.push(format!("email={email}"));
        }
        if let Some(name) = &self.name {
            parts.push(format!("name={name}"));
        }
        if let Some(date) = date {
            parts.push(format!("date={date}"));
        }
        parts.join(", ")
    }
}

fn parse_score(label: &str, raw: &str, scale: &ScaleRange, draft: &mut RowDraft) -> Option<f64> {
    let field = label.to_lowercase();
    if raw.is_empty() {
        draft.errors.push(format!("Missing {field} value"));
        draft.excerpt.push(format!("{field}=(empty)"));
        return None;
    }
    let Some(value) = raw.parse::<f64>().ok().filter(|v| v.is_finite()) else {
        draft
            .errors
            .push(format!("{label} value '{raw}' is not a number"));
        draft.excerpt.push(format!("{field}={raw}"));
        return None;
    };
    if !scale.contains(value) {
        draft.errors.push(format!(
            "{label} must be between {} and {} (got {raw})",
            scale.min(),
            scale.max()
        ));
        draft.excerpt.push(format!("{field}={raw}"));
        return None;
    }
    Some(value)
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|s| s.trim()).unwrap_or("")
}

fn optional_cell(row: &[String], index: Option<usize>) -> Option<String> {
    index
        .map(|i| cell(row, i))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|v| v.trim().is_empty())
}

/// Only template markers (and blanks) in the row.
fn is_sentinel_row(row: &[String]) -> bool {
    let mut values = row.iter().map(|v| v.trim()).filter(|v| !v.is_empty()).peekable();
    values.peek().is_some()
        && values.all(|v| {
            SENTINEL_TOKENS
                .iter()
                .any(|token| v.eq_ignore_ascii_case(token))
        })
}

fn extra_attributes(headers: &[String], row: &[String], columns: &ColumnMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .enumerate()
        .filter(|(index, header)| columns.is_extra(*index) && !header.trim().is_empty())
        .map(|(index, header)| (header.trim().to_lowercase(), cell(row, index).to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    fn validator(sat: &str, loy: &str) -> ImportValidator {
        let scales = ScalePair::new(ScaleRange::parse(sat).unwrap(), ScaleRange::parse(loy).unwrap());
        ImportValidator::new(
            "Satisfaction",
            "Loyalty",
            scales,
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        )
    }

    fn run(v: &ImportValidator, t: &RawTable, existing: &[CustomerRecord]) -> ImportOutcome {
        let mut ids = IdSequence::seeded_from("CUST-", existing);
        v.validate(t, existing, &mut ids).unwrap()
    }

    #[test]
    fn clean_import_is_accepted() {
        let t = table(&["Satisfaction", "Loyalty"], &[&["4", "8"]]);
        let outcome = run(&validator("1-5", "0-10"), &t, &[]);

        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.satisfaction, 4.0);
        assert_eq!(record.loyalty, 8.0);
        assert_eq!(record.id, "CUST-0001");
        assert!(outcome.report.is_clean());
    }

    #[test]
    fn out_of_range_loyalty_is_rejected() {
        let t = table(&["Satisfaction", "Loyalty"], &[&["4", "11"]]);
        let outcome = run(&validator("1-5", "0-10"), &t, &[]);

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.report.rejected.len(), 1);
        let entry = &outcome.report.rejected[0];
        assert!(entry.reason.contains("between 0 and 10"));
        assert_eq!(entry.excerpt, "loyalty=11");
    }

    #[test]
    fn loyalty_lower_bound_follows_the_scale() {
        let t = table(&["Satisfaction", "Loyalty"], &[&["1", "0"]]);
        let outcome = run(&validator("1-5", "0-10"), &t, &[]);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].loyalty, 0.0);
    }

    #[test]
    fn rejection_uses_source_row_number() {
        let t = table(
            &["Satisfaction", "Loyalty"],
            &[&["3", "3"], &["9", "3"], &["2", "2"]],
        );
        let outcome = run(&validator("1-5", "1-5"), &t, &[]);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.report.rejected[0].row, 3);
    }

    #[test]
    fn blank_and_template_rows_are_skipped() {
        let t = table(
            &["Satisfaction", "Loyalty", "Email"],
            &[&["REQUIRED", "required", "Optional"], &["", " ", ""], &["abc", "3", ""]],
        );
        let outcome = run(&validator("1-5", "1-5"), &t, &[]);
        assert_eq!(outcome.skipped_rows, 2);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.report.rejected.len(), 1);
        assert_eq!(outcome.report.rejected[0].row, 4);
        assert!(outcome.report.rejected[0].reason.contains("not a number"));
    }

    #[test]
    fn all_row_problems_are_reported_together() {
        let t = table(
            &["Satisfaction", "Loyalty", "Email", "Date"],
            &[&["", "3", "not-an-email", "31/02/2024"]],
        );
        let outcome = run(&validator("1-5", "1-5"), &t, &[]);
        let entry = &outcome.report.rejected[0];
        assert!(entry.reason.contains("Missing satisfaction value"));
        assert!(entry.reason.contains("Invalid email format 'not-an-email'"));
        assert!(entry.reason.contains("Invalid date '31/02/2024'"));
        assert_eq!(
            entry.excerpt,
            "satisfaction=(empty), email=not-an-email, date=31/02/2024"
        );
    }

    #[test]
    fn returning_customer_keeps_their_id() {
        let existing = vec![CustomerRecord::new("CUST-0007", 2.0, 2.0)
            .with_email("a@x.com")
            .with_date("2024-01-01")];
        let t = table(
            &["Satisfaction", "Loyalty", "Email", "Date"],
            &[
                &["4", "4", "A@x.com", "2024-02-01"],
                &["4", "4", "a@x.com", "2024-01-01"],
                &["3", "3", "new@x.com", "2024-02-01"],
            ],
        );
        let outcome = run(&validator("1-5", "1-5"), &t, &existing);

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].id, "CUST-0007");
        assert_eq!(outcome.records[0].date.as_deref(), Some("2024-02-01"));
        assert_eq!(outcome.records[1].id, "CUST-0008");

        let rejected = &outcome.report.rejected[0];
        assert_eq!(rejected.row, 3);
        assert_eq!(rejected.id.as_deref(), Some("CUST-0007"));
        assert_eq!(
            rejected.reason,
            "Duplicate of record 'CUST-0007' (matched on id and date)"
        );
    }

    #[test]
    fn duplicates_within_the_batch_are_rejected() {
        let t = table(
            &["Satisfaction", "Loyalty", "Email"],
            &[&["4", "4", "a@x.com"], &["2", "2", "a@x.com"]],
        );
        let outcome = run(&validator("1-5", "1-5"), &t, &[]);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(
            outcome.report.rejected[0].reason,
            "Duplicate of record 'CUST-0001' (matched on email)"
        );
    }

    #[test]
    fn minted_ids_skip_explicit_ids_in_the_same_batch() {
        let t = table(
            &["Customer ID", "Email", "Satisfaction", "Loyalty"],
            &[&["CUST-0001", "a@x.com", "4", "4"], &["", "b@x.com", "2", "2"]],
        );
        let outcome = run(&validator("1-5", "1-5"), &t, &[]);
        let ids: Vec<(&str, Option<&str>)> = outcome
            .records
            .iter()
            .map(|r| (r.id.as_str(), r.email.as_deref()))
            .collect();
        assert_eq!(
            ids,
            [("CUST-0001", Some("a@x.com")), ("CUST-0002", Some("b@x.com"))]
        );
    }

    #[test]
    fn same_day_in_another_pattern_is_a_duplicate() {
        let existing = vec![CustomerRecord::new("CUST-0001", 3.0, 3.0)
            .with_email("a@x.com")
            .with_date("2024-03-14")];
        let t = table(
            &["Satisfaction", "Loyalty", "Email", "Date (DD/MM/YYYY)"],
            &[&["4", "4", "a@x.com", "14/03/2024"]],
        );
        let outcome = run(&validator("1-5", "1-5"), &t, &existing);
        assert!(outcome.records.is_empty());
        assert_eq!(
            outcome.report.rejected[0].reason,
            "Duplicate of record 'CUST-0001' (matched on id and date)"
        );
    }

    #[test]
    fn suspicious_dates_warn_but_keep_the_row() {
        let t = table(
            &["Satisfaction", "Loyalty", "Date (YYYY-MM-DD)"],
            &[&["4", "4", "2031-01-01"]],
        );
        let outcome = run(&validator("1-5", "1-5"), &t, &[]);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.report.warnings.len(), 1);
        let warning = &outcome.report.warnings[0];
        assert_eq!(warning.row, 2);
        assert_eq!(warning.id.as_deref(), Some("CUST-0001"));
        assert!(warning.reason.contains("future"));
    }

    #[test]
    fn locked_date_format_overrides_header() {
        let t = table(
            &["Satisfaction", "Loyalty", "Date (DD/MM/YYYY)"],
            &[&["4", "4", "02/13/2024"]],
        );
        let v = validator("1-5", "1-5").with_date_format(Some(DateFormat::MonthDayYear));
        let outcome = run(&v, &t, &[]);
        assert_eq!(outcome.records[0].date.as_deref(), Some("02/13/2024"));
        assert_eq!(outcome.records[0].date_format, Some(DateFormat::MonthDayYear));
    }

    #[test]
    fn explicit_ids_and_extra_columns_are_kept() {
        let t = table(
            &["Customer ID", "Name", "Satisfaction", "Loyalty", "Region", "Plan Tier"],
            &[&["R-17", "Jo", "5", "5", "North", "Gold"]],
        );
        let outcome = run(&validator("1-5", "1-5"), &t, &[]);
        let record = &outcome.records[0];
        assert_eq!(record.id, "R-17");
        assert_eq!(record.name.as_deref(), Some("Jo"));
        assert_eq!(record.attributes.get("region").map(String::as_str), Some("North"));
        assert_eq!(record.attributes.get("plan tier").map(String::as_str), Some("Gold"));
        assert_eq!(record.attributes.len(), 2);
    }

    #[test]
    fn missing_score_column_fails_the_run() {
        let t = table(&["Satisfaction", "Email"], &[&["4", "a@x.com"]]);
        let v = validator("1-5", "1-5");
        let mut ids = IdSequence::new("CUST-", 1);
        assert!(v.validate(&t, &[], &mut ids).is_err());
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("jo.smith+tag@example.co.uk"));
        assert!(!is_valid_email("jo@example"));
        assert!(!is_valid_email("jo smith@example.com"));
        assert!(!is_valid_email("@example.com"));
    }
}
