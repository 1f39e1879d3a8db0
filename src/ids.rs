use crate::error::{EngineError, Result};
use crate::models::CustomerRecord;

/// Hands out sequential identifiers such as `CUST-0042`.
///
/// Seeded from the highest numeric suffix already in use, and moved past
/// every id seen afterwards, so minted ids never collide with a stored one.
#[derive(Debug, Clone)]
pub struct IdSequence {
    prefix: String,
    /// `None` once a suffix of `u64::MAX` has been seen or handed out.
    next: Option<u64>,
}

impl IdSequence {
    pub fn new(prefix: impl Into<String>, next: u64) -> Self {
        Self {
            prefix: prefix.into(),
            next: Some(next.max(1)),
        }
    }

    pub fn seeded_from(prefix: impl Into<String>, existing: &[CustomerRecord]) -> Self {
        let mut ids = Self::new(prefix, 1);
        for record in existing {
            ids.observe(&record.id);
        }
        ids
    }

    /// Record that `id` is taken. The sequence only ever moves forward.
    pub fn observe(&mut self, id: &str) {
        let (Some(n), Some(next)) = (numeric_suffix(id), self.next) else {
            return;
        };
        if n >= next {
            self.next = n.checked_add(1);
        }
    }

    /// The id the next call to [`IdSequence::mint`] will return.
    pub fn peek(&self) -> Option<String> {
        self.next.map(|n| format!("{}{:04}", self.prefix, n))
    }

    pub fn mint(&mut self) -> Result<String> {
        let n = self
            .next
            .ok_or_else(|| EngineError::IdSequenceExhausted(self.prefix.clone()))?;
        self.next = n.checked_add(1);
        Ok(format!("{}{:04}", self.prefix, n))
    }
}

/// Trailing digits of an identifier, e.g. `42` for `CUST-0042`.
pub fn numeric_suffix(id: &str) -> Option<u64> {
    let digits: String = id
        .trim()
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_ignores_prefix_text() {
        assert_eq!(numeric_suffix("CUST-0042"), Some(42));
        assert_eq!(numeric_suffix("17"), Some(17));
        assert_eq!(numeric_suffix("abc"), None);
        assert_eq!(numeric_suffix("A12B"), None);
    }

    #[test]
    fn seeds_past_the_highest_existing_id() {
        let existing = vec![
            CustomerRecord::new("CUST-0007", 3.0, 3.0),
            CustomerRecord::new("legacy-19", 3.0, 3.0),
            CustomerRecord::new("no-digits", 3.0, 3.0),
        ];
        let mut ids = IdSequence::seeded_from("CUST-", &existing);
        assert_eq!(ids.mint().unwrap(), "CUST-0020");
        assert_eq!(ids.mint().unwrap(), "CUST-0021");
    }

    #[test]
    fn observed_ids_are_never_minted() {
        let mut ids = IdSequence::seeded_from("CUST-", &[]);
        ids.observe("CUST-0001");
        assert_eq!(ids.mint().unwrap(), "CUST-0002");
        ids.observe("CUST-0009");
        ids.observe("CUST-0004");
        ids.observe("walk-in");
        assert_eq!(ids.mint().unwrap(), "CUST-0010");
    }

    #[test]
    fn largest_suffix_does_not_overflow() {
        let existing = vec![CustomerRecord::new("18446744073709551615", 3.0, 3.0)];
        let mut ids = IdSequence::seeded_from("CUST-", &existing);
        assert_eq!(ids.peek(), None);
        assert!(matches!(ids.mint(), Err(EngineError::IdSequenceExhausted(_))));

        let mut ids = IdSequence::new("CUST-", u64::MAX);
        assert_eq!(ids.mint().unwrap(), "CUST-18446744073709551615");
        assert!(ids.mint().is_err());
    }

    #[test]
    fn empty_dataset_starts_at_one() {
        let mut ids = IdSequence::seeded_from("R", &[]);
        assert_eq!(ids.peek().as_deref(), Some("R0001"));
        assert_eq!(ids.mint().unwrap(), "R0001");
        assert_eq!(ids.peek().as_deref(), Some("R0002"));
    }
}
