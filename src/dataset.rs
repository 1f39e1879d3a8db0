//! An in-memory record set with manual entry, edit and soft-delete.
//!
//! Records are addressed by position: historical entries share a customer
//! id, so the id alone does not identify a row.

use crate::duplicates::{check_for_duplicate, Identity};
use crate::error::{EngineError, Result};
use crate::ids::IdSequence;
use crate::models::CustomerRecord;
use crate::scale::ScalePair;

#[derive(Debug, Clone)]
pub struct Dataset {
    scales: ScalePair,
    records: Vec<CustomerRecord>,
    ids: IdSequence,
}

impl Dataset {
    pub fn new(scales: ScalePair, records: Vec<CustomerRecord>, id_prefix: &str) -> Self {
        let ids = IdSequence::seeded_from(id_prefix, &records);
        Self {
            scales,
            records,
            ids,
        }
    }

    pub fn scales(&self) -> ScalePair {
        self.scales
    }

    pub fn records(&self) -> &[CustomerRecord] {
        &self.records
    }

    pub fn active(&self) -> impl Iterator<Item = &CustomerRecord> {
        self.records.iter().filter(|r| r.is_active())
    }

    /// Add a manually entered record. A blank id is replaced with a fresh one.
    pub fn add(&mut self, mut record: CustomerRecord) -> Result<&CustomerRecord> {
        self.check_scores(&record)?;
        let identity_id = (!record.id.trim().is_empty()).then(|| record.id.clone());
        let candidate = Identity {
            id: identity_id.as_deref(),
            ..Identity::from(&record)
        };
        reject_duplicate(check_for_duplicate(candidate, &self.records, None))?;

        match identity_id {
            Some(id) => self.ids.observe(&id),
            None => record.id = self.ids.mint()?,
        }
        self.records.push(record);
        let index = self.records.len() - 1;
        Ok(&self.records[index])
    }

    /// Append records that already went through import validation.
    pub fn extend(&mut self, records: Vec<CustomerRecord>) {
        for record in &records {
            self.ids.observe(&record.id);
        }
        self.records.extend(records);
    }

    /// Replace the record at `index`. The record's original id is excluded
    /// from the duplicate check so an edit never collides with itself.
    pub fn edit(&mut self, index: usize, updated: CustomerRecord) -> Result<()> {
        let original_id = self
            .records
            .get(index)
            .map(|r| r.id.clone())
            .ok_or(EngineError::RecordNotFound(index))?;
        self.check_scores(&updated)?;
        reject_duplicate(check_for_duplicate(
            Identity::from(&updated),
            &self.records,
            Some(&original_id),
        ))?;

        self.ids.observe(&updated.id);
        self.records[index] = updated;
        Ok(())
    }

    /// Soft delete or restore. Excluded records stay stored but drop out of
    /// classification and statistics.
    pub fn set_excluded(&mut self, index: usize, excluded: bool) -> Result<()> {
        let record = self
            .records
            .get_mut(index)
            .ok_or(EngineError::RecordNotFound(index))?;
        record.excluded = excluded;
        Ok(())
    }

    fn check_scores(&self, record: &CustomerRecord) -> Result<()> {
        let sat = self.scales.satisfaction;
        let loy = self.scales.loyalty;
        if !sat.contains(record.satisfaction) {
            return Err(EngineError::InvalidRecord(format!(
                "Satisfaction must be between {} and {}",
                sat.min(),
                sat.max()
            )));
        }
        if !loy.contains(record.loyalty) {
            return Err(EngineError::InvalidRecord(format!(
                "Loyalty must be between {} and {}",
                loy.min(),
                loy.max()
            )));
        }
        Ok(())
    }
}

fn reject_duplicate(check: crate::duplicates::DuplicateCheck<'_>) -> Result<()> {
    match (check.matched, check.reason) {
        (Some(matched), Some(reason)) => Err(EngineError::Duplicate {
            id: matched.id.clone(),
            reason: reason.to_string(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::ScaleRange;

    fn dataset(records: Vec<CustomerRecord>) -> Dataset {
        let scales = ScalePair::new(ScaleRange::new(1, 5).unwrap(), ScaleRange::new(0, 10).unwrap());
        Dataset::new(scales, records, "CUST-")
    }

    #[test]
    fn manual_entry_mints_an_id() {
        let mut data = dataset(vec![CustomerRecord::new("CUST-0003", 4.0, 8.0)]);
        let added = data
            .add(CustomerRecord::new("", 2.0, 5.0).with_name("Sam"))
            .unwrap();
        assert_eq!(added.id, "CUST-0004");
        assert_eq!(data.records().len(), 2);
    }

    #[test]
    fn minted_ids_skip_explicit_and_appended_ids() {
        let mut data = dataset(vec![]);
        data.extend(vec![CustomerRecord::new("CUST-0001", 4.0, 8.0).with_email("a@x.com")]);
        let added = data
            .add(CustomerRecord::new("", 2.0, 5.0).with_email("b@x.com"))
            .unwrap();
        assert_eq!(added.id, "CUST-0002");

        data.add(CustomerRecord::new("CUST-0005", 3.0, 3.0).with_email("c@x.com"))
            .unwrap();
        let added = data
            .add(CustomerRecord::new("", 3.0, 3.0).with_email("d@x.com"))
            .unwrap();
        assert_eq!(added.id, "CUST-0006");

        let ids: Vec<&str> = data.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["CUST-0001", "CUST-0002", "CUST-0005", "CUST-0006"]);
    }

    #[test]
    fn manual_duplicate_is_refused() {
        let mut data = dataset(vec![CustomerRecord::new("CUST-0001", 4.0, 8.0).with_email("a@x.com")]);
        let err = data
            .add(CustomerRecord::new("", 2.0, 5.0).with_email("a@x.com"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Duplicate { ref id, ref reason } if id == "CUST-0001" && reason == "email"));
    }

    #[test]
    fn historical_entry_can_be_added() {
        let mut data = dataset(vec![CustomerRecord::new("CUST-0001", 4.0, 8.0)
            .with_email("a@x.com")
            .with_date("2024-01-01")]);
        let added = data
            .add(
                CustomerRecord::new("CUST-0001", 3.0, 6.0)
                    .with_email("a@x.com")
                    .with_date("2024-04-01"),
            )
            .unwrap();
        assert_eq!(added.id, "CUST-0001");
    }

    #[test]
    fn editing_a_record_never_matches_itself() {
        let mut data = dataset(vec![
            CustomerRecord::new("CUST-0001", 4.0, 8.0).with_email("a@x.com"),
            CustomerRecord::new("CUST-0002", 2.0, 2.0).with_email("b@x.com"),
        ]);
        let mut edited = data.records()[0].clone();
        edited.satisfaction = 5.0;
        data.edit(0, edited).unwrap();
        assert_eq!(data.records()[0].satisfaction, 5.0);

        let mut clash = data.records()[0].clone();
        clash.email = Some("b@x.com".to_string());
        assert!(data.edit(0, clash).is_err());
    }

    #[test]
    fn out_of_scale_scores_are_refused() {
        let mut data = dataset(vec![]);
        assert!(matches!(
            data.add(CustomerRecord::new("", 6.0, 5.0)),
            Err(EngineError::InvalidRecord(_))
        ));
        assert!(data.edit(3, CustomerRecord::new("x", 1.0, 1.0)).is_err());
    }

    #[test]
    fn excluded_records_leave_the_active_view() {
        let mut data = dataset(vec![
            CustomerRecord::new("CUST-0001", 4.0, 8.0),
            CustomerRecord::new("CUST-0002", 2.0, 2.0),
        ]);
        data.set_excluded(1, true).unwrap();
        assert_eq!(data.active().count(), 1);
        assert_eq!(data.records().len(), 2);
        data.set_excluded(1, false).unwrap();
        assert_eq!(data.active().count(), 2);
        assert!(data.set_excluded(9, true).is_err());
    }
}
