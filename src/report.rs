use std::fmt::Write;

use crate::geometry::GridGeometry;
use crate::models::ValidationReport;
use crate::proximity::ProximityReport;
use crate::segment::{SegmentDistribution, SegmentTally};

/// How many rejected rows are listed before the report summarises the rest.
const REJECTION_LIMIT: usize = 20;

pub fn build_report(
    title: &str,
    geometry: &GridGeometry,
    distribution: &SegmentDistribution,
    proximity: &ProximityReport,
    validation: Option<&ValidationReport>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Loyalty Segment Report: {title}");
    let _ = writeln!(
        output,
        "Satisfaction {} x Loyalty {}, midpoint ({}, {}), {} active records ({} excluded)",
        geometry.scales.satisfaction,
        geometry.scales.loyalty,
        geometry.midpoint.satisfaction,
        geometry.midpoint.loyalty,
        distribution.active_total,
        distribution.excluded
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Segment Mix");

    if distribution.segments.is_empty() {
        let _ = writeln!(output, "No active records.");
    } else {
        let mut segments: Vec<_> = distribution.segments.iter().collect();
        segments.sort_by(|a, b| b.1.count.cmp(&a.1.count).then(a.0.cmp(b.0)));
        for (segment, tally) in segments {
            let _ = writeln!(output, "- {}", tally_line(&segment.to_string(), tally));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "## Boundary Proximity (within {} cell{})",
        proximity.threshold,
        if proximity.threshold == 1 { "" } else { "s" }
    );

    if proximity.boundaries.is_empty() {
        let _ = writeln!(output, "No records outside the corner zones.");
    } else {
        for (bucket, tally) in &proximity.boundaries {
            let _ = writeln!(output, "- {}", tally_line(&bucket.to_string(), tally));
        }
    }

    if !proximity.corners.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Corner Proximity");
        for (bucket, tally) in &proximity.corners {
            let _ = writeln!(output, "- {}", tally_line(&bucket.to_string(), tally));
        }
    }

    if let Some(validation) = validation {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Import Validation");
        let _ = writeln!(
            output,
            "{} rejected, {} warnings",
            validation.rejected.len(),
            validation.warnings.len()
        );

        for entry in validation.rejected.iter().take(REJECTION_LIMIT) {
            let _ = writeln!(
                output,
                "- Row {} [{}]: {} ({})",
                entry.row,
                entry.id.as_deref().unwrap_or("no id"),
                entry.reason,
                entry.excerpt
            );
        }
        if validation.rejected.len() > REJECTION_LIMIT {
            let _ = writeln!(
                output,
                "- ... and {} more",
                validation.rejected.len() - REJECTION_LIMIT
            );
        }
    }

    output
}

fn tally_line(label: &str, tally: &SegmentTally) -> String {
    format!("{label}: {} ({:.1}%)", tally.count, tally.percentage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProximitySettings, SpecialZones};
    use crate::models::{CustomerRecord, ReportEntry};
    use crate::proximity::classify_proximity;
    use crate::scale::{Midpoint, ScalePair, ScaleRange};
    use crate::segment::distribution;

    fn fixture() -> (GridGeometry, Vec<CustomerRecord>) {
        let scales = ScalePair::new(ScaleRange::new(1, 5).unwrap(), ScaleRange::new(1, 5).unwrap());
        let geometry = GridGeometry::compute(&scales, Midpoint::default_for(&scales)).unwrap();
        let records = vec![
            CustomerRecord::new("CUST-0001", 5.0, 5.0),
            CustomerRecord::new("CUST-0002", 4.0, 4.0),
            CustomerRecord::new("CUST-0003", 1.0, 5.0),
        ];
        (geometry, records)
    }

    #[test]
    fn report_lists_segments_and_proximity() {
        let (geometry, records) = fixture();
        let zones = SpecialZones::default();
        let dist = distribution(&records, &geometry, &zones);
        let prox = classify_proximity(&records, &geometry, &ProximitySettings::default(), &zones);

        let report = build_report("Q3 survey", &geometry, &dist, &prox, None);

        assert!(report.starts_with("# Loyalty Segment Report: Q3 survey"));
        assert!(report.contains("midpoint (3, 3), 3 active records (0 excluded)"));
        assert!(report.contains("## Segment Mix"));
        assert!(report.contains("(33.3%)"));
        assert!(report.contains("## Boundary Proximity (within 1 cell)"));
        assert!(!report.contains("## Import Validation"));
    }

    #[test]
    fn report_includes_validation_summary() {
        let (geometry, records) = fixture();
        let zones = SpecialZones::default();
        let dist = distribution(&records, &geometry, &zones);
        let prox = classify_proximity(&records, &geometry, &ProximitySettings::default(), &zones);
        let validation = ValidationReport {
            rejected: vec![ReportEntry {
                row: 4,
                id: None,
                reason: "Satisfaction must be between 1 and 5 (got 9)".to_string(),
                excerpt: "Satisfaction=9".to_string(),
            }],
            warnings: Vec::new(),
        };

        let report = build_report("import", &geometry, &dist, &prox, Some(&validation));

        assert!(report.contains("1 rejected, 0 warnings"));
        assert!(report.contains("- Row 4 [no id]: Satisfaction must be between 1 and 5 (got 9)"));
    }

    #[test]
    fn empty_dataset_says_so() {
        let (geometry, _) = fixture();
        let zones = SpecialZones::default();
        let dist = distribution(&[], &geometry, &zones);
        let prox = classify_proximity(&[], &geometry, &ProximitySettings::default(), &zones);

        let report = build_report("empty", &geometry, &dist, &prox, None);

        assert!(report.contains("No active records."));
        assert!(report.contains("No records outside the corner zones."));
    }
}
