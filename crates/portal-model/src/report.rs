//! Per-run accounting of descriptor outcomes and data-quality findings.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a non-fatal data-quality finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WarningKind {
    /// An MRN maps to multiple portal ids, or the reverse.
    DuplicateAnchorId,
    /// `SAMPLE_ID[0..9]` disagrees with the declared portal id.
    MalformedSampleId,
    /// Subject present in a source table but absent from the anchor table
    /// or the template.
    UnmatchedSubject,
    /// A date value failed to parse; the cell propagated as null.
    DateParseFailure,
    /// Column present in exactly one of {descriptor YAML, merged data}.
    ColumnMismatch,
    /// A later intermediate re-introduced a column already merged.
    MergeCollision,
    /// A column in a final artifact contains no values at all.
    AllNullColumn,
    /// Miscellaneous descriptor-level finding (extra metadata keys, ...).
    Descriptor,
}

impl WarningKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DuplicateAnchorId => "duplicate anchor id",
            Self::MalformedSampleId => "malformed sample id",
            Self::UnmatchedSubject => "unmatched subject",
            Self::DateParseFailure => "date parse failure",
            Self::ColumnMismatch => "column mismatch",
            Self::MergeCollision => "merge collision",
            Self::AllNullColumn => "all-null column",
            Self::Descriptor => "descriptor",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated occurrences of one warning kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningGroup {
    /// Message of the first occurrence; later occurrences only bump `count`.
    pub first: String,
    pub count: usize,
}

/// Outcome of one descriptor within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescriptorOutcome {
    Processed { rows: usize },
    Skipped { reason: String },
    Failed { error: String },
}

/// Accumulated outcomes and warnings for one pipeline run.
///
/// Warnings never fail the run; the CLI prints them in the end-of-run
/// summary. Per-descriptor failures are recorded here and leave the exit
/// code untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub descriptors: Vec<(String, DescriptorOutcome)>,
    warnings: BTreeMap<WarningKind, WarningGroup>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&mut self, summary_id: impl Into<String>, rows: usize) {
        self.descriptors
            .push((summary_id.into(), DescriptorOutcome::Processed { rows }));
    }

    pub fn record_skipped(&mut self, summary_id: impl Into<String>, reason: impl Into<String>) {
        self.descriptors.push((
            summary_id.into(),
            DescriptorOutcome::Skipped {
                reason: reason.into(),
            },
        ));
    }

    pub fn record_failed(&mut self, summary_id: impl Into<String>, error: impl Into<String>) {
        self.descriptors.push((
            summary_id.into(),
            DescriptorOutcome::Failed {
                error: error.into(),
            },
        ));
    }

    /// Record one warning occurrence, keeping the first message per kind.
    pub fn warn(&mut self, kind: WarningKind, message: impl Into<String>) {
        let entry = self.warnings.entry(kind).or_insert_with(|| WarningGroup {
            first: message.into(),
            count: 0,
        });
        entry.count += 1;
    }

    pub fn warnings(&self) -> &BTreeMap<WarningKind, WarningGroup> {
        &self.warnings
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.values().map(|group| group.count).sum()
    }

    pub fn processed_count(&self) -> usize {
        self.outcome_count(|outcome| matches!(outcome, DescriptorOutcome::Processed { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.outcome_count(|outcome| matches!(outcome, DescriptorOutcome::Skipped { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.outcome_count(|outcome| matches!(outcome, DescriptorOutcome::Failed { .. }))
    }

    fn outcome_count(&self, predicate: impl Fn(&DescriptorOutcome) -> bool) -> usize {
        self.descriptors
            .iter()
            .filter(|(_, outcome)| predicate(outcome))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_occurrence_is_kept_per_kind() {
        let mut report = RunReport::new();
        report.warn(WarningKind::DateParseFailure, "row 3: not-a-date");
        report.warn(WarningKind::DateParseFailure, "row 9: 2020-13-01");
        let group = report
            .warnings()
            .get(&WarningKind::DateParseFailure)
            .unwrap();
        assert_eq!(group.first, "row 3: not-a-date");
        assert_eq!(group.count, 2);
        assert_eq!(report.warning_count(), 2);
    }

    #[test]
    fn outcome_counts() {
        let mut report = RunReport::new();
        report.record_processed("demographics", 10);
        report.record_skipped("samples", "level mismatch");
        report.record_failed("labs", "storage error: boom");
        assert_eq!(report.processed_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.failed_count(), 1);
    }
}
