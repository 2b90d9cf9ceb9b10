//! Anchor-date resolution.
//!
//! The anchor date is the earliest tumor-sequencing date across a patient's
//! tumor samples; every downstream interval is expressed relative to it.
//! Resolution is a data-cleaning pass over the pathology snapshot with two
//! ID-integrity rules: a sample id must embed its declared portal id, and
//! the MRN↔portal-id mapping must be one-to-one. Rows violating either rule
//! are quarantined (reported, never persisted).

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use polars::prelude::{Column, DataFrame};
use tracing::{debug, warn};

use portal_ingest::frame_utils::column_strings;
use portal_model::{
    MRN_WIDTH, PATIENT_ID_PREFIX_LEN, PortalError, Result, RunReport, TUMOR_SAMPLE_MARKER,
    WarningKind, redact_value,
};

use crate::normalize::{parse_date, zero_pad};

/// One patient's anchor mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorRecord {
    pub mrn: String,
    pub dmp_id: String,
    /// Sample id of the anchoring (earliest) tumor sequencing report.
    pub sample_id: String,
    pub anchor: NaiveDate,
}

/// The canonical {patient → anchor date} mapping, indexed three ways.
///
/// Invariants: exactly one record per MRN, one per portal id, and the
/// anchoring sample id embeds its portal id.
#[derive(Debug, Clone, Default)]
pub struct AnchorTable {
    records: Vec<AnchorRecord>,
    by_mrn: BTreeMap<String, usize>,
    by_dmp: BTreeMap<String, usize>,
    by_sample: BTreeMap<String, usize>,
}

impl AnchorTable {
    pub fn from_records(records: Vec<AnchorRecord>) -> Result<Self> {
        let mut table = Self {
            records,
            ..Self::default()
        };
        for (idx, record) in table.records.iter().enumerate() {
            if table.by_mrn.insert(record.mrn.clone(), idx).is_some() {
                return Err(PortalError::config(format!(
                    "anchor table has duplicate MRN {}",
                    redact_value(&record.mrn)
                )));
            }
            if table.by_dmp.insert(record.dmp_id.clone(), idx).is_some() {
                return Err(PortalError::config(format!(
                    "anchor table has duplicate portal id {}",
                    record.dmp_id
                )));
            }
            table.by_sample.insert(record.sample_id.clone(), idx);
        }
        Ok(table)
    }

    pub fn records(&self) -> &[AnchorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up by raw medical-record number (zero-padded by the caller).
    pub fn by_mrn(&self, mrn: &str) -> Option<&AnchorRecord> {
        self.by_mrn.get(mrn).map(|idx| &self.records[*idx])
    }

    /// Look up by a portal identifier: an exact patient id, an exact sample
    /// id, or a sample id resolved through its embedded patient prefix.
    pub fn by_portal_id(&self, id: &str) -> Option<&AnchorRecord> {
        if let Some(idx) = self.by_dmp.get(id) {
            return Some(&self.records[*idx]);
        }
        if let Some(idx) = self.by_sample.get(id) {
            return Some(&self.records[*idx]);
        }
        id.get(..PATIENT_ID_PREFIX_LEN)
            .and_then(|prefix| self.by_dmp.get(prefix))
            .map(|idx| &self.records[*idx])
    }

    /// Frame view of the table, dates rendered ISO.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mrn: Vec<String> = self.records.iter().map(|r| r.mrn.clone()).collect();
        let dmp: Vec<String> = self.records.iter().map(|r| r.dmp_id.clone()).collect();
        let sample: Vec<String> = self.records.iter().map(|r| r.sample_id.clone()).collect();
        let date: Vec<String> = self
            .records
            .iter()
            .map(|r| r.anchor.format("%Y-%m-%d").to_string())
            .collect();
        DataFrame::new(vec![
            Column::new("MRN".into(), mrn),
            Column::new("DMP_ID".into(), dmp),
            Column::new("SAMPLE_ID".into(), sample),
            Column::new("DATE_TUMOR_SEQUENCING".into(), date),
        ])
        .map_err(|error| PortalError::storage(format!("anchor frame: {error}")))
    }
}

struct Candidate {
    mrn: String,
    dmp_id: String,
    sample_id: String,
    date: NaiveDate,
}

/// Resolve anchor dates from the pathology snapshot.
///
/// Expects columns `MRN, DATE_TUMOR_SEQUENCING, SAMPLE_ID, DMP_ID`.
/// Quarantined rows land on the report; the run itself only fails when the
/// snapshot is structurally unreadable.
pub fn resolve_anchor_dates(frame: &DataFrame, report: &mut RunReport) -> Result<AnchorTable> {
    let mrns = column_strings(frame, "MRN")?;
    let dates = column_strings(frame, "DATE_TUMOR_SEQUENCING")?;
    let sample_ids = column_strings(frame, "SAMPLE_ID")?;
    let dmp_ids = column_strings(frame, "DMP_ID")?;

    // Retain tumor-sample rows with a usable date.
    let mut candidates = Vec::new();
    for idx in 0..frame.height() {
        let sample_id = sample_ids[idx].trim().to_string();
        if sample_id.is_empty() || !sample_id.contains(TUMOR_SAMPLE_MARKER) {
            continue;
        }
        let raw_date = dates[idx].trim();
        let Some(date) = parse_date(raw_date) else {
            if !raw_date.is_empty() {
                report.warn(
                    WarningKind::DateParseFailure,
                    format!("pathology sample {sample_id}: unparsable date {raw_date:?}"),
                );
            }
            continue;
        };
        candidates.push(Candidate {
            mrn: zero_pad(&mrns[idx], MRN_WIDTH),
            dmp_id: dmp_ids[idx].trim().to_string(),
            sample_id,
            date,
        });
    }

    // Violation set 1: sample id does not embed its declared portal id.
    let mut malformed = vec![false; candidates.len()];
    for (idx, candidate) in candidates.iter().enumerate() {
        let derived = candidate
            .sample_id
            .get(..PATIENT_ID_PREFIX_LEN)
            .unwrap_or(&candidate.sample_id);
        if derived != candidate.dmp_id {
            malformed[idx] = true;
            warn!(
                sample_id = %candidate.sample_id,
                declared = %candidate.dmp_id,
                "sample id does not match declared portal id, row quarantined"
            );
            report.warn(
                WarningKind::MalformedSampleId,
                format!(
                    "sample {} declares portal id {} but embeds {derived}",
                    candidate.sample_id, candidate.dmp_id
                ),
            );
        }
    }

    // Violation set 2: MRN↔portal-id mapping collisions.
    let mut dmp_per_mrn: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut mrn_per_dmp: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for candidate in &candidates {
        dmp_per_mrn
            .entry(&candidate.mrn)
            .or_default()
            .insert(&candidate.dmp_id);
        mrn_per_dmp
            .entry(&candidate.dmp_id)
            .or_default()
            .insert(&candidate.mrn);
    }
    let colliding_mrns: BTreeSet<String> = dmp_per_mrn
        .iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(mrn, _)| (*mrn).to_string())
        .collect();
    let colliding_dmps: BTreeSet<String> = mrn_per_dmp
        .iter()
        .filter(|(_, mrns)| mrns.len() > 1)
        .map(|(dmp, _)| (*dmp).to_string())
        .collect();
    for mrn in &colliding_mrns {
        report.warn(
            WarningKind::DuplicateAnchorId,
            format!(
                "MRN {} maps to multiple portal ids, all rows quarantined",
                redact_value(mrn)
            ),
        );
    }
    for dmp in &colliding_dmps {
        report.warn(
            WarningKind::DuplicateAnchorId,
            format!("portal id {dmp} maps to multiple MRNs, all rows quarantined"),
        );
    }

    // Earliest tumor-sequencing date per surviving (MRN, portal id) pair;
    // ties break to the lexicographically smallest sample id for
    // deterministic reruns.
    let mut grouped: BTreeMap<(String, String), (NaiveDate, String)> = BTreeMap::new();
    for (idx, candidate) in candidates.iter().enumerate() {
        if malformed[idx]
            || colliding_mrns.contains(&candidate.mrn)
            || colliding_dmps.contains(&candidate.dmp_id)
        {
            continue;
        }
        let key = (candidate.mrn.clone(), candidate.dmp_id.clone());
        let entry = grouped
            .entry(key)
            .or_insert_with(|| (candidate.date, candidate.sample_id.clone()));
        if (candidate.date, &candidate.sample_id) < (entry.0, &entry.1) {
            *entry = (candidate.date, candidate.sample_id.clone());
        }
    }

    let records: Vec<AnchorRecord> = grouped
        .into_iter()
        .map(|((mrn, dmp_id), (anchor, sample_id))| AnchorRecord {
            mrn,
            dmp_id,
            sample_id,
            anchor,
        })
        .collect();
    debug!(patients = records.len(), "anchor dates resolved");
    AnchorTable::from_records(records)
}
