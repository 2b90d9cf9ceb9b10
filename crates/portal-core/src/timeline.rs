//! Timeline deidentification.
//!
//! Converts absolute event dates to day offsets from the patient anchor,
//! truncates stop dates to the follow-up cap, and reorders to the portal's
//! canonical leading columns. Bad rows drop; nothing here raises over data.

use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::{Column, DataFrame};
use tracing::{debug, info_span};

use portal_ingest::frame_utils::{column_names, column_strings};
use portal_model::{MRN_WIDTH, PortalError, Result, RunReport, WarningKind};

use crate::anchor::AnchorTable;
use crate::normalize::{parse_date, zero_pad};

/// Canonical leading columns of every timeline artifact.
pub const TIMELINE_LEADING_COLUMNS: [&str; 5] =
    ["PATIENT_ID", "START_DATE", "STOP_DATE", "EVENT_TYPE", "SUBTYPE"];

/// Deidentify one raw timeline table.
///
/// `subjects` filters rows to the template universe (empty set = no
/// filter); `caps` holds the per-patient maximum follow-up start offset
/// used to truncate stop dates.
pub fn deidentify_timeline(
    frame: &DataFrame,
    anchors: &AnchorTable,
    subjects: &BTreeSet<String>,
    caps: &BTreeMap<String, i32>,
    report: &mut RunReport,
) -> Result<DataFrame> {
    let span = info_span!("deidentify_timeline");
    let _guard = span.enter();

    let names = column_names(frame);
    for required in ["MRN", "START_DATE", "STOP_DATE"] {
        if !names.iter().any(|name| name == required) {
            return Err(PortalError::config(format!(
                "timeline table is missing required column {required}"
            )));
        }
    }
    let domain_columns: Vec<String> = names
        .iter()
        .filter(|name| {
            *name != "MRN" && !TIMELINE_LEADING_COLUMNS.contains(&name.as_str())
        })
        .cloned()
        .collect();

    let mrns = column_strings(frame, "MRN")?;
    let starts = column_strings(frame, "START_DATE")?;
    let stops = column_strings(frame, "STOP_DATE")?;
    let event_types = optional_column(frame, &names, "EVENT_TYPE")?;
    let subtypes = optional_column(frame, &names, "SUBTYPE")?;
    let domain_values: Vec<Vec<String>> = domain_columns
        .iter()
        .map(|name| column_strings(frame, name))
        .collect::<Result<_>>()?;

    let mut patient_ids: Vec<String> = Vec::new();
    let mut start_offsets: Vec<Option<i32>> = Vec::new();
    let mut stop_offsets: Vec<Option<i32>> = Vec::new();
    let mut kept_rows: Vec<usize> = Vec::new();
    for row in 0..frame.height() {
        let padded = zero_pad(&mrns[row], MRN_WIDTH);
        let Some(record) = (if padded.is_empty() {
            None
        } else {
            anchors.by_mrn(&padded)
        }) else {
            report.warn(
                WarningKind::UnmatchedSubject,
                format!("timeline row {row}: no anchor record, row dropped"),
            );
            continue;
        };
        if !subjects.is_empty() && !subjects.contains(&record.dmp_id) {
            continue;
        }

        let mut start = date_offset(&starts[row], record.anchor, report);
        let Some(start_value) = start else {
            // Null start post-computation drops the row.
            continue;
        };
        let mut stop = date_offset(&stops[row], record.anchor, report);
        if let (Some(cap), Some(stop_value)) = (caps.get(&record.dmp_id), stop) {
            if stop_value > *cap {
                stop = Some(*cap);
            }
        }
        if let Some(stop_value) = stop {
            if start_value > stop_value {
                start = Some(stop_value);
                stop = Some(start_value);
            }
        }

        patient_ids.push(record.dmp_id.clone());
        start_offsets.push(start);
        stop_offsets.push(stop);
        kept_rows.push(row);
    }

    let pick = |values: &[String]| -> Vec<String> {
        kept_rows.iter().map(|row| values[*row].clone()).collect()
    };
    let mut columns = vec![
        Column::new("PATIENT_ID".into(), patient_ids),
        Column::new("START_DATE".into(), start_offsets),
        Column::new("STOP_DATE".into(), stop_offsets),
        Column::new("EVENT_TYPE".into(), pick(&event_types)),
        Column::new("SUBTYPE".into(), pick(&subtypes)),
    ];
    for (name, values) in domain_columns.iter().zip(&domain_values) {
        columns.push(Column::new(name.as_str().into(), pick(values)));
    }
    let out = DataFrame::new(columns)
        .map_err(|error| PortalError::storage(format!("timeline frame: {error}")))?;
    debug!(
        input_rows = frame.height(),
        output_rows = out.height(),
        "timeline deidentified"
    );
    Ok(out)
}

/// Per-patient follow-up cap: the maximum follow-up event start offset.
pub fn follow_up_caps(
    frame: &DataFrame,
    anchors: &AnchorTable,
    report: &mut RunReport,
) -> Result<BTreeMap<String, i32>> {
    let mrns = column_strings(frame, "MRN")?;
    let starts = column_strings(frame, "START_DATE")?;
    let mut caps: BTreeMap<String, i32> = BTreeMap::new();
    for row in 0..frame.height() {
        let padded = zero_pad(&mrns[row], MRN_WIDTH);
        let Some(record) = (if padded.is_empty() {
            None
        } else {
            anchors.by_mrn(&padded)
        }) else {
            continue;
        };
        let Some(offset) = date_offset(&starts[row], record.anchor, report) else {
            continue;
        };
        caps.entry(record.dmp_id.clone())
            .and_modify(|current| *current = (*current).max(offset))
            .or_insert(offset);
    }
    Ok(caps)
}

fn optional_column(frame: &DataFrame, names: &[String], name: &str) -> Result<Vec<String>> {
    if names.iter().any(|existing| existing == name) {
        column_strings(frame, name)
    } else {
        Ok(vec![String::new(); frame.height()])
    }
}

fn date_offset(
    raw: &str,
    anchor: chrono::NaiveDate,
    report: &mut RunReport,
) -> Option<i32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match parse_date(trimmed) {
        Some(date) => Some((date - anchor).num_days() as i32),
        None => {
            report.warn(
                WarningKind::DateParseFailure,
                format!("timeline date {trimmed:?} is not a date"),
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::AnchorRecord;
    use chrono::NaiveDate;

    fn anchors() -> AnchorTable {
        AnchorTable::from_records(vec![AnchorRecord {
            mrn: "00000001".to_string(),
            dmp_id: "P-0000001".to_string(),
            sample_id: "P-0000001-T01-IM6".to_string(),
            anchor: NaiveDate::from_ymd_opt(2020, 1, 10).unwrap(),
        }])
        .unwrap()
    }

    fn raw_timeline(rows: &[(&str, &str, &str, &str)]) -> DataFrame {
        let mrn: Vec<String> = rows.iter().map(|r| r.0.to_string()).collect();
        let start: Vec<String> = rows.iter().map(|r| r.1.to_string()).collect();
        let stop: Vec<String> = rows.iter().map(|r| r.2.to_string()).collect();
        let event: Vec<String> = rows.iter().map(|r| r.3.to_string()).collect();
        DataFrame::new(vec![
            Column::new("MRN".into(), mrn),
            Column::new("START_DATE".into(), start),
            Column::new("STOP_DATE".into(), stop),
            Column::new("EVENT_TYPE".into(), event),
        ])
        .unwrap()
    }

    fn offsets(frame: &DataFrame, name: &str) -> Vec<Option<i32>> {
        let column = frame.column(name).unwrap().i32().unwrap();
        column.into_iter().collect()
    }

    #[test]
    fn offsets_are_anchor_relative() {
        let frame = raw_timeline(&[("1", "2020-01-20", "2020-02-09", "TREATMENT")]);
        let mut report = RunReport::new();
        let out = deidentify_timeline(
            &frame,
            &anchors(),
            &BTreeSet::new(),
            &BTreeMap::new(),
            &mut report,
        )
        .unwrap();
        assert_eq!(offsets(&out, "START_DATE"), vec![Some(10)]);
        assert_eq!(offsets(&out, "STOP_DATE"), vec![Some(30)]);
        assert_eq!(
            column_strings(&out, "PATIENT_ID").unwrap(),
            vec!["P-0000001".to_string()]
        );
    }

    #[test]
    fn stop_is_truncated_to_follow_up_cap() {
        // S5: start anchor+100, stop anchor+500, cap 200 -> 100/200.
        let frame = raw_timeline(&[("1", "2020-04-19", "2021-05-24", "TREATMENT")]);
        let mut caps = BTreeMap::new();
        caps.insert("P-0000001".to_string(), 200);
        let mut report = RunReport::new();
        let out = deidentify_timeline(&frame, &anchors(), &BTreeSet::new(), &caps, &mut report)
            .unwrap();
        assert_eq!(offsets(&out, "START_DATE"), vec![Some(100)]);
        assert_eq!(offsets(&out, "STOP_DATE"), vec![Some(200)]);
    }

    #[test]
    fn swapped_bounds_are_corrected() {
        let frame = raw_timeline(&[("1", "2020-02-09", "2020-01-20", "LAB")]);
        let mut report = RunReport::new();
        let out = deidentify_timeline(
            &frame,
            &anchors(),
            &BTreeSet::new(),
            &BTreeMap::new(),
            &mut report,
        )
        .unwrap();
        assert_eq!(offsets(&out, "START_DATE"), vec![Some(10)]);
        assert_eq!(offsets(&out, "STOP_DATE"), vec![Some(30)]);
    }

    #[test]
    fn null_start_drops_row() {
        let frame = raw_timeline(&[
            ("1", "not-a-date", "2020-02-09", "LAB"),
            ("1", "2020-01-20", "", "LAB"),
        ]);
        let mut report = RunReport::new();
        let out = deidentify_timeline(
            &frame,
            &anchors(),
            &BTreeSet::new(),
            &BTreeMap::new(),
            &mut report,
        )
        .unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(offsets(&out, "STOP_DATE"), vec![None]);
    }

    #[test]
    fn missing_anchor_drops_patient_rows() {
        let frame = raw_timeline(&[("999", "2020-01-20", "2020-02-09", "LAB")]);
        let mut report = RunReport::new();
        let out = deidentify_timeline(
            &frame,
            &anchors(),
            &BTreeSet::new(),
            &BTreeMap::new(),
            &mut report,
        )
        .unwrap();
        assert_eq!(out.height(), 0);
        assert!(
            report
                .warnings()
                .contains_key(&WarningKind::UnmatchedSubject)
        );
    }

    #[test]
    fn template_filter_applies_to_patient_ids() {
        let frame = raw_timeline(&[("1", "2020-01-20", "2020-02-09", "LAB")]);
        let mut subjects = BTreeSet::new();
        subjects.insert("P-0000009".to_string());
        let mut report = RunReport::new();
        let out = deidentify_timeline(
            &frame,
            &anchors(),
            &subjects,
            &BTreeMap::new(),
            &mut report,
        )
        .unwrap();
        assert_eq!(out.height(), 0);
    }

    #[test]
    fn leading_columns_are_canonical() {
        let frame = DataFrame::new(vec![
            Column::new("DOSE".into(), ["5mg"]),
            Column::new("MRN".into(), ["1"]),
            Column::new("STOP_DATE".into(), ["2020-02-09"]),
            Column::new("START_DATE".into(), ["2020-01-20"]),
            Column::new("EVENT_TYPE".into(), ["TREATMENT"]),
        ])
        .unwrap();
        let mut report = RunReport::new();
        let out = deidentify_timeline(
            &frame,
            &anchors(),
            &BTreeSet::new(),
            &BTreeMap::new(),
            &mut report,
        )
        .unwrap();
        assert_eq!(
            column_names(&out),
            vec![
                "PATIENT_ID".to_string(),
                "START_DATE".to_string(),
                "STOP_DATE".to_string(),
                "EVENT_TYPE".to_string(),
                "SUBTYPE".to_string(),
                "DOSE".to_string(),
            ]
        );
    }

    #[test]
    fn follow_up_caps_take_max_start() {
        let frame = raw_timeline(&[
            ("1", "2020-03-10", "", "FOLLOW_UP"),
            ("1", "2020-07-28", "", "FOLLOW_UP"),
        ]);
        let mut report = RunReport::new();
        let caps = follow_up_caps(&frame, &anchors(), &mut report).unwrap();
        assert_eq!(caps.get("P-0000001"), Some(&200));
    }
}
