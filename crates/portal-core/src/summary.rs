//! Per-descriptor summary processing.
//!
//! Pipeline for one descriptor at one run level:
//! load → deidentify-join → date intervals → canonical names →
//! template alignment → backfill. The caller persists the result through
//! the intermediate store.
//!
//! All joins resolve per row against the [`AnchorTable`] maps; bad data
//! produces nulls instead of errors, and the monitor surfaces all-null
//! columns after assembly.

use std::collections::BTreeMap;

use polars::prelude::DataFrame;
use tracing::{debug, info_span};

use portal_ingest::frame_utils::{
    canonical_column_name, column_names, column_opt_strings, column_strings, string_column,
};
use portal_ingest::template::Template;
use portal_ingest::warehouse::Warehouse;
use portal_model::{
    Descriptor, MRN_WIDTH, PortalError, Result, RunLevel, RunMode, RunReport, WarningKind,
    redact_value,
};

use crate::anchor::{AnchorRecord, AnchorTable};
use crate::normalize::{parse_date, zero_pad};

/// Run-wide inputs shared by every descriptor.
pub struct SummaryRunContext<'a> {
    pub anchors: &'a AnchorTable,
    pub template: &'a Template,
    pub level: RunLevel,
    pub mode: RunMode,
}

/// Execute the per-descriptor pipeline.
///
/// Returns `Ok(None)` when the descriptor's level does not match the run
/// level (a silent skip, recorded on the report). Load failures are errors
/// the caller downgrades to per-descriptor failures.
pub fn process_descriptor(
    warehouse: &dyn Warehouse,
    descriptor: &Descriptor,
    ctx: &SummaryRunContext<'_>,
    report: &mut RunReport,
) -> Result<Option<DataFrame>> {
    let span = info_span!("process_descriptor", summary_id = %descriptor.summary_id);
    let _guard = span.enter();

    // Step A: level filter.
    if descriptor.patient_or_sample != ctx.level {
        report.record_skipped(
            &descriptor.summary_id,
            format!(
                "descriptor level {} does not match run level {}",
                descriptor.patient_or_sample, ctx.level
            ),
        );
        debug!(level = %descriptor.patient_or_sample, "level mismatch, skipped");
        return Ok(None);
    }

    // Step B: load the projected columns from the mode-selected table.
    let sql = format!(
        "SELECT {} FROM {}",
        descriptor.columns.join(", "),
        descriptor.source_table(ctx.mode)
    );
    let source = warehouse.query(&sql)?;
    debug!(rows = source.height(), "source loaded");

    // Steps C-G are pure over the loaded frame.
    let frame = transform_source(descriptor, &source, ctx, report)?;
    debug!(rows = frame.height(), cols = frame.width(), "descriptor processed");
    Ok(Some(frame))
}

/// Steps C-G: deidentify, convert dates, canonicalize, align, backfill.
fn transform_source(
    descriptor: &Descriptor,
    source: &DataFrame,
    ctx: &SummaryRunContext<'_>,
    report: &mut RunReport,
) -> Result<DataFrame> {
    let key_is_mrn = descriptor.key_column == "MRN";
    let key_values = column_strings(source, &descriptor.key_column)?;

    // Step C: attach the anchor record per row; rows without one drop out
    // (inner-join semantics).
    let mut anchored: Vec<(usize, &AnchorRecord)> = Vec::new();
    for (row, raw_key) in key_values.iter().enumerate() {
        let record = if key_is_mrn {
            let padded = zero_pad(raw_key, MRN_WIDTH);
            if padded.is_empty() {
                None
            } else {
                ctx.anchors.by_mrn(&padded)
            }
        } else if raw_key.is_empty() {
            None
        } else {
            ctx.anchors.by_portal_id(raw_key)
        };
        match record {
            Some(record) => anchored.push((row, record)),
            None => {
                // MRN keys stay redacted in diagnostics.
                let shown = if key_is_mrn {
                    redact_value(raw_key)
                } else {
                    raw_key.as_str()
                };
                report.warn(
                    WarningKind::UnmatchedSubject,
                    format!(
                        "descriptor {}: key {shown:?} has no anchor record",
                        descriptor.summary_id
                    ),
                );
            }
        }
    }

    // Subject id per surviving row, in the run level's identifier space.
    let subjects: Vec<String> = anchored
        .iter()
        .map(|(row, record)| match ctx.level {
            RunLevel::Patient => record.dmp_id.clone(),
            RunLevel::Sample => {
                if key_is_mrn {
                    record.sample_id.clone()
                } else {
                    key_values[*row].clone()
                }
            }
        })
        .collect();

    // Steps D+E: per projected column (minus the key), produce canonical
    // names and values; date columns become signed day offsets.
    let mut out_names: Vec<String> = Vec::new();
    let mut out_values: Vec<Vec<Option<String>>> = Vec::new();
    for column in &descriptor.columns {
        if column == &descriptor.key_column {
            continue;
        }
        let raw = column_strings(source, column)?;
        let is_date = descriptor.date_columns.contains(column);
        let mut values: Vec<Option<String>> = Vec::with_capacity(anchored.len());
        for (row, record) in &anchored {
            let cell = raw[*row].trim();
            if is_date {
                if cell.is_empty() {
                    values.push(None);
                } else if let Some(date) = parse_date(cell) {
                    let offset = (date - record.anchor).num_days() as i32;
                    values.push(Some(offset.to_string()));
                } else {
                    report.warn(
                        WarningKind::DateParseFailure,
                        format!(
                            "descriptor {}: column {column} value {cell:?} is not a date",
                            descriptor.summary_id
                        ),
                    );
                    values.push(None);
                }
            } else if cell.is_empty() {
                values.push(None);
            } else {
                values.push(Some(cell.to_string()));
            }
        }
        out_names.push(canonical_column_name(column));
        out_values.push(values);
    }

    // Step F: left-join the template on the subject column; subjects absent
    // from the source yield null cells. First source occurrence wins for
    // duplicate subjects.
    let mut by_subject: BTreeMap<&str, usize> = BTreeMap::new();
    for (pos, subject) in subjects.iter().enumerate() {
        by_subject.entry(subject.as_str()).or_insert(pos);
    }

    let template_frame = &ctx.template.data;
    let template_subjects = ctx.template.subjects()?;
    let mut columns = Vec::with_capacity(template_frame.width() + out_names.len());
    for name in column_names(template_frame) {
        let values = column_opt_strings(template_frame, &name)?;
        columns.push(string_column(&name, values));
    }
    for (name, values) in out_names.iter().zip(&out_values) {
        let metadata = descriptor
            .column_metadata
            .iter()
            .find(|(key, _)| canonical_column_name(key) == *name)
            .map(|(_, meta)| meta);
        let fill = metadata.and_then(|meta| meta.fill_value.clone());
        let aligned: Vec<Option<String>> = template_subjects
            .iter()
            .map(|subject| {
                let value = by_subject
                    .get(subject.as_str())
                    .and_then(|pos| values[*pos].clone());
                backfill(value, fill.as_deref())
            })
            .collect();
        columns.push(string_column(name, aligned));
    }

    DataFrame::new(columns).map_err(|error| {
        PortalError::storage(format!(
            "descriptor {}: assemble frame: {error}",
            descriptor.summary_id
        ))
    })
}

/// Step G: replace nulls and the literal `NA`/`N/A` with the fill value.
fn backfill(value: Option<String>, fill: Option<&str>) -> Option<String> {
    let Some(fill) = fill else {
        return value;
    };
    match value {
        None => Some(fill.to_string()),
        Some(v) if v == "NA" || v == "N/A" => Some(fill.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use polars::prelude::Column;
    use portal_model::{ColumnMetadata, Datatype, Dest};
    use std::collections::BTreeMap as Map;

    fn anchors() -> AnchorTable {
        AnchorTable::from_records(vec![AnchorRecord {
            mrn: "00000001".to_string(),
            dmp_id: "P-0000001".to_string(),
            sample_id: "P-0000001-T01-IM6".to_string(),
            anchor: NaiveDate::from_ymd_opt(2020, 1, 10).unwrap(),
        }])
        .unwrap()
    }

    fn patient_template() -> Template {
        Template {
            data: DataFrame::new(vec![Column::new("PATIENT_ID".into(), ["P-0000001"])]).unwrap(),
            subject_column: "PATIENT_ID".to_string(),
        }
    }

    fn dest() -> Dest {
        Dest {
            catalog: "cat".to_string(),
            schema: "sch".to_string(),
            volume: "vol".to_string(),
            filename: "dx.tsv".to_string(),
        }
    }

    fn dx_descriptor() -> Descriptor {
        Descriptor {
            summary_id: "diagnosis".to_string(),
            patient_or_sample: RunLevel::Patient,
            source_table_prod: "prod.clinical.dx".to_string(),
            source_table_dev: "dev.clinical.dx".to_string(),
            key_column: "MRN".to_string(),
            columns: vec!["MRN".to_string(), "DX_DATE".to_string()],
            date_columns: vec!["DX_DATE".to_string()],
            dest_prod: dest(),
            dest_dev: dest(),
            column_metadata: Map::new(),
        }
    }

    fn run_transform(
        descriptor: &Descriptor,
        source: DataFrame,
        template: &Template,
    ) -> (DataFrame, RunReport) {
        let anchors = anchors();
        let ctx = SummaryRunContext {
            anchors: &anchors,
            template,
            level: descriptor.patient_or_sample,
            mode: RunMode::Test,
        };
        let mut report = RunReport::new();
        let frame = transform_source(descriptor, &source, &ctx, &mut report).unwrap();
        (frame, report)
    }

    #[test]
    fn date_column_becomes_day_offset() {
        // S1: 2020-02-09 against a 2020-01-10 anchor is day 30.
        let source = DataFrame::new(vec![
            Column::new("MRN".into(), ["1"]),
            Column::new("DX_DATE".into(), ["2020-02-09"]),
        ])
        .unwrap();
        let template = patient_template();
        let (frame, _) = run_transform(&dx_descriptor(), source, &template);
        assert_eq!(
            column_strings(&frame, "PATIENT_ID").unwrap(),
            vec!["P-0000001".to_string()]
        );
        assert_eq!(
            column_strings(&frame, "DX_DATE").unwrap(),
            vec!["30".to_string()]
        );
    }

    #[test]
    fn date_before_anchor_is_negative() {
        let source = DataFrame::new(vec![
            Column::new("MRN".into(), ["1"]),
            Column::new("DX_DATE".into(), ["2020-01-05"]),
        ])
        .unwrap();
        let template = patient_template();
        let (frame, _) = run_transform(&dx_descriptor(), source, &template);
        assert_eq!(
            column_strings(&frame, "DX_DATE").unwrap(),
            vec!["-5".to_string()]
        );
    }

    #[test]
    fn unparsable_date_propagates_null() {
        // S6: bad date keeps the subject, nulls the cell.
        let source = DataFrame::new(vec![
            Column::new("MRN".into(), ["1"]),
            Column::new("DX_DATE".into(), ["not-a-date"]),
        ])
        .unwrap();
        let template = patient_template();
        let (frame, report) = run_transform(&dx_descriptor(), source, &template);
        assert_eq!(
            column_strings(&frame, "DX_DATE").unwrap(),
            vec![String::new()]
        );
        assert!(
            report
                .warnings()
                .contains_key(&WarningKind::DateParseFailure)
        );
    }

    #[test]
    fn subject_without_anchor_is_dropped_and_reported() {
        let source = DataFrame::new(vec![
            Column::new("MRN".into(), ["1", "999"]),
            Column::new("DX_DATE".into(), ["2020-02-09", "2020-02-09"]),
        ])
        .unwrap();
        let template = patient_template();
        let (frame, report) = run_transform(&dx_descriptor(), source, &template);
        assert_eq!(frame.height(), 1);
        let warning = &report.warnings()[&WarningKind::UnmatchedSubject];
        // The raw MRN never reaches the warning text.
        assert!(!warning.first.contains("999"));
        assert!(warning.first.contains(portal_model::REDACTED_VALUE));
    }

    #[test]
    fn sample_level_aligns_and_backfills() {
        // S2: one sample present in the source, the other backfilled.
        let template = Template {
            data: DataFrame::new(vec![
                Column::new(
                    "SAMPLE_ID".into(),
                    ["P-0000001-T01-IM6", "P-0000001-T02-IM6"],
                ),
                Column::new("PATIENT_ID".into(), ["P-0000001", "P-0000001"]),
            ])
            .unwrap(),
            subject_column: "SAMPLE_ID".to_string(),
        };
        let mut metadata = Map::new();
        metadata.insert(
            "RESULT".to_string(),
            ColumnMetadata {
                label: "Result".to_string(),
                datatype: Datatype::String,
                description: String::new(),
                fill_value: Some("NA".to_string()),
            },
        );
        let descriptor = Descriptor {
            summary_id: "results".to_string(),
            patient_or_sample: RunLevel::Sample,
            key_column: "SAMPLE_ID".to_string(),
            columns: vec!["SAMPLE_ID".to_string(), "RESULT".to_string()],
            date_columns: Vec::new(),
            column_metadata: metadata,
            ..dx_descriptor()
        };
        let source = DataFrame::new(vec![
            Column::new("SAMPLE_ID".into(), ["P-0000001-T01-IM6"]),
            Column::new("RESULT".into(), ["POS"]),
        ])
        .unwrap();
        let (frame, _) = run_transform(&descriptor, source, &template);
        assert_eq!(
            column_strings(&frame, "RESULT").unwrap(),
            vec!["POS".to_string(), "NA".to_string()]
        );
        assert_eq!(
            column_strings(&frame, "PATIENT_ID").unwrap(),
            vec!["P-0000001".to_string(), "P-0000001".to_string()]
        );
    }

    #[test]
    fn backfill_replaces_na_literals() {
        assert_eq!(
            backfill(Some("NA".to_string()), Some("Unknown")),
            Some("Unknown".to_string())
        );
        assert_eq!(
            backfill(Some("N/A".to_string()), Some("Unknown")),
            Some("Unknown".to_string())
        );
        assert_eq!(backfill(None, Some("Unknown")), Some("Unknown".to_string()));
        assert_eq!(
            backfill(Some("POS".to_string()), Some("Unknown")),
            Some("POS".to_string())
        );
        assert_eq!(backfill(Some("NA".to_string()), None), Some("NA".to_string()));
    }

    #[test]
    fn spaced_column_names_canonicalize() {
        let descriptor = Descriptor {
            columns: vec!["MRN".to_string(), "dx date".to_string()],
            date_columns: vec!["dx date".to_string()],
            ..dx_descriptor()
        };
        let source = DataFrame::new(vec![
            Column::new("MRN".into(), ["1"]),
            Column::new("dx date".into(), ["2020-02-09"]),
        ])
        .unwrap();
        let template = patient_template();
        let (frame, _) = run_transform(&descriptor, source, &template);
        assert!(frame.column("DX_DATE").is_ok());
    }
}
