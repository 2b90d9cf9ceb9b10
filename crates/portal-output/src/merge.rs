//! Horizontal merge of intermediates onto the subject template.
//!
//! Column-collision policy (fixed once, see DESIGN.md): the merger adds
//! only columns not already present and reports a collision warning for
//! the rest. The summary processor keeps intermediates disjoint by
//! construction; a collision here signals a descriptor bug rather than a
//! value to overwrite silently.

use std::collections::BTreeMap;

use polars::prelude::DataFrame;
use tracing::{debug, warn};

use portal_ingest::frame_utils::{column_names, column_opt_strings, column_strings, string_column};
use portal_ingest::template::Template;
use portal_ingest::tsv;
use portal_model::{Manifest, PortalError, Result, RunReport, WarningKind};

/// Left-join every manifest intermediate onto the template, in order.
pub fn merge_intermediates(
    manifest: &Manifest,
    template: &Template,
    report: &mut RunReport,
) -> Result<DataFrame> {
    let subject_column = template.subject_column.clone();
    let subjects = template.subjects()?;
    let template_columns = column_names(&template.data);
    let mut merged = template.data.clone();

    for entry in manifest {
        let intermediate = tsv::read_tsv(&entry.intermediate_data_path)?;
        let names = column_names(&intermediate);
        if !names.iter().any(|name| *name == subject_column) {
            warn!(
                summary_id = %entry.summary_id,
                path = %entry.intermediate_data_path.display(),
                "intermediate has no subject key column, skipped"
            );
            report.warn(
                WarningKind::ColumnMismatch,
                format!(
                    "intermediate {} has no {subject_column} column, skipped",
                    entry.summary_id
                ),
            );
            continue;
        }

        // First occurrence wins for duplicate subjects within one file.
        let keys = column_strings(&intermediate, &subject_column)?;
        let mut by_subject: BTreeMap<&str, usize> = BTreeMap::new();
        for (row, key) in keys.iter().enumerate() {
            by_subject.entry(key.as_str()).or_insert(row);
        }

        let existing = column_names(&merged);
        for name in &names {
            // Template columns ride along in every intermediate (sample runs
            // carry PATIENT_ID beside SAMPLE_ID); they are not collisions.
            if template_columns.iter().any(|present| present == name) {
                continue;
            }
            if existing.iter().any(|present| present == name) {
                warn!(
                    summary_id = %entry.summary_id,
                    column = %name,
                    "column already merged from an earlier intermediate, kept earlier values"
                );
                report.warn(
                    WarningKind::MergeCollision,
                    format!(
                        "column {name} from {} collides with an earlier intermediate",
                        entry.summary_id
                    ),
                );
                continue;
            }
            let values = column_opt_strings(&intermediate, name)?;
            let aligned: Vec<Option<String>> = subjects
                .iter()
                .map(|subject| {
                    by_subject
                        .get(subject.as_str())
                        .and_then(|row| values[*row].clone())
                })
                .collect();
            merged
                .with_column(string_column(name, aligned))
                .map_err(|error| PortalError::storage(format!("merge column {name}: {error}")))?;
        }
        debug!(
            summary_id = %entry.summary_id,
            columns = merged.width(),
            "intermediate merged"
        );
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::Column;
    use portal_model::{ManifestEntry, RunLevel};
    use std::path::{Path, PathBuf};

    fn template() -> Template {
        Template {
            data: DataFrame::new(vec![Column::new(
                "PATIENT_ID".into(),
                ["P-0000001", "P-0000002"],
            )])
            .unwrap(),
            subject_column: "PATIENT_ID".to_string(),
        }
    }

    fn write_intermediate(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn entry(summary_id: &str, path: PathBuf) -> ManifestEntry {
        ManifestEntry {
            summary_id: summary_id.to_string(),
            yaml_config_path: PathBuf::from(format!("{summary_id}.yaml")),
            intermediate_data_path: path,
            patient_or_sample: RunLevel::Patient,
        }
    }

    #[test]
    fn merges_in_manifest_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_intermediate(
            dir.path(),
            "dx.tsv",
            "PATIENT_ID\tDX_DATE\nP-0000001\t30\nP-0000002\t12\n",
        );
        let second = write_intermediate(
            dir.path(),
            "stage.tsv",
            "PATIENT_ID\tSTAGE\nP-0000002\tIII\n",
        );
        let mut manifest = Manifest::new();
        manifest.push(entry("dx", first));
        manifest.push(entry("stage", second));
        let mut report = RunReport::new();
        let merged = merge_intermediates(&manifest, &template(), &mut report).unwrap();
        assert_eq!(
            column_names(&merged),
            vec![
                "PATIENT_ID".to_string(),
                "DX_DATE".to_string(),
                "STAGE".to_string()
            ]
        );
        // Non-template subjects never appear; absent subjects are null.
        assert_eq!(
            column_strings(&merged, "STAGE").unwrap(),
            vec![String::new(), "III".to_string()]
        );
    }

    #[test]
    fn collision_keeps_earlier_column_and_warns() {
        // S4 under the documented policy: first writer wins, warning raised.
        let dir = tempfile::tempdir().unwrap();
        let first = write_intermediate(
            dir.path(),
            "a.tsv",
            "PATIENT_ID\tSTAGE\nP-0000001\tI\n",
        );
        let second = write_intermediate(
            dir.path(),
            "b.tsv",
            "PATIENT_ID\tSTAGE\nP-0000001\tIV\n",
        );
        let mut manifest = Manifest::new();
        manifest.push(entry("a", first));
        manifest.push(entry("b", second));
        let mut report = RunReport::new();
        let merged = merge_intermediates(&manifest, &template(), &mut report).unwrap();
        let names = column_names(&merged);
        assert_eq!(names.iter().filter(|n| *n == "STAGE").count(), 1);
        assert_eq!(
            column_strings(&merged, "STAGE").unwrap()[0],
            "I".to_string()
        );
        assert!(report.warnings().contains_key(&WarningKind::MergeCollision));
    }

    #[test]
    fn template_companion_columns_do_not_collide() {
        // Sample-level intermediates carry PATIENT_ID from the template;
        // merging the first one must stay warning-free.
        let dir = tempfile::tempdir().unwrap();
        let template = Template {
            data: DataFrame::new(vec![
                Column::new("SAMPLE_ID".into(), ["P-0000001-T01"]),
                Column::new("PATIENT_ID".into(), ["P-0000001"]),
            ])
            .unwrap(),
            subject_column: "SAMPLE_ID".to_string(),
        };
        let results = write_intermediate(
            dir.path(),
            "results.tsv",
            "SAMPLE_ID\tPATIENT_ID\tRESULT\nP-0000001-T01\tP-0000001\tPOS\n",
        );
        let mut manifest = Manifest::new();
        manifest.push(entry("results", results));
        let mut report = RunReport::new();
        let merged = merge_intermediates(&manifest, &template, &mut report).unwrap();
        assert_eq!(
            column_names(&merged),
            vec![
                "SAMPLE_ID".to_string(),
                "PATIENT_ID".to_string(),
                "RESULT".to_string()
            ]
        );
        assert_eq!(report.warning_count(), 0);
    }

    #[test]
    fn intermediate_without_subject_key_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_intermediate(dir.path(), "bad.tsv", "SAMPLE_ID\tX\nS1\t1\n");
        let mut manifest = Manifest::new();
        manifest.push(entry("bad", bad));
        let mut report = RunReport::new();
        let merged = merge_intermediates(&manifest, &template(), &mut report).unwrap();
        assert_eq!(merged.width(), 1);
        assert!(report.warnings().contains_key(&WarningKind::ColumnMismatch));
    }
}
