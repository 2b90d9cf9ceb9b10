//! Portal metadata header construction.
//!
//! The portal expects four `#`-marked metadata rows above the column-name
//! row: display label, description, datatype, priority. The tall form (one
//! record per final column) is assembled from the descriptors in manifest
//! order, then reordered to the merged data's column order and transposed.

use tracing::warn;

use portal_ingest::descriptor_loader::load_descriptor;
use portal_model::{
    Datatype, Manifest, Result, RunLevel, RunReport, WarningKind,
};
use portal_ingest::frame_utils::canonical_column_name;

/// Number of metadata lines above the data in a final summary artifact
/// (four `#` rows plus the column-name row).
pub const HEADER_ROWS: usize = 5;

/// One final column's header metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRow {
    pub column_name: String,
    pub display_label: String,
    pub datatype: String,
    pub description: String,
    pub priority: String,
}

impl HeaderRow {
    fn default_for(column: &str) -> Self {
        Self {
            column_name: column.to_string(),
            display_label: column.to_string(),
            datatype: Datatype::String.as_str().to_string(),
            description: String::new(),
            priority: String::new(),
        }
    }
}

/// Identifier rows seeding the tall header.
///
/// The level's subject column comes first; sample-level artifacts also
/// carry the patient id column from the template pair.
fn id_rows(level: RunLevel) -> Vec<HeaderRow> {
    let subject = HeaderRow {
        column_name: level.subject_column().to_string(),
        display_label: match level {
            RunLevel::Patient => "#Patient Identifier".to_string(),
            RunLevel::Sample => "#Sample Identifier".to_string(),
        },
        datatype: Datatype::String.as_str().to_string(),
        // Portal convention: the id row's description slot carries the
        // priority sentinel.
        description: "1".to_string(),
        priority: String::new(),
    };
    match level {
        RunLevel::Patient => vec![subject],
        RunLevel::Sample => vec![
            subject,
            // Second column: the `#` marker belongs to the line start only.
            HeaderRow {
                column_name: "PATIENT_ID".to_string(),
                display_label: "Patient Identifier".to_string(),
                datatype: Datatype::String.as_str().to_string(),
                description: "1".to_string(),
                priority: String::new(),
            },
        ],
    }
}

/// Build the tall header in merged-data column order.
///
/// Descriptor YAMLs are reloaded per manifest entry so the header always
/// reflects the configuration the intermediates were produced from.
pub fn build_tall_header(
    manifest: &Manifest,
    merged_columns: &[String],
    level: RunLevel,
    report: &mut RunReport,
) -> Result<Vec<HeaderRow>> {
    let mut rows = id_rows(level);
    for entry in manifest {
        let loaded = load_descriptor(&entry.yaml_config_path, report)?;
        let descriptor = loaded.descriptor;
        for column in &descriptor.columns {
            if column == &descriptor.key_column {
                continue;
            }
            let canonical = canonical_column_name(column);
            let row = match descriptor.column_metadata.get(column) {
                Some(meta) => HeaderRow {
                    column_name: canonical,
                    display_label: meta.label.clone(),
                    datatype: meta.datatype.as_str().to_string(),
                    description: meta.description.clone(),
                    priority: String::new(),
                },
                None => HeaderRow::default_for(&canonical),
            };
            rows.push(row);
        }
    }

    // Reorder to the merged data exactly; synthesize for data-only columns,
    // drop YAML-only ones.
    let mut ordered = Vec::with_capacity(merged_columns.len());
    for column in merged_columns {
        match rows.iter().find(|row| &row.column_name == column) {
            Some(row) => ordered.push(row.clone()),
            None => {
                warn!(column = %column, "column present in data but not in any descriptor");
                report.warn(
                    WarningKind::ColumnMismatch,
                    format!("column {column} present in data but described by no descriptor"),
                );
                ordered.push(HeaderRow::default_for(column));
            }
        }
    }
    for row in &rows {
        if !merged_columns.contains(&row.column_name) {
            warn!(column = %row.column_name, "descriptor column absent from merged data");
            report.warn(
                WarningKind::ColumnMismatch,
                format!(
                    "column {} described by a descriptor but absent from merged data",
                    row.column_name
                ),
            );
        }
    }
    Ok(ordered)
}

/// Transpose the tall header to the portal's wide five-row form.
///
/// Rows 0-3 of the first column carry the leading `#` metadata marker; the
/// fifth row is the column-name line.
pub fn to_wide(rows: &[HeaderRow]) -> Vec<Vec<String>> {
    let mut wide = vec![Vec::with_capacity(rows.len()); HEADER_ROWS];
    for (idx, row) in rows.iter().enumerate() {
        let cells = [
            row.display_label.clone(),
            row.description.clone(),
            row.datatype.clone(),
            row.priority.clone(),
            row.column_name.clone(),
        ];
        for (line, cell) in cells.into_iter().enumerate() {
            let cell = if idx == 0 && line < HEADER_ROWS - 1 && !cell.starts_with('#') {
                format!("#{cell}")
            } else {
                cell
            };
            wide[line].push(cell);
        }
    }
    wide
}
