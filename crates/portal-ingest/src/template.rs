//! Subject-id template loading.
//!
//! The template defines the row universe of a run: every template row
//! appears in the final artifact, and intermediate rows outside it are
//! dropped.

use std::collections::BTreeSet;
use std::path::Path;

use polars::prelude::DataFrame;
use tracing::debug;

use portal_model::{PortalError, Result, RunLevel};

use crate::frame_utils::{column_strings, string_column};
use crate::tsv;

/// The subject universe for one run, with the canonical subject column
/// surfaced (`PATIENT_ID` for patient runs, `SAMPLE_ID` for sample runs).
#[derive(Debug, Clone)]
pub struct Template {
    pub data: DataFrame,
    pub subject_column: String,
}

impl Template {
    /// Subject ids in template row order.
    pub fn subjects(&self) -> Result<Vec<String>> {
        column_strings(&self.data, &self.subject_column)
    }

    /// Subject ids as a set, for membership filtering.
    pub fn subject_set(&self) -> Result<BTreeSet<String>> {
        Ok(self.subjects()?.into_iter().collect())
    }
}

/// Pick the template's id column for a run level.
///
/// Preference order: the level's canonical column, then `DMP_ID`; anything
/// else is a fatal configuration problem.
pub fn detect_subject_column(names: &[String], level: RunLevel) -> Result<String> {
    let canonical = level.subject_column();
    if names.iter().any(|name| name == canonical) {
        return Ok(canonical.to_string());
    }
    if names.iter().any(|name| name == "DMP_ID") {
        return Ok("DMP_ID".to_string());
    }
    Err(PortalError::config(format!(
        "template has no {canonical} or DMP_ID column (found: {})",
        names.join(", ")
    )))
}

/// Load a tab-separated template for the given level.
///
/// Patient runs reduce to the distinct `PATIENT_ID` set; sample runs to
/// distinct `(SAMPLE_ID, PATIENT_ID)` pairs. A `DMP_ID` id column is
/// renamed to the canonical name so the canonical name always surfaces.
pub fn load_template(path: &Path, level: RunLevel) -> Result<Template> {
    let frame = tsv::read_tsv(path)?;
    let names: Vec<String> = frame
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let found = detect_subject_column(&names, level)?;
    let canonical = level.subject_column().to_string();

    let subjects = column_strings(&frame, &found)?;
    let patient_ids = match level {
        RunLevel::Patient => None,
        RunLevel::Sample => {
            if names.iter().any(|name| name == "PATIENT_ID") {
                Some(column_strings(&frame, "PATIENT_ID")?)
            } else {
                None
            }
        }
    };

    // Distinct rows, first occurrence wins, input order preserved.
    let mut seen = BTreeSet::new();
    let mut subject_out: Vec<Option<String>> = Vec::new();
    let mut patient_out: Vec<Option<String>> = Vec::new();
    for (idx, subject) in subjects.iter().enumerate() {
        if subject.is_empty() || !seen.insert(subject.clone()) {
            continue;
        }
        subject_out.push(Some(subject.clone()));
        if let Some(patients) = &patient_ids {
            patient_out.push(Some(patients[idx].clone()));
        }
    }
    if subject_out.is_empty() {
        return Err(PortalError::config(format!(
            "template {} has no subject rows",
            path.display()
        )));
    }

    let mut columns = vec![string_column(&canonical, subject_out)];
    if patient_ids.is_some() {
        columns.push(string_column("PATIENT_ID", patient_out));
    }
    let data = DataFrame::new(columns)
        .map_err(|error| PortalError::storage(format!("template frame: {error}")))?;
    debug!(
        path = %path.display(),
        level = %level,
        subject_column = %canonical,
        rows = data.height(),
        "template loaded"
    );
    Ok(Template {
        data,
        subject_column: canonical,
    })
}
