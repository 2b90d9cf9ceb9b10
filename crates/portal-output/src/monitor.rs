//! Post-assembly data quality checks.

use polars::prelude::DataFrame;
use tracing::warn;

use portal_ingest::frame_utils::column_opt_strings;
use portal_model::{PortalError, Result, RunReport, WarningKind};

/// Columns whose every value is null or empty across all rows.
///
/// The subject column is exempt: an artifact with an empty id column fails
/// earlier, at merge.
pub fn all_null_columns(frame: &DataFrame, subject_column: &str) -> Result<Vec<String>> {
    let mut offenders = Vec::new();
    for column in frame.get_columns() {
        let name = column.name().as_str();
        if name == subject_column {
            continue;
        }
        let values = column_opt_strings(frame, name)?;
        if !values.is_empty() && values.iter().all(Option::is_none) {
            offenders.push(name.to_string());
        }
    }
    Ok(offenders)
}

/// Fail the run when any non-id column carries no data at all.
///
/// An all-null column in a published summary means an upstream extract or
/// join silently produced nothing; surfacing it as a terminal error keeps
/// the portal from serving an empty clinical attribute.
pub fn check_merged(frame: &DataFrame, subject_column: &str, report: &mut RunReport) -> Result<()> {
    let offenders = all_null_columns(frame, subject_column)?;
    if offenders.is_empty() {
        return Ok(());
    }
    for name in &offenders {
        warn!(column = %name, "column has no data in final artifact");
        report.warn(
            WarningKind::AllNullColumn,
            format!("column {name} has no data in final artifact"),
        );
    }
    Err(PortalError::DataIntegrity(format!(
        "all-null columns in final artifact: {}",
        offenders.join(", ")
    )))
}

/// Fail the run when a timeline column carries no data at all.
///
/// `STOP_DATE` is exempt: open-ended events leave it empty, so a fully
/// empty stop column is legitimate.
pub fn check_timeline(
    frame: &DataFrame,
    subject_column: &str,
    report: &mut RunReport,
) -> Result<()> {
    let offenders: Vec<String> = all_null_columns(frame, subject_column)?
        .into_iter()
        .filter(|name| name != "STOP_DATE")
        .collect();
    if offenders.is_empty() {
        return Ok(());
    }
    for name in &offenders {
        warn!(column = %name, "column has no data in timeline artifact");
        report.warn(
            WarningKind::AllNullColumn,
            format!("column {name} has no data in timeline artifact"),
        );
    }
    Err(PortalError::DataIntegrity(format!(
        "all-null columns in timeline artifact: {}",
        offenders.join(", ")
    )))
}
