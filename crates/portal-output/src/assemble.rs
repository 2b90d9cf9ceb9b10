//! Final artifact rendering.
//!
//! Joins the wide header and the merged data into one tab-separated text
//! blob and hands it to the warehouse gateway. Rendering the whole artifact
//! as text keeps the `#`-marked metadata rows out of the tabular writer's
//! way.

use std::path::Path;

use polars::prelude::DataFrame;
use tracing::{debug, info_span};

use portal_ingest::frame_utils::any_to_string;
use portal_ingest::warehouse::Warehouse;
use portal_model::{PortalError, Result};

use crate::header::HeaderRow;

/// Render the five header lines and the data rows as one TSV text blob.
pub fn render_artifact(header: &[HeaderRow], merged: &DataFrame) -> Result<String> {
    let wide = crate::header::to_wide(header);
    let mut lines: Vec<String> = wide.iter().map(|row| row.join("\t")).collect();

    let columns = merged.get_columns();
    if columns.len() != header.len() {
        return Err(PortalError::config(format!(
            "header describes {} columns but merged data has {}",
            header.len(),
            columns.len()
        )));
    }
    let height = merged.height();
    for idx in 0..height {
        let mut cells = Vec::with_capacity(columns.len());
        for column in columns {
            let value = column
                .get(idx)
                .map_err(|err| PortalError::storage(err.to_string()))?;
            cells.push(any_to_string(value));
        }
        lines.push(cells.join("\t"));
    }
    let mut text = lines.join("\n");
    text.push('\n');
    Ok(text)
}

/// Write the rendered artifact through the gateway to the volume path.
pub fn publish_artifact(
    warehouse: &dyn Warehouse,
    artifact: &str,
    volume_path: &Path,
) -> Result<()> {
    let span = info_span!("publish", path = %volume_path.display());
    let _guard = span.enter();
    warehouse.put_text(volume_path, artifact, true)?;
    debug!(bytes = artifact.len(), "artifact written");
    Ok(())
}
