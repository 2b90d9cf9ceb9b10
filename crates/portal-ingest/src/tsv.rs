//! Tab-separated frame IO.
//!
//! Every table and intermediate in this pipeline is text; values are read
//! back as strings so that intermediates survive a round trip unchanged
//! (day offsets stay exactly as written, leading zeros are preserved).

use std::fs::File;
use std::path::Path;

use polars::prelude::{
    CsvParseOptions, CsvReadOptions, CsvWriter, DataFrame, SerReader, SerWriter,
};

use portal_model::{PortalError, Result};

/// Read a separated-values file with every column typed as string.
pub fn read_delimited(path: &Path, separator: u8) -> Result<DataFrame> {
    let parse_options = CsvParseOptions::default().with_separator(separator);
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_parse_options(parse_options)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|error| PortalError::storage(format!("open {}: {error}", path.display())))?
        .finish()
        .map_err(|error| PortalError::storage(format!("read {}: {error}", path.display())))
}

/// Read a tab-separated file with every column typed as string.
pub fn read_tsv(path: &Path) -> Result<DataFrame> {
    read_delimited(path, b'\t')
}

/// Write a frame as separated values with a single column-name header line.
///
/// Nulls serialize as empty cells. Parent directories are created on demand.
pub fn write_delimited(frame: &mut DataFrame, path: &Path, separator: u8) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    CsvWriter::new(file)
        .include_header(true)
        .with_separator(separator)
        .finish(frame)
        .map_err(|error| PortalError::storage(format!("write {}: {error}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::Column;

    #[test]
    fn round_trip_preserves_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.tsv");
        let mut frame = DataFrame::new(vec![
            Column::new("PATIENT_ID".into(), ["P-0000001", "P-0000002"]),
            Column::new("MRN".into(), ["00001234", "00005678"]),
        ])
        .unwrap();
        write_delimited(&mut frame, &path, b'\t').unwrap();
        let read = read_tsv(&path).unwrap();
        assert_eq!(read.height(), 2);
        let mrn = read.column("MRN").unwrap().str().unwrap();
        // Zero padding must survive: values come back as strings, not ints.
        assert_eq!(mrn.get(0), Some("00001234"));
    }

    #[test]
    fn missing_file_is_storage_error() {
        let error = read_tsv(Path::new("/nonexistent/frame.tsv")).unwrap_err();
        assert!(matches!(error, PortalError::Storage(_)));
    }
}
