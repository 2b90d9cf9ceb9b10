//! Descriptor YAML loading.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use portal_model::{Descriptor, PortalError, Result, RunReport, WarningKind};

/// A descriptor together with its on-disk origin.
#[derive(Debug, Clone)]
pub struct LoadedDescriptor {
    pub path: PathBuf,
    pub descriptor: Descriptor,
}

/// Parse and validate one descriptor file.
///
/// Malformed YAML and hard validation failures are `Config` errors; extra
/// `column_metadata` keys only warn.
pub fn load_descriptor(path: &Path, report: &mut RunReport) -> Result<LoadedDescriptor> {
    let contents = std::fs::read_to_string(path)
        .map_err(|error| PortalError::storage(format!("read {}: {error}", path.display())))?;
    let descriptor: Descriptor = serde_yaml::from_str(&contents)
        .map_err(|error| PortalError::config(format!("parse {}: {error}", path.display())))?;
    for warning in descriptor.validate()? {
        warn!(path = %path.display(), "{warning}");
        report.warn(WarningKind::Descriptor, warning);
    }
    debug!(
        path = %path.display(),
        summary_id = %descriptor.summary_id,
        level = %descriptor.patient_or_sample,
        "descriptor loaded"
    );
    Ok(LoadedDescriptor {
        path: path.to_path_buf(),
        descriptor,
    })
}

/// Load every `*.yaml` file in a directory, in lexicographic filename order.
///
/// The order is load-bearing: it fixes the manifest order and therefore the
/// final artifact's column order. A malformed descriptor is a `Config` error
/// and aborts the run before anything is written; an unreadable file is a
/// `Storage` error, recorded as a failed descriptor and skipped.
pub fn load_descriptor_dir(dir: &Path, report: &mut RunReport) -> Result<Vec<LoadedDescriptor>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|error| PortalError::storage(format!("read dir {}: {error}", dir.display())))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml"))
        })
        .collect();
    paths.sort();

    let mut loaded = Vec::with_capacity(paths.len());
    for path in paths {
        match load_descriptor(&path, report) {
            Ok(descriptor) => loaded.push(descriptor),
            Err(error @ PortalError::Storage(_)) => {
                let stem = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or("descriptor")
                    .to_string();
                warn!(path = %path.display(), error = %error, "descriptor read failed, skipped");
                report.record_failed(stem, error.to_string());
            }
            Err(error) => return Err(error),
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR_YAML: &str = r#"
summary_id: diagnosis
patient_or_sample: patient
source_table_prod: prod.clinical.dx
source_table_dev: dev.clinical.dx
key_column: MRN
columns: [MRN, DX_DATE]
date_columns: [DX_DATE]
dest_prod: {catalog: cat, schema: sch, volume: vol, filename: dx.tsv}
dest_dev: {catalog: cat, schema: sch, volume: vol, filename: dx.tsv}
"#;

    #[test]
    fn loads_directory_in_filename_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_second.yaml", "a_first.yaml", "notes.txt"] {
            std::fs::write(dir.path().join(name), DESCRIPTOR_YAML).unwrap();
        }
        let mut report = RunReport::new();
        let loaded = load_descriptor_dir(dir.path(), &mut report).unwrap();
        let names: Vec<String> = loaded
            .iter()
            .map(|d| d.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a_first.yaml", "b_second.yaml"]);
    }

    #[test]
    fn broken_file_aborts_the_directory_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.yaml"), DESCRIPTOR_YAML).unwrap();
        std::fs::write(dir.path().join("broken.yaml"), "summary_id: [oops").unwrap();
        let mut report = RunReport::new();
        let error = load_descriptor_dir(dir.path(), &mut report).unwrap_err();
        assert!(matches!(error, PortalError::Config(_)));
    }

    #[test]
    fn unreadable_file_is_skipped_and_recorded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.yaml"), DESCRIPTOR_YAML).unwrap();
        // a directory with a .yaml name fails the read with a storage error
        std::fs::create_dir(dir.path().join("stuck.yaml")).unwrap();
        let mut report = RunReport::new();
        let loaded = load_descriptor_dir(dir.path(), &mut report).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "summary_id: [unterminated").unwrap();
        let mut report = RunReport::new();
        let error = load_descriptor(&path, &mut report).unwrap_err();
        assert!(matches!(error, PortalError::Config(_)));
    }

    #[test]
    fn invalid_level_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad_level.yaml");
        std::fs::write(&path, DESCRIPTOR_YAML.replace(": patient", ": cohort")).unwrap();
        let mut report = RunReport::new();
        assert!(load_descriptor(&path, &mut report).is_err());
    }
}
