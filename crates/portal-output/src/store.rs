//! Intermediate store and manifest.
//!
//! One tab-separated file per processed descriptor, written through the
//! gateway so the destination table registration happens in the same step.
//! The manifest records every intermediate in processing order; that order
//! fixes the final artifact's column order.

use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use tracing::debug;

use portal_ingest::warehouse::{TableInfo, Warehouse, WriteOptions};
use portal_model::{
    Descriptor, Manifest, ManifestEntry, PortalError, Result, RunMode,
};

/// Accumulates intermediates and their manifest for one run.
pub struct IntermediateStore<'a> {
    warehouse: &'a dyn Warehouse,
    volume_root: PathBuf,
    manifest: Manifest,
}

impl<'a> IntermediateStore<'a> {
    pub fn new(warehouse: &'a dyn Warehouse, volume_root: impl Into<PathBuf>) -> Self {
        Self {
            warehouse,
            volume_root: volume_root.into(),
            manifest: Manifest::new(),
        }
    }

    /// Destination path for a descriptor's intermediate.
    pub fn intermediate_path(&self, descriptor: &Descriptor, mode: RunMode) -> PathBuf {
        let dest = descriptor.dest(mode);
        self.volume_root.join(&dest.volume).join(&dest.filename)
    }

    /// Persist one intermediate and append its manifest entry.
    pub fn save(
        &mut self,
        frame: &mut DataFrame,
        descriptor: &Descriptor,
        yaml_path: &Path,
        mode: RunMode,
    ) -> Result<PathBuf> {
        let dest = descriptor.dest(mode);
        let path = self.intermediate_path(descriptor, mode);
        let table = Path::new(&dest.filename)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&dest.filename)
            .to_string();
        let options = WriteOptions {
            table_info: Some(TableInfo {
                catalog: dest.catalog.clone(),
                schema: dest.schema.clone(),
                table,
            }),
            ..WriteOptions::default()
        };
        self.warehouse.write(frame, &path, &options)?;
        self.manifest.push(ManifestEntry {
            summary_id: descriptor.summary_id.clone(),
            yaml_config_path: yaml_path.to_path_buf(),
            intermediate_data_path: path.clone(),
            patient_or_sample: descriptor.patient_or_sample,
        });
        debug!(
            summary_id = %descriptor.summary_id,
            path = %path.display(),
            rows = frame.height(),
            "intermediate saved"
        );
        Ok(path)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Write the manifest as comma-separated values.
    pub fn finalize_manifest(&self, path: &Path) -> Result<()> {
        write_manifest(&self.manifest, path)
    }
}

/// Write a manifest file (comma-separated, one line per intermediate).
pub fn write_manifest(manifest: &Manifest, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .map_err(|error| PortalError::storage(format!("manifest {}: {error}", path.display())))?;
    for entry in manifest {
        writer
            .serialize(entry)
            .map_err(|error| PortalError::storage(format!("manifest entry: {error}")))?;
    }
    writer
        .flush()
        .map_err(|error| PortalError::storage(format!("manifest flush: {error}")))?;
    Ok(())
}

/// Read a manifest file back, preserving order.
pub fn read_manifest(path: &Path) -> Result<Manifest> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|error| PortalError::storage(format!("manifest {}: {error}", path.display())))?;
    let mut manifest = Manifest::new();
    for record in reader.deserialize::<ManifestEntry>() {
        let entry =
            record.map_err(|error| PortalError::storage(format!("manifest entry: {error}")))?;
        manifest.push(entry);
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::Column;
    use portal_ingest::warehouse::LocalWarehouse;
    use portal_model::{Dest, RunLevel};

    fn descriptor() -> Descriptor {
        let dest = Dest {
            catalog: "cat".to_string(),
            schema: "sch".to_string(),
            volume: "summaries".to_string(),
            filename: "dx.tsv".to_string(),
        };
        Descriptor {
            summary_id: "diagnosis".to_string(),
            patient_or_sample: RunLevel::Patient,
            source_table_prod: "prod.clinical.dx".to_string(),
            source_table_dev: "dev.clinical.dx".to_string(),
            key_column: "MRN".to_string(),
            columns: vec!["MRN".to_string(), "DX_DATE".to_string()],
            date_columns: vec!["DX_DATE".to_string()],
            dest_prod: dest.clone(),
            dest_dev: dest,
            column_metadata: Default::default(),
        }
    }

    #[test]
    fn save_writes_file_and_manifest_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let warehouse = LocalWarehouse::open(dir.path());
        let mut store = IntermediateStore::new(&warehouse, dir.path());
        let mut frame = DataFrame::new(vec![
            Column::new("PATIENT_ID".into(), ["P-0000001"]),
            Column::new("DX_DATE".into(), ["30"]),
        ])
        .unwrap();
        let descriptor = descriptor();
        let path = store
            .save(&mut frame, &descriptor, Path::new("dx.yaml"), RunMode::Test)
            .unwrap();
        assert!(path.exists());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("PATIENT_ID\tDX_DATE\n"));

        let manifest_path = dir.path().join("manifest.csv");
        store.finalize_manifest(&manifest_path).unwrap();
        let loaded = read_manifest(&manifest_path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.entries()[0].summary_id, "diagnosis");
        assert_eq!(loaded.entries()[0].patient_or_sample, RunLevel::Patient);
    }
}
