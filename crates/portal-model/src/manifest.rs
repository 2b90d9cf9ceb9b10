//! Manifest of produced intermediates.
//!
//! Entry order is load-bearing: the merger and header builder both walk the
//! manifest in order to fix the final artifact's column order.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::descriptor::RunLevel;

/// One successfully processed descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub summary_id: String,
    pub yaml_config_path: PathBuf,
    pub intermediate_data_path: PathBuf,
    pub patient_or_sample: RunLevel,
}

/// Ordered collection of manifest entries for one run.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ManifestEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ManifestEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a ManifestEntry;
    type IntoIter = std::slice::Iter<'a, ManifestEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_preserves_insertion_order() {
        let mut manifest = Manifest::new();
        for id in ["b", "a", "c"] {
            manifest.push(ManifestEntry {
                summary_id: id.to_string(),
                yaml_config_path: PathBuf::from(format!("{id}.yaml")),
                intermediate_data_path: PathBuf::from(format!("{id}.tsv")),
                patient_or_sample: RunLevel::Patient,
            });
        }
        let ids: Vec<&str> = manifest.iter().map(|e| e.summary_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
