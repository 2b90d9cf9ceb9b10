//! Summary descriptor configuration.
//!
//! One YAML descriptor defines one block of summary columns sourced from a
//! single warehouse table. The loader in `portal-ingest` deserializes the
//! file; validation lives here because the rules are pure functions of the
//! record.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PortalError, Result};

/// Whether a run (or a descriptor) targets one row per patient or one row
/// per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunLevel {
    Patient,
    Sample,
}

impl RunLevel {
    /// Canonical subject column name for this level.
    pub fn subject_column(self) -> &'static str {
        match self {
            Self::Patient => "PATIENT_ID",
            Self::Sample => "SAMPLE_ID",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Sample => "sample",
        }
    }
}

impl fmt::Display for RunLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RunLevel {
    type Err = PortalError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "patient" => Ok(Self::Patient),
            "sample" => Ok(Self::Sample),
            other => Err(PortalError::config(format!(
                "invalid run level {other:?}, expected \"patient\" or \"sample\""
            ))),
        }
    }
}

/// Which source tables and destinations a run reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Production,
    Test,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Portal datatype for a summary column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Datatype {
    #[default]
    String,
    Number,
}

impl Datatype {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Number => "NUMBER",
        }
    }
}

/// Per-column header metadata and backfill configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub label: String,
    #[serde(default)]
    pub datatype: Datatype,
    #[serde(default)]
    pub description: String,
    /// Replaces nulls (and literal `NA`/`N/A`) after template alignment.
    #[serde(default)]
    pub fill_value: Option<String>,
}

/// Catalog/schema/volume/filename quadruple for an intermediate output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dest {
    pub catalog: String,
    pub schema: String,
    pub volume: String,
    pub filename: String,
}

impl Dest {
    fn validate(&self, which: &str, summary_id: &str) -> Result<()> {
        for (field, value) in [
            ("catalog", &self.catalog),
            ("schema", &self.schema),
            ("volume", &self.volume),
            ("filename", &self.filename),
        ] {
            if value.trim().is_empty() {
                return Err(PortalError::config(format!(
                    "descriptor {summary_id}: {which}.{field} is empty"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for one block of summary columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub summary_id: String,
    pub patient_or_sample: RunLevel,
    pub source_table_prod: String,
    pub source_table_dev: String,
    /// Column in the source carrying either the raw MRN or a portal id.
    pub key_column: String,
    /// Ordered source columns to project; must contain `key_column`.
    pub columns: Vec<String>,
    /// Subset of `columns` holding calendar dates to convert to offsets.
    #[serde(default)]
    pub date_columns: Vec<String>,
    pub dest_prod: Dest,
    pub dest_dev: Dest,
    #[serde(default)]
    pub column_metadata: BTreeMap<String, ColumnMetadata>,
}

impl Descriptor {
    /// Source table for the given mode; a run-wide switch, not per-descriptor.
    pub fn source_table(&self, mode: RunMode) -> &str {
        match mode {
            RunMode::Production => &self.source_table_prod,
            RunMode::Test => &self.source_table_dev,
        }
    }

    /// Intermediate destination for the given mode.
    pub fn dest(&self, mode: RunMode) -> &Dest {
        match mode {
            RunMode::Production => &self.dest_prod,
            RunMode::Test => &self.dest_dev,
        }
    }

    /// Validate the record.
    ///
    /// Hard rules return `Config` errors. Extra `column_metadata` keys are
    /// tolerated and returned as warning messages for the caller to report.
    pub fn validate(&self) -> Result<Vec<String>> {
        if self.summary_id.trim().is_empty() {
            return Err(PortalError::config("descriptor summary_id is empty"));
        }
        if self.columns.is_empty() {
            return Err(PortalError::config(format!(
                "descriptor {}: columns is empty",
                self.summary_id
            )));
        }
        if !self.columns.contains(&self.key_column) {
            return Err(PortalError::config(format!(
                "descriptor {}: key_column {:?} is not listed in columns",
                self.summary_id, self.key_column
            )));
        }
        for date_column in &self.date_columns {
            if !self.columns.contains(date_column) {
                return Err(PortalError::config(format!(
                    "descriptor {}: date_columns entry {date_column:?} is not listed in columns",
                    self.summary_id
                )));
            }
        }
        self.dest_prod.validate("dest_prod", &self.summary_id)?;
        self.dest_dev.validate("dest_dev", &self.summary_id)?;

        let mut warnings = Vec::new();
        for key in self.column_metadata.keys() {
            if !self.columns.contains(key) {
                warnings.push(format!(
                    "descriptor {}: column_metadata key {key:?} has no matching column, ignored",
                    self.summary_id
                ));
            }
        }
        Ok(warnings)
    }
}
