//! Warehouse gateway.
//!
//! The real warehouse (query execution, blob storage) is an external
//! collaborator; [`Warehouse`] is its contract. [`LocalWarehouse`] is the
//! shipped implementation: a directory of tab-separated files, one per
//! fully-qualified table name, answering the restricted SQL dialect this
//! pipeline generates for itself.

use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

use portal_model::{PortalError, Result};

use crate::credentials::Credentials;
use crate::tsv;

/// Table registration target for a written artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub catalog: String,
    pub schema: String,
    pub table: String,
}

impl TableInfo {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}.{}", self.catalog, self.schema, self.table)
    }
}

/// Options for a gateway write.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub separator: u8,
    pub overwrite: bool,
    /// When set, the write also registers a table over the file.
    pub table_info: Option<TableInfo>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            separator: b'\t',
            overwrite: true,
            table_info: None,
        }
    }
}

/// Contract between the pipeline and the warehouse.
pub trait Warehouse {
    /// Execute a query and return the result as a frame.
    fn query(&self, sql: &str) -> Result<DataFrame>;

    /// Persist a frame at `path`; register a table over it when requested.
    fn write(&self, frame: &mut DataFrame, path: &Path, options: &WriteOptions) -> Result<()>;

    /// Persist raw text at `path` (final artifacts carry their own header
    /// rows and cannot go through the frame writer).
    fn put_text(&self, path: &Path, contents: &str, overwrite: bool) -> Result<()>;
}

/// Directory-backed warehouse for local runs and tests.
///
/// Table `catalog.schema.name` resolves to `<root>/catalog.schema.name.tsv`.
/// Registrations land as JSON sidecars under `<root>/_catalog/`.
pub struct LocalWarehouse {
    root: PathBuf,
}

impl LocalWarehouse {
    /// Connect with verified credentials.
    pub fn connect(credentials: &Credentials, root: impl Into<PathBuf>) -> Result<Self> {
        credentials.verify()?;
        let root = root.into();
        debug!(root = %root.display(), host = %credentials.host, "warehouse connected");
        Ok(Self { root })
    }

    /// Open without credentials; used by unit tests.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.tsv"))
    }

    fn register_table(&self, info: &TableInfo, data_path: &Path) -> Result<()> {
        let catalog_dir = self.root.join("_catalog");
        std::fs::create_dir_all(&catalog_dir)?;
        let registration = serde_json::json!({
            "table": info.qualified_name(),
            "path": data_path.display().to_string(),
        });
        let sidecar = catalog_dir.join(format!("{}.json", info.qualified_name()));
        std::fs::write(&sidecar, registration.to_string())?;
        debug!(table = %info.qualified_name(), path = %data_path.display(), "table registered");
        Ok(())
    }
}

impl Warehouse for LocalWarehouse {
    fn query(&self, sql: &str) -> Result<DataFrame> {
        let (columns, table) = parse_select(sql)?;
        let path = self.table_path(&table);
        let frame = tsv::read_tsv(&path)
            .map_err(|error| PortalError::storage(format!("table {table}: {error}")))?;
        match columns {
            Projection::All => Ok(frame),
            Projection::Columns(names) => frame
                .select(names.iter().map(String::as_str))
                .map_err(|error| PortalError::storage(format!("table {table}: {error}"))),
        }
    }

    fn write(&self, frame: &mut DataFrame, path: &Path, options: &WriteOptions) -> Result<()> {
        if path.exists() && !options.overwrite {
            return Err(PortalError::storage(format!(
                "refusing to overwrite {}",
                path.display()
            )));
        }
        tsv::write_delimited(frame, path, options.separator)?;
        if let Some(info) = &options.table_info {
            self.register_table(info, path)?;
        }
        Ok(())
    }

    fn put_text(&self, path: &Path, contents: &str, overwrite: bool) -> Result<()> {
        if path.exists() && !overwrite {
            return Err(PortalError::storage(format!(
                "refusing to overwrite {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}

enum Projection {
    All,
    Columns(Vec<String>),
}

/// Parse the `SELECT <cols|*> FROM <table>` dialect the pipeline emits.
fn parse_select(sql: &str) -> Result<(Projection, String)> {
    let trimmed = sql.trim();
    let lowered = trimmed.to_lowercase();
    let rest = lowered
        .strip_prefix("select")
        .ok_or_else(|| PortalError::storage(format!("unsupported query: {trimmed}")))?;
    let from_at = rest
        .find(" from ")
        .ok_or_else(|| PortalError::storage(format!("unsupported query: {trimmed}")))?;
    // Slice the original to preserve identifier case.
    let original_rest = &trimmed["select".len()..];
    let column_part = original_rest[..from_at].trim();
    let table_part = original_rest[from_at + " from ".len()..].trim();
    if table_part.is_empty() || table_part.contains(char::is_whitespace) {
        return Err(PortalError::storage(format!("unsupported query: {trimmed}")));
    }
    let projection = if column_part == "*" {
        Projection::All
    } else {
        Projection::Columns(
            column_part
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        )
    };
    Ok((projection, table_part.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::Column;

    fn seeded_warehouse() -> (tempfile::TempDir, LocalWarehouse) {
        let dir = tempfile::tempdir().unwrap();
        let warehouse = LocalWarehouse::open(dir.path());
        std::fs::write(
            warehouse.table_path("prod.clinical.dx"),
            "MRN\tDX_DATE\tSTAGE\n00000001\t2020-02-09\tII\n",
        )
        .unwrap();
        (dir, warehouse)
    }

    #[test]
    fn query_projects_listed_columns() {
        let (_dir, warehouse) = seeded_warehouse();
        let frame = warehouse
            .query("SELECT MRN, DX_DATE FROM prod.clinical.dx")
            .unwrap();
        let names: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        assert_eq!(names, vec!["MRN".to_string(), "DX_DATE".to_string()]);
        assert_eq!(frame.height(), 1);
    }

    #[test]
    fn query_star_returns_all_columns() {
        let (_dir, warehouse) = seeded_warehouse();
        let frame = warehouse.query("SELECT * FROM prod.clinical.dx").unwrap();
        assert_eq!(frame.width(), 3);
    }

    #[test]
    fn missing_table_is_storage_error() {
        let (_dir, warehouse) = seeded_warehouse();
        let error = warehouse.query("SELECT * FROM prod.clinical.nope").unwrap_err();
        assert!(matches!(error, PortalError::Storage(_)));
    }

    #[test]
    fn missing_column_is_storage_error() {
        let (_dir, warehouse) = seeded_warehouse();
        let error = warehouse
            .query("SELECT NOPE FROM prod.clinical.dx")
            .unwrap_err();
        assert!(matches!(error, PortalError::Storage(_)));
    }

    #[test]
    fn write_registers_table_when_requested() {
        let (_dir, warehouse) = seeded_warehouse();
        let mut frame =
            DataFrame::new(vec![Column::new("PATIENT_ID".into(), ["P-0000001"])]).unwrap();
        let path = warehouse.root().join("out/summary.tsv");
        let options = WriteOptions {
            table_info: Some(TableInfo {
                catalog: "cat".to_string(),
                schema: "sch".to_string(),
                table: "summary".to_string(),
            }),
            ..WriteOptions::default()
        };
        warehouse.write(&mut frame, &path, &options).unwrap();
        assert!(path.exists());
        assert!(warehouse.root().join("_catalog/cat.sch.summary.json").exists());
    }

    #[test]
    fn overwrite_false_refuses_existing_path() {
        let (_dir, warehouse) = seeded_warehouse();
        let path = warehouse.root().join("artifact.txt");
        warehouse.put_text(&path, "first", true).unwrap();
        let error = warehouse.put_text(&path, "second", false).unwrap_err();
        assert!(matches!(error, PortalError::Storage(_)));
    }
}
