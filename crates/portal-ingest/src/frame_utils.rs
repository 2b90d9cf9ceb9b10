//! Small frame helpers shared across the workspace.

use polars::prelude::{AnyValue, Column, DataFrame};

use portal_model::{PortalError, Result};

/// Render a cell as the string that would appear in a TSV output.
///
/// Nulls become the empty string; integer offsets print without decoration.
pub fn any_to_string(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        AnyValue::Float64(v) => {
            let s = format!("{v}");
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        }
        other => other.to_string(),
    }
}

/// Extract a column as trimmed strings, nulls as empty strings.
pub fn column_strings(frame: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = frame
        .column(name)
        .map_err(|_| PortalError::storage(format!("missing column {name}")))?;
    let mut values = Vec::with_capacity(frame.height());
    for idx in 0..frame.height() {
        let value = column.get(idx).unwrap_or(AnyValue::Null);
        values.push(any_to_string(value).trim().to_string());
    }
    Ok(values)
}

/// Extract a column as optional strings: nulls and empty cells are `None`.
pub fn column_opt_strings(frame: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    Ok(column_strings(frame, name)?
        .into_iter()
        .map(|value| if value.is_empty() { None } else { Some(value) })
        .collect())
}

/// Owned column names of a frame, in order.
pub fn column_names(frame: &DataFrame) -> Vec<String> {
    frame
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Canonical portal column name: uppercased, spaces replaced by underscores.
pub fn canonical_column_name(name: &str) -> String {
    name.trim().to_uppercase().replace(' ', "_")
}

/// Build a string column; `None` entries become nulls.
pub fn string_column(name: &str, values: Vec<Option<String>>) -> Column {
    Column::new(name.into(), values)
}
