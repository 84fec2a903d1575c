//! Schema inference.
//!
//! [`infer_schema`] turns a sheet's header and a sample of its rows into a [`Schema`]:
//!
//! - column names come from the header row, in order; they must be non-empty and unique
//! - each column gets the narrowest [`DataType`] that fits every non-null sample value, widening
//!   along `unknown → integer → float → string` (plus `date → datetime`)
//! - a column with no non-null sample stays [`DataType::Unknown`]
//!
//! The result is a best-effort snapshot of the data seen so far: a later run may widen a column if
//! new values arrive. Consumers must tolerate that.

mod json_schema;

use std::collections::HashSet;

use crate::error::{TapError, TapResult};
use crate::types::{
    parse_bool_text, parse_date_text, parse_datetime_text, parse_time_text, DataType, Field, Schema,
    Value,
};
use crate::workbook::SheetData;

pub use json_schema::{json_schema_for_field, json_schema_for_stream};

/// Infers the schema of `sheet` from its header and up to `sample_rows` data rows
/// (all rows when `None`).
///
/// # Errors
///
/// [`TapError::Schema`] if the header has an empty column name before the last named column, or
/// the same name twice.
pub fn infer_schema(sheet: &str, data: &SheetData, sample_rows: Option<usize>) -> TapResult<Schema> {
    let names = column_names(sheet, &data.header)?;

    let mut types = vec![DataType::Unknown; names.len()];
    let limit = sample_rows.unwrap_or(usize::MAX);
    for row in data.rows.iter().take(limit) {
        for (col, slot) in types.iter_mut().enumerate() {
            if let Some(observed) = row.get(col).and_then(classify) {
                *slot = slot.join(observed);
            }
        }
    }

    Ok(Schema::new(
        names
            .into_iter()
            .zip(types)
            .map(|(name, data_type)| Field::new(name, data_type))
            .collect(),
    ))
}

/// Validates header cells and returns the column names.
///
/// Trailing empty cells are dropped.
fn column_names(sheet: &str, header: &[String]) -> TapResult<Vec<String>> {
    let last_named = header.iter().rposition(|h| !h.trim().is_empty());
    let header = match last_named {
        Some(idx) => &header[..=idx],
        None => return Ok(Vec::new()),
    };

    let mut seen = HashSet::with_capacity(header.len());
    let mut names = Vec::with_capacity(header.len());
    for (idx, raw) in header.iter().enumerate() {
        let name = raw.trim();
        if name.is_empty() {
            return Err(TapError::Schema {
                sheet: sheet.to_string(),
                message: format!("missing column name at position {}", idx + 1),
            });
        }
        if !seen.insert(name) {
            return Err(TapError::Schema {
                sheet: sheet.to_string(),
                message: format!("duplicate column name '{name}'"),
            });
        }
        names.push(name.to_string());
    }
    Ok(names)
}

/// Type observed for a single cell, or `None` for null / blank cells.
///
/// Text only counts as boolean or date when it matches an unambiguous pattern.
pub fn classify(value: &Value) -> Option<DataType> {
    match value {
        Value::Null => None,
        Value::Int64(_) => Some(DataType::Int64),
        Value::Float64(_) => Some(DataType::Float64),
        Value::Bool(_) => Some(DataType::Bool),
        Value::Date(_) => Some(DataType::Date),
        Value::DateTime(_) => Some(DataType::DateTime),
        Value::Time(_) => Some(DataType::Time),
        Value::Utf8(s) if s.trim().is_empty() => None,
        Value::Utf8(s) => Some(classify_text(s)),
    }
}

fn classify_text(s: &str) -> DataType {
    if parse_bool_text(s).is_some() {
        DataType::Bool
    } else if parse_datetime_text(s).is_some() {
        DataType::DateTime
    } else if parse_date_text(s).is_some() {
        DataType::Date
    } else if parse_time_text(s).is_some() {
        DataType::Time
    } else {
        DataType::Utf8
    }
}
