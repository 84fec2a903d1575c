use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, ExcelDateTime, Reader, Sheets};
use chrono::NaiveTime;

use crate::error::{TapError, TapResult};
use crate::types::{parse_date_text, parse_datetime_text, Value};

use super::{SheetData, WorkbookReader};

/// File extensions calamine can open.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// A workbook opened from disk with calamine.
///
/// Behavior:
/// - Detects the first non-empty row of each sheet as the header row
/// - Skips fully empty rows after the header
/// - Converts cells into typed [`Value`]s: whole-number floats become integers (Excel stores every
///   number as a float), date cells at midnight become dates, error cells and blank text become null
pub struct ExcelWorkbook {
    path: PathBuf,
    sheets: Sheets<BufReader<File>>,
}

impl ExcelWorkbook {
    /// Opens the workbook at `path`.
    ///
    /// Fails with [`TapError::FileNotFound`] if nothing exists at `path`, and with
    /// [`TapError::UnreadableFormat`] if the extension is not a spreadsheet format or calamine cannot
    /// parse the file.
    pub fn open(path: impl AsRef<Path>) -> TapResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TapError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();
        if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(TapError::UnreadableFormat {
                path: path.to_path_buf(),
                message: format!(
                    "unsupported extension '{ext}' (expected one of {})",
                    SUPPORTED_EXTENSIONS.join(", ")
                ),
            });
        }

        let sheets = open_workbook_auto(path).map_err(|e| TapError::UnreadableFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            sheets,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WorkbookReader for ExcelWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names()
    }

    fn read_sheet(&mut self, sheet: &str) -> TapResult<SheetData> {
        let range = self
            .sheets
            .worksheet_range(sheet)
            .map_err(|e| TapError::Sheet {
                sheet: sheet.to_string(),
                message: e.to_string(),
            })?;
        Ok(sheet_data_from_range(&range))
    }
}

fn sheet_data_from_range(range: &calamine::Range<Data>) -> SheetData {
    let mut rows = range
        .rows()
        .filter(|row| row.iter().any(|c| !is_blank(c)));

    let header = match rows.next() {
        Some(row) => row.iter().map(cell_to_header_string).collect(),
        None => return SheetData::default(),
    };
    let rows = rows
        .map(|row| row.iter().map(cell_to_value).collect())
        .collect();

    SheetData::new(header, rows)
}

fn is_blank(c: &Data) -> bool {
    match c {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(f) => f.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => String::new(),
    }
}

// Beyond 2^53 a float no longer holds every integer exactly.
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

pub(crate) fn cell_to_value(c: &Data) -> Value {
    match c {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::Utf8(s.clone()),
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT_INT => Value::Int64(*f as i64),
        Data::Float(f) => Value::Float64(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => excel_datetime_to_value(dt),
        Data::DateTimeIso(s) => parse_datetime_text(s)
            .map(Value::DateTime)
            .or_else(|| parse_date_text(s).map(Value::Date))
            .unwrap_or_else(|| Value::Utf8(s.clone())),
        Data::DurationIso(s) => Value::Utf8(s.clone()),
    }
}

fn excel_datetime_to_value(dt: &ExcelDateTime) -> Value {
    if dt.is_duration() {
        return Value::Float64(dt.as_f64());
    }
    // Serials below one day carry no date part: time-of-day cells.
    let serial = dt.as_f64();
    match dt.as_datetime() {
        Some(ts) if (0.0..1.0).contains(&serial) => Value::Time(ts.time()),
        Some(ts) if ts.time() == NaiveTime::MIN => Value::Date(ts.date()),
        Some(ts) => Value::DateTime(ts),
        None => Value::Float64(dt.as_f64()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_floats_become_integers() {
        assert_eq!(cell_to_value(&Data::Float(3.0)), Value::Int64(3));
        assert_eq!(cell_to_value(&Data::Float(3.5)), Value::Float64(3.5));
        assert_eq!(cell_to_value(&Data::Float(1e300)), Value::Float64(1e300));
    }

    #[test]
    fn blanks_and_errors_are_null() {
        assert_eq!(cell_to_value(&Data::Empty), Value::Null);
        assert_eq!(cell_to_value(&Data::String("   ".into())), Value::Null);
        assert_eq!(
            cell_to_value(&Data::Error(calamine::CellErrorType::Div0)),
            Value::Null
        );
    }

    #[test]
    fn iso_datetime_cells_are_parsed() {
        let v = cell_to_value(&Data::DateTimeIso("2024-02-03T04:05:06".into()));
        assert!(matches!(v, Value::DateTime(_)));
        let v = cell_to_value(&Data::DateTimeIso("2024-02-03".into()));
        assert!(matches!(v, Value::Date(_)));
    }

    #[test]
    fn header_cells_render_as_trimmed_text() {
        assert_eq!(cell_to_header_string(&Data::String(" id ".into())), "id");
        assert_eq!(cell_to_header_string(&Data::Float(2024.0)), "2024");
        assert_eq!(cell_to_header_string(&Data::Empty), "");
    }

    #[test]
    fn open_reports_missing_file() {
        let err = ExcelWorkbook::open("definitely/not/here.xlsx").err().unwrap();
        assert!(matches!(err, TapError::FileNotFound { .. }));
    }
}
