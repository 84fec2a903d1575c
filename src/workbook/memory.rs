use crate::error::{TapError, TapResult};
use crate::types::Value;

use super::{SheetData, WorkbookReader};

/// A workbook held entirely in memory.
///
/// Sheets keep their insertion order, mirroring a file workbook's tab order.
///
/// ```rust
/// use excel_tap::types::Value;
/// use excel_tap::workbook::{MemoryWorkbook, WorkbookReader};
///
/// let mut wb = MemoryWorkbook::new().with_sheet(
///     "Orders",
///     &["OrderID", "Amount"],
///     vec![vec![Value::Int64(1), Value::Float64(9.5)]],
/// );
/// assert_eq!(wb.sheet_names(), vec!["Orders".to_string()]);
/// assert_eq!(wb.read_sheet("Orders").unwrap().row_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<(String, SheetData)>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a sheet.
    pub fn with_sheet(mut self, name: &str, header: &[&str], rows: Vec<Vec<Value>>) -> Self {
        self.insert_sheet(
            name,
            SheetData::new(header.iter().map(|h| h.to_string()).collect(), rows),
        );
        self
    }

    /// Adds (or replaces) a sheet, keeping its position if it already existed.
    pub fn insert_sheet(&mut self, name: &str, data: SheetData) {
        match self.sheets.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = data,
            None => self.sheets.push((name.to_string(), data)),
        }
    }

    /// Appends data rows to an existing sheet. Returns `false` if there is no such sheet.
    pub fn append_rows(&mut self, name: &str, rows: Vec<Vec<Value>>) -> bool {
        match self.sheets.iter_mut().find(|(n, _)| n == name) {
            Some((_, data)) => {
                data.rows.extend(rows);
                true
            }
            None => false,
        }
    }
}

impl WorkbookReader for MemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(n, _)| n.clone()).collect()
    }

    fn read_sheet(&mut self, sheet: &str) -> TapResult<SheetData> {
        self.sheets
            .iter()
            .find(|(n, _)| n == sheet)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| TapError::Sheet {
                sheet: sheet.to_string(),
                message: "no such sheet".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheets_keep_insertion_order_and_replace_in_place() {
        let mut wb = MemoryWorkbook::new()
            .with_sheet("b", &["x"], vec![])
            .with_sheet("a", &["x"], vec![]);
        wb.insert_sheet("b", SheetData::new(vec!["y".into()], vec![]));
        assert_eq!(wb.sheet_names(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(wb.read_sheet("b").unwrap().header, vec!["y".to_string()]);
    }

    #[test]
    fn append_rows_and_missing_sheet() {
        let mut wb = MemoryWorkbook::new().with_sheet("s", &["id"], vec![vec![Value::Int64(1)]]);
        assert!(wb.append_rows("s", vec![vec![Value::Int64(2)]]));
        assert!(!wb.append_rows("nope", vec![]));
        assert_eq!(wb.read_sheet("s").unwrap().row_count(), 2);
        assert!(matches!(wb.read_sheet("nope"), Err(TapError::Sheet { .. })));
    }
}
