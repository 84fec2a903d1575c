//! Workbook access.
//!
//! The sync engine only needs two things from a workbook: the ordered list of sheet names and, for
//! a given sheet, its header plus typed data rows. [`WorkbookReader`] captures that contract.
//!
//! - [`excel`]: calamine-backed reader for `.xlsx`, `.xlsm`, `.xlsb`, `.xls` and `.ods` files
//! - [`memory`]: in-memory reader, handy for tests and for embedding the tap

pub mod excel;
pub mod memory;

use crate::error::TapResult;
use crate::types::Value;

pub use excel::ExcelWorkbook;
pub use memory::MemoryWorkbook;

/// A sheet's header and data rows, as read from a workbook.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetData {
    /// Header cells rendered as trimmed text. May contain empty or duplicate names; validating
    /// them is the schema inferencer's job.
    pub header: Vec<String>,
    /// Data rows in source order. Rows may be shorter or longer than the header.
    pub rows: Vec<Vec<Value>>,
}

impl SheetData {
    pub fn new(header: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { header, rows }
    }

    /// Number of data rows (header excluded).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Source of sheets for discovery and sync.
///
/// Implementations are opened once per run and dropped when the run ends, on success or failure.
pub trait WorkbookReader {
    /// Sheet names in the workbook's native order.
    fn sheet_names(&self) -> Vec<String>;

    /// Reads one sheet. The header is the first non-empty row; fully empty rows are skipped.
    fn read_sheet(&mut self, sheet: &str) -> TapResult<SheetData>;
}
