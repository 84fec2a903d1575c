//! Tap configuration.
//!
//! Configuration is read from JSON once, validated, and then only handed around by reference:
//!
//! ```json
//! {
//!   "file_path": "Book1.xlsx",
//!   "sheets": [
//!     { "name": "Sheet1", "replication_key": "OrderID" },
//!     "Sheet3"
//!   ],
//!   "float_precision": 2
//! }
//! ```
//!
//! - `file_path` (required): workbook location
//! - `sheets` (optional): sheets to sync, in order. An entry is either a bare sheet name or an
//!   object with `name` and an optional `replication_key`. Empty or absent means every sheet in the
//!   workbook, fully synced.
//! - `float_precision` (optional, default `2`): decimal places floats are rounded to in emitted
//!   records; `null` disables rounding
//! - `schema_sample_rows` (optional): cap on rows sampled for schema inference (default: all)
//! - `milestone_rows` (optional, default `1000`): interval of row-count progress events

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{TapError, TapResult};

/// Default number of decimal places for floats in emitted records.
pub const DEFAULT_FLOAT_PRECISION: u32 = 2;
/// Largest accepted `float_precision`; an `f64` holds at most 15 significant decimal digits.
pub const MAX_FLOAT_PRECISION: u32 = 15;
/// Default interval, in rows read, between progress events.
pub const DEFAULT_MILESTONE_ROWS: u64 = 1_000;

/// One configured sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetConfig {
    name: String,
    replication_key: Option<String>,
}

impl SheetConfig {
    /// Validates and creates a sheet entry. `name` must be non-empty, and so must
    /// `replication_key` when given.
    pub fn new(name: impl Into<String>, replication_key: Option<&str>) -> TapResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TapError::config("sheet name must not be empty"));
        }
        let replication_key = match replication_key {
            Some(k) if k.trim().is_empty() => {
                return Err(TapError::config(format!(
                    "sheet '{name}': replication_key must not be empty"
                )));
            }
            Some(k) => Some(k.trim().to_string()),
            None => None,
        };
        Ok(Self {
            name,
            replication_key,
        })
    }

    /// Full-sync entry for a sheet found in the workbook. Workbook names are taken as they are.
    pub(crate) fn discovered(name: &str) -> Self {
        Self {
            name: name.to_string(),
            replication_key: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn replication_key(&self) -> Option<&str> {
        self.replication_key.as_deref()
    }
}

/// Validated tap configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    file_path: PathBuf,
    sheets: Vec<SheetConfig>,
    float_precision: Option<u32>,
    schema_sample_rows: Option<usize>,
    milestone_rows: u64,
}

impl SyncConfig {
    /// Creates a configuration with default knobs.
    ///
    /// Fails with [`TapError::Config`] if `file_path` is empty or a sheet is listed twice.
    pub fn new(file_path: impl Into<PathBuf>, sheets: Vec<SheetConfig>) -> TapResult<Self> {
        let file_path = file_path.into();
        if file_path.as_os_str().is_empty() {
            return Err(TapError::config("file_path must not be empty"));
        }

        let mut seen = HashSet::new();
        for sheet in &sheets {
            if !seen.insert(sheet.name()) {
                return Err(TapError::config(format!(
                    "sheet '{}' is listed more than once",
                    sheet.name()
                )));
            }
        }

        Ok(Self {
            file_path,
            sheets,
            float_precision: Some(DEFAULT_FLOAT_PRECISION),
            schema_sample_rows: None,
            milestone_rows: DEFAULT_MILESTONE_ROWS,
        })
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> TapResult<Self> {
        let raw: RawConfig = serde_json::from_str(json)
            .map_err(|e| TapError::config(format!("invalid config: {e}")))?;
        raw.validate()
    }

    /// Reads and validates a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> TapResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            TapError::config(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Sets the rounding applied to emitted floats. Values above [`MAX_FLOAT_PRECISION`] are capped.
    pub fn with_float_precision(mut self, places: Option<u32>) -> Self {
        self.float_precision = places.map(|p| p.min(MAX_FLOAT_PRECISION));
        self
    }

    pub fn with_schema_sample_rows(mut self, rows: Option<usize>) -> Self {
        self.schema_sample_rows = rows;
        self
    }

    /// Sets the progress-event interval. Values below 1 are treated as 1.
    pub fn with_milestone_rows(mut self, rows: u64) -> Self {
        self.milestone_rows = rows.max(1);
        self
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Configured sheets in declared order; empty means "all sheets".
    pub fn sheets(&self) -> &[SheetConfig] {
        &self.sheets
    }

    pub fn float_precision(&self) -> Option<u32> {
        self.float_precision
    }

    pub fn schema_sample_rows(&self) -> Option<usize> {
        self.schema_sample_rows
    }

    pub fn milestone_rows(&self) -> u64 {
        self.milestone_rows
    }
}

fn default_float_precision() -> Option<u32> {
    Some(DEFAULT_FLOAT_PRECISION)
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    file_path: Option<String>,
    #[serde(default)]
    sheets: Option<Vec<RawSheet>>,
    #[serde(default = "default_float_precision")]
    float_precision: Option<u32>,
    #[serde(default)]
    schema_sample_rows: Option<usize>,
    #[serde(default)]
    milestone_rows: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSheet {
    Name(String),
    Entry {
        name: Option<String>,
        #[serde(default)]
        replication_key: Option<String>,
    },
}

impl RawConfig {
    fn validate(self) -> TapResult<SyncConfig> {
        let file_path = match self.file_path {
            Some(p) if !p.trim().is_empty() => p,
            _ => return Err(TapError::config("missing required option 'file_path'")),
        };

        let sheets = self
            .sheets
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(idx, raw)| match raw {
                RawSheet::Name(name) => SheetConfig::new(name, None),
                RawSheet::Entry {
                    name,
                    replication_key,
                } => {
                    let name = name.ok_or_else(|| {
                        TapError::config(format!("sheets[{idx}] is missing 'name'"))
                    })?;
                    SheetConfig::new(name, replication_key.as_deref())
                }
            })
            .collect::<TapResult<Vec<_>>>()?;

        if self.milestone_rows == Some(0) {
            return Err(TapError::config("milestone_rows must be a positive integer"));
        }
        if self.schema_sample_rows == Some(0) {
            return Err(TapError::config("schema_sample_rows must be a positive integer"));
        }
        if let Some(places) = self.float_precision.filter(|p| *p > MAX_FLOAT_PRECISION) {
            return Err(TapError::config(format!(
                "float_precision must be at most {MAX_FLOAT_PRECISION}, got {places}"
            )));
        }

        let config = SyncConfig::new(file_path, sheets)?
            .with_float_precision(self.float_precision)
            .with_schema_sample_rows(self.schema_sample_rows)
            .with_milestone_rows(self.milestone_rows.unwrap_or(DEFAULT_MILESTONE_ROWS));
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_objects_and_bare_names() {
        let cfg = SyncConfig::from_json_str(
            r#"{"file_path": "Book1.xlsx",
                "sheets": [{"name": "Sheet1", "replication_key": "OrderID"}, "Sheet3"]}"#,
        )
        .unwrap();
        assert_eq!(cfg.file_path(), Path::new("Book1.xlsx"));
        assert_eq!(cfg.sheets().len(), 2);
        assert_eq!(cfg.sheets()[0].replication_key(), Some("OrderID"));
        assert_eq!(cfg.sheets()[1].name(), "Sheet3");
        assert_eq!(cfg.sheets()[1].replication_key(), None);
        assert_eq!(cfg.float_precision(), Some(DEFAULT_FLOAT_PRECISION));
        assert_eq!(cfg.milestone_rows(), DEFAULT_MILESTONE_ROWS);
    }

    #[test]
    fn absent_or_empty_sheets_mean_all() {
        let cfg = SyncConfig::from_json_str(r#"{"file_path": "a.xlsx"}"#).unwrap();
        assert!(cfg.sheets().is_empty());
        let cfg = SyncConfig::from_json_str(r#"{"file_path": "a.xlsx", "sheets": []}"#).unwrap();
        assert!(cfg.sheets().is_empty());
    }

    #[test]
    fn null_float_precision_disables_rounding() {
        let cfg =
            SyncConfig::from_json_str(r#"{"file_path": "a.xlsx", "float_precision": null}"#).unwrap();
        assert_eq!(cfg.float_precision(), None);
    }

    #[test]
    fn oversized_float_precision_is_rejected() {
        let err =
            SyncConfig::from_json_str(r#"{"file_path": "a.xlsx", "float_precision": 400}"#)
                .unwrap_err();
        assert!(matches!(err, TapError::Config { .. }));
        assert!(err.to_string().contains("float_precision"));

        let cfg = SyncConfig::new("a.xlsx", vec![]).unwrap().with_float_precision(Some(400));
        assert_eq!(cfg.float_precision(), Some(MAX_FLOAT_PRECISION));
    }

    #[test]
    fn missing_file_path_is_config_error() {
        let err = SyncConfig::from_json_str(r#"{"sheets": []}"#).unwrap_err();
        assert!(matches!(err, TapError::Config { .. }));
        assert!(err.to_string().contains("file_path"));
    }

    #[test]
    fn empty_sheet_name_is_config_error() {
        let err =
            SyncConfig::from_json_str(r#"{"file_path": "a.xlsx", "sheets": [{"name": " "}]}"#)
                .unwrap_err();
        assert!(matches!(err, TapError::Config { .. }));
    }

    #[test]
    fn sheet_without_name_is_config_error() {
        let err = SyncConfig::from_json_str(
            r#"{"file_path": "a.xlsx", "sheets": [{"replication_key": "id"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("sheets[0] is missing 'name'"));
    }

    #[test]
    fn empty_replication_key_is_config_error() {
        let err = SheetConfig::new("Sheet1", Some("")).unwrap_err();
        assert!(matches!(err, TapError::Config { .. }));
    }

    #[test]
    fn duplicate_sheet_is_config_error() {
        let err = SyncConfig::from_json_str(
            r#"{"file_path": "a.xlsx", "sheets": ["Sheet1", {"name": "Sheet1"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("listed more than once"));
    }

    #[test]
    fn malformed_json_is_config_error() {
        let err = SyncConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, TapError::Config { .. }));
    }

    #[test]
    fn zero_milestone_is_rejected() {
        let err =
            SyncConfig::from_json_str(r#"{"file_path": "a.xlsx", "milestone_rows": 0}"#).unwrap_err();
        assert!(err.to_string().contains("milestone_rows"));
    }
}
