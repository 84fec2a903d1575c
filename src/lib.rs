//! `excel-tap` extracts the sheets of a spreadsheet workbook as schema-bearing record streams,
//! optionally emitting only the rows added since the previous run.
//!
//! The primary entrypoints are [`sync::run_sync`] (emit records + state) and
//! [`sync::run_discovery`] (list streams and their schemas). Both read a [`config::SyncConfig`].
//!
//! ## What a run does
//!
//! 1. **Plan**: configured sheets are matched against the workbook's sheets. Missing sheets are
//!    skipped without failing the run; with no sheets configured, every sheet is a stream.
//! 2. **Infer**: each stream's [`types::Schema`] is inferred from its header and data, widening
//!    column types along `unknown → integer → float → string`.
//! 3. **Sync**: rows are emitted in source order. Streams with a replication key only emit rows
//!    whose key is strictly greater than the stored watermark, and record the largest emitted key
//!    as the next watermark.
//!
//! A bad header or an unknown replication key fails only its own stream; the run reports
//! per-stream outcomes in a [`sync::RunSummary`].
//!
//! **Workbook formats:** `.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods` (via calamine).
//!
//! ## Quick example: incremental sync over an in-memory workbook
//!
//! ```rust
//! use excel_tap::config::{SheetConfig, SyncConfig};
//! use excel_tap::sink::CollectingSink;
//! use excel_tap::sync::{ReplicationState, SyncEngine};
//! use excel_tap::types::Value;
//! use excel_tap::workbook::MemoryWorkbook;
//!
//! # fn main() -> Result<(), excel_tap::TapError> {
//! let mut wb = MemoryWorkbook::new().with_sheet(
//!     "Orders",
//!     &["OrderID", "Amount"],
//!     vec![
//!         vec![Value::Int64(1), Value::Float64(10.0)],
//!         vec![Value::Int64(2), Value::Float64(12.5)],
//!     ],
//! );
//! let config = SyncConfig::new(
//!     "orders.xlsx",
//!     vec![SheetConfig::new("Orders", Some("OrderID"))?],
//! )?;
//!
//! let engine = SyncEngine::new();
//! let mut sink = CollectingSink::new();
//! let first = engine.sync(&config, &mut wb, &ReplicationState::new(), &mut sink)?;
//! assert_eq!(sink.records.len(), 2);
//!
//! // Nothing new: the second run emits no records.
//! let mut sink = CollectingSink::new();
//! engine.sync(&config, &mut wb, &first.state, &mut sink)?;
//! assert!(sink.records.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: validated configuration
//! - [`workbook`]: workbook readers (calamine, in-memory)
//! - [`schema`]: schema inference and JSON-schema rendering
//! - [`sync`]: planning, the sync engine, replication state, events and run summaries
//! - [`sink`]: record sinks (Singer JSON lines, in-memory)
//! - [`catalog`]: discovery output
//! - [`types`]: schema, value and record types
//! - [`error`]: the error type shared by all of the above

pub mod catalog;
pub mod config;
pub mod error;
pub mod schema;
pub mod sink;
pub mod sync;
pub mod types;
pub mod workbook;

pub use error::{TapError, TapResult};
