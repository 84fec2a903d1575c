//! Discovery and sync.
//!
//! This module sits on top of [`crate::workbook`] and [`crate::schema`] and provides:
//!
//! - [`planner`]: which sheets become streams, and with which replication key
//! - [`engine`]: the per-stream sync state machine and incremental filter
//! - [`state`]: replication state and its stores
//! - [`observer`]: structured events for logging and monitoring
//! - [`summary`]: per-stream outcomes of a run
//!
//! [`run_sync`] and [`run_discovery`] wire these together for a workbook on disk.

pub mod engine;
pub mod observer;
pub mod planner;
pub mod state;
pub mod summary;

use std::sync::Arc;

use crate::config::SyncConfig;
use crate::error::TapResult;
use crate::sink::RecordSink;
use crate::workbook::ExcelWorkbook;

pub use engine::{StreamPhase, StreamRun, SyncEngine, SyncOutcome, WatermarkFilter};
pub use observer::{CompositeObserver, SyncEvent, SyncMode, SyncObserver, TracingObserver};
pub use planner::{plan_streams, Plan, PlanEntry, StreamDescriptor};
pub use state::{Bookmark, JsonFileStateStore, MemoryStateStore, ReplicationState, StateStore};
pub use summary::{RunStatus, RunSummary, StreamOutcome, StreamStatus};

/// Opens the configured workbook and plans its streams (discovery mode).
pub fn run_discovery(config: &SyncConfig, observer: Option<Arc<dyn SyncObserver>>) -> TapResult<Plan> {
    let mut workbook = ExcelWorkbook::open(config.file_path())?;
    let engine = engine_with(observer);
    Ok(engine.discover(config, &mut workbook))
}

/// Runs a full sync of the configured workbook (sync mode).
///
/// Loads prior state from `store`, syncs every planned stream into `sink`, and saves the resulting
/// state. The workbook is closed before state is saved, whatever the outcome.
///
/// # Errors
///
/// Configuration, file-access and sink errors abort the run. A failed save is reported as
/// [`crate::TapError::Persistence`]: records were already emitted, so the next run re-emits them.
pub fn run_sync(
    config: &SyncConfig,
    store: &dyn StateStore,
    sink: &mut dyn RecordSink,
    observer: Option<Arc<dyn SyncObserver>>,
) -> TapResult<RunSummary> {
    let prior = store.load_state()?;
    let engine = engine_with(observer.clone());

    let outcome = {
        let mut workbook = ExcelWorkbook::open(config.file_path())?;
        engine.sync(config, &mut workbook, &prior, sink)?
    };

    store.save_state(&outcome.state)?;
    if let Some(obs) = &observer {
        obs.on_event(&SyncEvent::StateSaved {
            streams: outcome.state.len(),
        });
    }
    Ok(outcome.summary)
}

fn engine_with(observer: Option<Arc<dyn SyncObserver>>) -> SyncEngine {
    match observer {
        Some(obs) => SyncEngine::new().with_observer(obs),
        None => SyncEngine::new(),
    }
}
