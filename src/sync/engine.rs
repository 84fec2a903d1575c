//! The sync engine: per-stream state machine, incremental filter and watermark tracking.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::config::SyncConfig;
use crate::error::{TapError, TapResult};
use crate::sink::RecordSink;
use crate::types::{DataType, Record, Value};
use crate::workbook::WorkbookReader;

use super::observer::{SyncEvent, SyncMode, SyncObserver};
use super::planner::{plan_streams, Plan, PlanEntry, StreamDescriptor};
use super::state::{Bookmark, ReplicationState};
use super::summary::{RunSummary, StreamStatus};

/// Lifecycle of one stream within a run.
///
/// ```text
/// Planned -> SchemaResolved -> FullSync | IncrementalSync -> Completed
///    \              \                        \
///     +--------------+------------------------+--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Planned,
    SchemaResolved,
    FullSync,
    IncrementalSync,
    Completed,
    Failed,
}

impl StreamPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamPhase::Planned => "PLANNED",
            StreamPhase::SchemaResolved => "SCHEMA_RESOLVED",
            StreamPhase::FullSync => "FULL_SYNC",
            StreamPhase::IncrementalSync => "INCREMENTAL_SYNC",
            StreamPhase::Completed => "COMPLETED",
            StreamPhase::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StreamPhase::Completed | StreamPhase::Failed)
    }

    pub fn can_transition_to(self, next: StreamPhase) -> bool {
        use StreamPhase::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Planned, SchemaResolved) => true,
            (SchemaResolved, FullSync | IncrementalSync) => true,
            (FullSync | IncrementalSync, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for StreamPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks the phase of one stream and rejects out-of-order transitions.
#[derive(Debug)]
pub struct StreamRun {
    stream: String,
    phase: StreamPhase,
}

impl StreamRun {
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            phase: StreamPhase::Planned,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn advance(&mut self, next: StreamPhase) -> TapResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(TapError::InvalidTransition {
                stream: self.stream.clone(),
                from: self.phase.as_str(),
                to: next.as_str(),
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Moves to `Failed` unless the stream already reached a terminal phase.
    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = StreamPhase::Failed;
        }
    }
}

/// Incremental row filter for one stream.
///
/// Admits a row when its replication-key value is of the key column's type and strictly greater
/// than the starting watermark (any such value when there is none), and tracks the largest admitted
/// value. Rows need not arrive sorted by key.
///
/// Values the column type could not represent (null, or text left in a numeric column whose type
/// was inferred from a sample) are never admitted. A starting watermark of the wrong type is
/// discarded.
#[derive(Debug, Clone)]
pub struct WatermarkFilter {
    key_type: DataType,
    start: Option<Value>,
    max_admitted: Option<Value>,
}

impl WatermarkFilter {
    pub fn new(start: Option<Value>, key_type: DataType) -> Self {
        Self {
            key_type,
            start: start.filter(|v| v.conforms_to(key_type)),
            max_admitted: None,
        }
    }

    /// The watermark rows are compared against, if any.
    pub fn start(&self) -> Option<&Value> {
        self.start.as_ref()
    }

    /// Decides whether a row with replication-key value `key` is emitted.
    pub fn admit(&mut self, key: &Value) -> bool {
        if !key.conforms_to(self.key_type) {
            return false;
        }
        // NaN does not order against anything, itself included.
        if key.compare(key).is_none() {
            return false;
        }
        if let Some(start) = &self.start {
            if key.compare(start) != Some(Ordering::Greater) {
                return false;
            }
        }
        let is_new_max = match &self.max_admitted {
            Some(max) => key.compare(max) == Some(Ordering::Greater),
            None => true,
        };
        if is_new_max {
            self.max_admitted = Some(key.clone());
        }
        true
    }

    /// Largest key admitted so far, if any row was admitted.
    pub fn max_admitted(&self) -> Option<&Value> {
        self.max_admitted.as_ref()
    }
}

/// Result of a sync run: what happened to each stream, and the state to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub summary: RunSummary,
    pub state: ReplicationState,
}

struct StreamResult {
    records: u64,
    watermark: Option<Value>,
    bookmark: BookmarkUpdate,
}

enum BookmarkUpdate {
    Keep,
    Set(Bookmark),
    /// The stored bookmark belongs to a different key column and nothing replaced it.
    Drop,
}

/// Runs discovery and sync over an open workbook.
///
/// Streams are processed one at a time in plan order. Schema, replication-key and sheet-read
/// failures fail only their own stream; sink failures abort the run.
#[derive(Default)]
pub struct SyncEngine {
    observer: Option<Arc<dyn SyncObserver>>,
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }

    /// Plans the streams of `workbook` without reading any records.
    pub fn discover(&self, config: &SyncConfig, workbook: &mut dyn WorkbookReader) -> Plan {
        let plan = plan_streams(config, workbook, self.observer.as_deref());
        for entry in &plan.entries {
            if let PlanEntry::Failed { stream_name, error } = entry {
                self.emit(SyncEvent::StreamFailed {
                    stream: stream_name.clone(),
                    reason: error.to_string(),
                });
            }
        }
        plan
    }

    /// Syncs every planned stream, emitting records and state snapshots into `sink`.
    ///
    /// `prior` is the state loaded at the start of the run; it is never modified. The returned
    /// state starts from `prior` and has the bookmark of each completed incremental stream updated.
    pub fn sync(
        &self,
        config: &SyncConfig,
        workbook: &mut dyn WorkbookReader,
        prior: &ReplicationState,
        sink: &mut dyn RecordSink,
    ) -> TapResult<SyncOutcome> {
        let started = Instant::now();
        self.emit(SyncEvent::RunStarted {
            file_path: config.file_path().to_path_buf(),
            sheets_in_workbook: workbook.sheet_names().len(),
        });

        let plan = plan_streams(config, workbook, self.observer.as_deref());
        let mut state = prior.clone();
        let mut summary = RunSummary::default();
        let mut next_ordinal: u64 = 0;

        for entry in plan.entries {
            let descriptor = match entry {
                PlanEntry::Ready(descriptor) => descriptor,
                PlanEntry::Failed { stream_name, error } => {
                    self.record_failure(&mut summary, &stream_name, &error);
                    continue;
                }
            };

            let mut run = StreamRun::new(descriptor.stream_name.as_str());
            let result = self.sync_stream(
                config,
                workbook,
                &descriptor,
                prior,
                sink,
                &mut run,
                &mut next_ordinal,
            );
            match result {
                Ok(done) => {
                    match done.bookmark {
                        BookmarkUpdate::Keep => {}
                        BookmarkUpdate::Set(bookmark) => state.set(descriptor.stream_name.as_str(), bookmark),
                        BookmarkUpdate::Drop => {
                            state.remove(&descriptor.stream_name);
                        }
                    }
                    sink.write_state(&state)?;
                    self.emit(SyncEvent::StreamCompleted {
                        stream: descriptor.stream_name.clone(),
                        records: done.records,
                        watermark: done.watermark,
                    });
                    summary.push(
                        descriptor.stream_name,
                        StreamStatus::Completed {
                            records: done.records,
                        },
                    );
                }
                Err(error) if error.is_stream_local() => {
                    run.fail();
                    self.record_failure(&mut summary, &descriptor.stream_name, &error);
                }
                Err(error) => return Err(error),
            }
        }

        for missing in plan.missing_sheets {
            summary.push(missing, StreamStatus::Skipped);
        }

        self.emit(SyncEvent::RunFinished {
            elapsed: started.elapsed(),
            status: summary.status(),
            completed: summary.completed(),
            skipped: summary.skipped(),
            failed: summary.failed(),
        });

        Ok(SyncOutcome { summary, state })
    }

    fn record_failure(&self, summary: &mut RunSummary, stream: &str, error: &TapError) {
        self.emit(SyncEvent::StreamFailed {
            stream: stream.to_string(),
            reason: error.to_string(),
        });
        summary.push(
            stream,
            StreamStatus::Failed {
                reason: error.to_string(),
            },
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn sync_stream(
        &self,
        config: &SyncConfig,
        workbook: &mut dyn WorkbookReader,
        descriptor: &StreamDescriptor,
        prior: &ReplicationState,
        sink: &mut dyn RecordSink,
        run: &mut StreamRun,
        next_ordinal: &mut u64,
    ) -> TapResult<StreamResult> {
        let stream = descriptor.stream_name.as_str();
        let schema = &descriptor.schema;
        run.advance(StreamPhase::SchemaResolved)?;

        // Column index and type of the replication key, validated again in case the descriptor
        // was built by hand rather than by the planner.
        let key = match descriptor.replication_key.as_deref() {
            Some(name) => {
                let idx = schema.index_of(name).ok_or_else(|| TapError::ReplicationKey {
                    stream: stream.to_string(),
                    column: name.to_string(),
                })?;
                Some((name, idx, schema.fields[idx].data_type))
            }
            None => None,
        };

        let mut stale_bookmark = false;
        let mut filter = match key {
            Some((name, _, data_type)) => {
                let start = match prior.get(stream) {
                    Some(bm) if bm.replication_key == name => Some(bm.value().coerce_to(data_type)),
                    Some(bm) => {
                        self.emit(SyncEvent::BookmarkIgnored {
                            stream: stream.to_string(),
                            stored_key: bm.replication_key.clone(),
                            configured_key: name.to_string(),
                        });
                        stale_bookmark = true;
                        None
                    }
                    None => None,
                };
                run.advance(StreamPhase::IncrementalSync)?;
                Some(WatermarkFilter::new(start, data_type))
            }
            None => {
                run.advance(StreamPhase::FullSync)?;
                None
            }
        };

        self.emit(SyncEvent::StreamStarted {
            stream: stream.to_string(),
            mode: if filter.is_some() {
                SyncMode::Incremental
            } else {
                SyncMode::Full
            },
            watermark: filter.as_ref().and_then(|f| f.start().cloned()),
        });

        sink.write_schema(descriptor)?;
        let data = workbook.read_sheet(stream)?;

        let columns: Arc<[String]> = schema.field_names().map(str::to_string).collect();
        let types: Vec<DataType> = schema.fields.iter().map(|f| f.data_type).collect();
        let milestone = config.milestone_rows().max(1);

        let mut rows_read: u64 = 0;
        let mut records: u64 = 0;
        for row in &data.rows {
            rows_read += 1;

            let values: Vec<Value> = types
                .iter()
                .enumerate()
                .map(|(i, t)| row.get(i).map_or(Value::Null, |v| v.coerce_to(*t)))
                .collect();

            let admitted = match (&mut filter, key) {
                (Some(filter), Some((_, idx, _))) => filter.admit(&values[idx]),
                _ => true,
            };

            if admitted {
                let values = match config.float_precision() {
                    Some(places) => values.iter().map(|v| v.rounded(places)).collect(),
                    None => values,
                };
                sink.write_record(&Record {
                    stream_name: stream.to_string(),
                    columns: Arc::clone(&columns),
                    values,
                    emitted_at: *next_ordinal,
                })?;
                *next_ordinal += 1;
                records += 1;
            }

            if rows_read % milestone == 0 {
                self.emit(SyncEvent::RowMilestone {
                    stream: stream.to_string(),
                    rows_read,
                    records_emitted: records,
                });
            }
        }

        run.advance(StreamPhase::Completed)?;

        let watermark = filter.as_ref().and_then(|f| f.max_admitted().cloned());
        let bookmark = match (&watermark, key) {
            (Some(value), Some((name, _, _))) => BookmarkUpdate::Set(Bookmark::new(name, value)),
            _ if stale_bookmark => BookmarkUpdate::Drop,
            _ => BookmarkUpdate::Keep,
        };

        Ok(StreamResult {
            records,
            watermark,
            bookmark,
        })
    }
}
