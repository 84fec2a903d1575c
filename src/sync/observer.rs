use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::types::Value;

use super::summary::RunStatus;

/// How a stream is synced on this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Every row is emitted.
    Full,
    /// Only rows past the stream's watermark are emitted.
    Incremental,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Full => f.write_str("full"),
            SyncMode::Incremental => f.write_str("incremental"),
        }
    }
}

/// Events emitted by discovery and sync at well-defined points of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    RunStarted {
        file_path: PathBuf,
        sheets_in_workbook: usize,
    },
    /// A configured sheet does not exist in the workbook.
    StreamSkipped {
        stream: String,
        available: Vec<String>,
    },
    StreamStarted {
        stream: String,
        mode: SyncMode,
        /// Watermark the incremental filter compares against, if any.
        watermark: Option<Value>,
    },
    /// A stored bookmark was taken on a different column than the one now configured.
    BookmarkIgnored {
        stream: String,
        stored_key: String,
        configured_key: String,
    },
    RowMilestone {
        stream: String,
        rows_read: u64,
        records_emitted: u64,
    },
    StreamCompleted {
        stream: String,
        records: u64,
        watermark: Option<Value>,
    },
    StreamFailed {
        stream: String,
        reason: String,
    },
    StateSaved {
        streams: usize,
    },
    RunFinished {
        elapsed: Duration,
        status: RunStatus,
        completed: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Observer hook for sync events.
///
/// Implementors can log, collect metrics, or assert on the event sequence in tests.
pub trait SyncObserver: Send + Sync {
    fn on_event(&self, event: &SyncEvent);
}

/// Fans events out to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn SyncObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn SyncObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl SyncObserver for CompositeObserver {
    fn on_event(&self, event: &SyncEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }
}

/// Logs sync events through `tracing`.
///
/// Failures and ignored bookmarks are warnings, missing sheets are informational, and progress
/// milestones are debug-level.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_event(&self, event: &SyncEvent) {
        match event {
            SyncEvent::RunStarted {
                file_path,
                sheets_in_workbook,
            } => info!(
                file = %file_path.display(),
                sheets = sheets_in_workbook,
                "run started"
            ),
            SyncEvent::StreamSkipped { stream, available } => info!(
                stream = %stream,
                available = ?available,
                "sheet not found in workbook, skipping"
            ),
            SyncEvent::StreamStarted {
                stream,
                mode,
                watermark,
            } => info!(
                stream = %stream,
                mode = %mode,
                watermark = ?watermark,
                "syncing stream"
            ),
            SyncEvent::BookmarkIgnored {
                stream,
                stored_key,
                configured_key,
            } => warn!(
                stream = %stream,
                stored_key = %stored_key,
                configured_key = %configured_key,
                "replication key changed since last run, resyncing stream from scratch"
            ),
            SyncEvent::RowMilestone {
                stream,
                rows_read,
                records_emitted,
            } => debug!(
                stream = %stream,
                rows_read,
                records_emitted,
                "progress"
            ),
            SyncEvent::StreamCompleted {
                stream,
                records,
                watermark,
            } => info!(
                stream = %stream,
                records,
                watermark = ?watermark,
                "stream completed"
            ),
            SyncEvent::StreamFailed { stream, reason } => {
                warn!(stream = %stream, reason = %reason, "stream failed")
            }
            SyncEvent::StateSaved { streams } => debug!(streams, "state saved"),
            SyncEvent::RunFinished {
                elapsed,
                status,
                completed,
                skipped,
                failed,
            } => info!(
                elapsed_ms = elapsed.as_millis() as u64,
                status = ?status,
                completed,
                skipped,
                failed,
                "run finished"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Counting {
        seen: Mutex<usize>,
    }

    impl SyncObserver for Counting {
        fn on_event(&self, _event: &SyncEvent) {
            *self.seen.lock().unwrap() += 1;
        }
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn log_line(event: &SyncEvent) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::with_default(subscriber, || TracingObserver.on_event(event));
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn missing_sheet_is_logged_at_info() {
        let line = log_line(&SyncEvent::StreamSkipped {
            stream: "Ghost".into(),
            available: vec!["Sheet1".into()],
        });
        assert!(line.contains("INFO"), "{line}");
        assert!(!line.contains("WARN"), "{line}");
        assert!(line.contains("Ghost"), "{line}");
    }

    #[test]
    fn stream_failure_is_logged_at_warn() {
        let line = log_line(&SyncEvent::StreamFailed {
            stream: "Sheet2".into(),
            reason: "boom".into(),
        });
        assert!(line.contains("WARN"), "{line}");
    }

    #[test]
    fn composite_forwards_to_every_observer() {
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        let observers: Vec<Arc<dyn SyncObserver>> = vec![a.clone(), b.clone(), Arc::new(TracingObserver)];
        let composite = CompositeObserver::new(observers);
        composite.on_event(&SyncEvent::StateSaved { streams: 1 });
        composite.on_event(&SyncEvent::StreamFailed {
            stream: "s".into(),
            reason: "boom".into(),
        });
        assert_eq!(*a.seen.lock().unwrap(), 2);
        assert_eq!(*b.seen.lock().unwrap(), 2);
    }
}
