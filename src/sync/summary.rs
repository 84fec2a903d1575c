//! Per-stream outcomes of a run.

use std::fmt;

/// Final status of one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    /// All rows were read; `records` of them were emitted.
    Completed { records: u64 },
    /// The configured sheet does not exist in the workbook.
    Skipped,
    /// The stream failed; other streams were unaffected.
    Failed { reason: String },
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamStatus::Completed { records } => write!(f, "completed ({records} records)"),
            StreamStatus::Skipped => f.write_str("skipped (missing sheet)"),
            StreamStatus::Failed { reason } => write!(f, "failed ({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub stream: String,
    pub status: StreamStatus,
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// No stream failed.
    Success,
    /// At least one stream failed and at least one completed.
    PartialSuccess,
    /// Streams failed and none completed.
    Failed,
}

/// Outcome of every stream of a run, in plan order, followed by skipped sheets in config order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub streams: Vec<StreamOutcome>,
}

impl RunSummary {
    pub fn push(&mut self, stream: impl Into<String>, status: StreamStatus) {
        self.streams.push(StreamOutcome {
            stream: stream.into(),
            status,
        });
    }

    /// Status of `stream`, if it appears in the summary.
    pub fn status_of(&self, stream: &str) -> Option<&StreamStatus> {
        self.streams
            .iter()
            .find(|o| o.stream == stream)
            .map(|o| &o.status)
    }

    pub fn completed(&self) -> usize {
        self.count(|s| matches!(s, StreamStatus::Completed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, StreamStatus::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, StreamStatus::Failed { .. }))
    }

    /// Total records emitted across completed streams.
    pub fn records_emitted(&self) -> u64 {
        self.streams
            .iter()
            .map(|o| match o.status {
                StreamStatus::Completed { records } => records,
                _ => 0,
            })
            .sum()
    }

    pub fn status(&self) -> RunStatus {
        match (self.failed(), self.completed()) {
            (0, _) => RunStatus::Success,
            (_, 0) => RunStatus::Failed,
            _ => RunStatus::PartialSuccess,
        }
    }

    fn count(&self, pred: impl Fn(&StreamStatus) -> bool) -> usize {
        self.streams.iter().filter(|o| pred(&o.status)).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for o in &self.streams {
            writeln!(f, "{}: {}", o.stream, o.status)?;
        }
        write!(
            f,
            "{} completed, {} skipped, {} failed",
            self.completed(),
            self.skipped(),
            self.failed()
        )
    }
}
