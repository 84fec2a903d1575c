use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type used across the tap.
pub type TapResult<T> = Result<T, TapError>;

/// Error type returned by configuration, discovery and sync operations.
///
/// Variants fall into two groups:
///
/// - **run-fatal**: [`TapError::Config`], [`TapError::FileNotFound`], [`TapError::UnreadableFormat`],
///   [`TapError::Persistence`], [`TapError::Io`], [`TapError::Json`]. These propagate to the caller.
/// - **stream-local**: [`TapError::Schema`], [`TapError::ReplicationKey`], [`TapError::Sheet`]. The
///   sync engine catches these at the stream boundary and keeps going with the next stream.
///
/// See [`TapError::is_stream_local`].
#[derive(Debug, Error)]
pub enum TapError {
    /// Malformed configuration (missing `file_path`, empty sheet name, ...).
    #[error("config error: {message}")]
    Config { message: String },

    /// The workbook path does not exist.
    #[error("workbook not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// The workbook exists but cannot be opened as a spreadsheet.
    #[error("unreadable workbook {}: {message}", path.display())]
    UnreadableFormat { path: PathBuf, message: String },

    /// A sheet's header row has a duplicate or empty column name.
    #[error("schema error in sheet '{sheet}': {message}")]
    Schema { sheet: String, message: String },

    /// The configured replication key is not a column of the stream's schema.
    #[error("replication key '{column}' not found in stream '{stream}'")]
    ReplicationKey { stream: String, column: String },

    /// A single sheet could not be read from an otherwise valid workbook.
    #[error("failed to read sheet '{sheet}': {message}")]
    Sheet { sheet: String, message: String },

    /// Replication state could not be written.
    #[error("failed to persist state: {message}")]
    Persistence { message: String },

    /// A stream was asked to move between sync phases in an order the engine does not allow.
    #[error("stream '{stream}' cannot move from {from} to {to}")]
    InvalidTransition {
        stream: String,
        from: &'static str,
        to: &'static str,
    },

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialisation error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TapError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns `true` for errors that fail only the stream they occurred in.
    pub fn is_stream_local(&self) -> bool {
        matches!(
            self,
            Self::Schema { .. } | Self::ReplicationKey { .. } | Self::Sheet { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::TapError;

    #[test]
    fn replication_key_error_names_stream_and_column() {
        let err = TapError::ReplicationKey {
            stream: "Sheet2".to_string(),
            column: "CustomerID".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "replication key 'CustomerID' not found in stream 'Sheet2'"
        );
        assert!(err.is_stream_local());
    }

    #[test]
    fn config_and_file_errors_are_run_fatal() {
        assert!(!TapError::config("missing file_path").is_stream_local());
        let err = TapError::FileNotFound {
            path: "Book1.xlsx".into(),
        };
        assert!(!err.is_stream_local());
        assert_eq!(err.to_string(), "workbook not found: Book1.xlsx");
    }
}
