//! Replication state: the per-stream watermark carried between runs.
//!
//! On disk the state uses the Singer bookmark layout:
//!
//! ```json
//! {
//!   "bookmarks": {
//!     "Sheet1": { "replication_key": "OrderID", "replication_key_value": 3 }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{TapError, TapResult};
use crate::types::Value;

/// Last emitted replication-key value of one stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Column the watermark was taken from.
    pub replication_key: String,
    /// The watermark itself, in its JSON representation.
    pub replication_key_value: serde_json::Value,
}

impl Bookmark {
    pub fn new(replication_key: impl Into<String>, value: &Value) -> Self {
        Self {
            replication_key: replication_key.into(),
            replication_key_value: value.to_json(),
        }
    }

    /// The watermark as an untyped [`Value`]; coerce it to the column type before comparing.
    pub fn value(&self) -> Value {
        Value::from_json(&self.replication_key_value)
    }
}

/// Mapping from stream name to its [`Bookmark`].
///
/// A stream without an entry has no prior state and is fully synced on its next run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReplicationState {
    #[serde(default)]
    bookmarks: BTreeMap<String, Bookmark>,
}

impl ReplicationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stream: &str) -> Option<&Bookmark> {
        self.bookmarks.get(stream)
    }

    /// Writes (or replaces) the bookmark of `stream`.
    pub fn set(&mut self, stream: impl Into<String>, bookmark: Bookmark) {
        self.bookmarks.insert(stream.into(), bookmark);
    }

    pub fn remove(&mut self, stream: &str) -> Option<Bookmark> {
        self.bookmarks.remove(stream)
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bookmark)> {
        self.bookmarks.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parses state from its JSON form. `{}` is an empty state.
    pub fn from_json(json: &serde_json::Value) -> TapResult<Self> {
        Ok(serde_json::from_value(json.clone())?)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "bookmarks": self
                .bookmarks
                .iter()
                .map(|(stream, bm)| {
                    (
                        stream.clone(),
                        serde_json::json!({
                            "replication_key": bm.replication_key,
                            "replication_key_value": bm.replication_key_value,
                        }),
                    )
                })
                .collect::<serde_json::Map<_, _>>(),
        })
    }
}

/// Long-lived holder of [`ReplicationState`] between runs.
pub trait StateStore {
    /// Loads the state saved by the previous run, or an empty state if there is none.
    fn load_state(&self) -> TapResult<ReplicationState>;

    /// Persists `state`. Failures are reported as [`TapError::Persistence`].
    fn save_state(&self, state: &ReplicationState) -> TapResult<()>;
}

/// Keeps state as a JSON file.
///
/// Saves write a sibling temporary file and rename it over the target; an interrupted save leaves
/// the previous state file in place.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStateStore {
    fn load_state(&self) -> TapResult<ReplicationState> {
        if !self.path.exists() {
            return Ok(ReplicationState::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(ReplicationState::new());
        }
        let json: serde_json::Value = serde_json::from_str(&text)?;
        ReplicationState::from_json(&json)
    }

    fn save_state(&self, state: &ReplicationState) -> TapResult<()> {
        let persist_err = |e: &dyn std::fmt::Display| TapError::Persistence {
            message: format!("{}: {e}", self.path.display()),
        };

        let body = serde_json::to_string_pretty(&state.to_json()).map_err(|e| persist_err(&e))?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| persist_err(&e))?;
        }
        let tmp = self.temp_path();
        std::fs::write(&tmp, body).map_err(|e| persist_err(&e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| persist_err(&e))?;
        tracing::debug!(path = %self.path.display(), streams = state.len(), "saved replication state");
        Ok(())
    }
}

/// Keeps state in memory, e.g. across runs within one process.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<ReplicationState>,
}

impl MemoryStateStore {
    pub fn new(initial: ReplicationState) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }

    /// The most recently saved state.
    pub fn snapshot(&self) -> ReplicationState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl StateStore for MemoryStateStore {
    fn load_state(&self) -> TapResult<ReplicationState> {
        Ok(self.snapshot())
    }

    fn save_state(&self, state: &ReplicationState) -> TapResult<()> {
        let mut guard = self.state.lock().map_err(|_| TapError::Persistence {
            message: "state mutex poisoned".to_string(),
        })?;
        *guard = state.clone();
        Ok(())
    }
}
