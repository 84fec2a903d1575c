//! Discovery output: one catalog entry per resolvable stream.

use serde::Serialize;

use crate::schema::json_schema_for_stream;
use crate::sync::{Plan, StreamDescriptor};

/// Replication method advertised for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicationMethod {
    FullTable,
    Incremental,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub tap_stream_id: String,
    pub stream: String,
    /// JSON schema of the stream's records.
    pub schema: serde_json::Value,
    pub key_properties: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_key: Option<String>,
    pub replication_method: ReplicationMethod,
}

impl From<&StreamDescriptor> for CatalogEntry {
    fn from(d: &StreamDescriptor) -> Self {
        Self {
            tap_stream_id: d.stream_name.clone(),
            stream: d.stream_name.clone(),
            schema: json_schema_for_stream(&d.schema),
            key_properties: Vec::new(),
            replication_key: d.replication_key.clone(),
            replication_method: if d.is_incremental() {
                ReplicationMethod::Incremental
            } else {
                ReplicationMethod::FullTable
            },
        }
    }
}

/// The streams a sync run would produce, in plan order.
///
/// Streams that failed to resolve are left out; they are reported through the observer instead.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Catalog {
    pub streams: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn from_plan(plan: &Plan) -> Self {
        Self {
            streams: plan.descriptors().map(CatalogEntry::from).collect(),
        }
    }

    pub fn get(&self, stream: &str) -> Option<&CatalogEntry> {
        self.streams.iter().find(|e| e.stream == stream)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
