//! Record sinks: where emitted schemas, records and state snapshots go.
//!
//! - [`SingerSink`] writes Singer `SCHEMA` / `RECORD` / `STATE` messages as JSON lines
//! - [`CollectingSink`] keeps everything in memory

use std::io::Write;

use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::error::TapResult;
use crate::schema::json_schema_for_stream;
use crate::sync::{ReplicationState, StreamDescriptor};
use crate::types::Record;

/// Receiver of a sync run's output.
///
/// For each completed stream the engine calls `write_schema` once, then `write_record` per emitted
/// record, then `write_state` with the updated snapshot. An error from any method aborts the run.
pub trait RecordSink {
    fn write_schema(&mut self, stream: &StreamDescriptor) -> TapResult<()>;
    fn write_record(&mut self, record: &Record) -> TapResult<()>;
    fn write_state(&mut self, state: &ReplicationState) -> TapResult<()>;
}

/// Writes Singer messages, one JSON document per line.
#[derive(Debug)]
pub struct SingerSink<W: Write> {
    out: W,
}

impl<W: Write> SingerSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, message: &serde_json::Value) -> TapResult<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> RecordSink for SingerSink<W> {
    fn write_schema(&mut self, stream: &StreamDescriptor) -> TapResult<()> {
        let bookmark_properties: Vec<&str> = stream.replication_key.as_deref().into_iter().collect();
        self.write_line(&json!({
            "type": "SCHEMA",
            "stream": stream.stream_name,
            "schema": json_schema_for_stream(&stream.schema),
            "key_properties": [],
            "bookmark_properties": bookmark_properties,
        }))
    }

    fn write_record(&mut self, record: &Record) -> TapResult<()> {
        self.write_line(&json!({
            "type": "RECORD",
            "stream": record.stream_name,
            "record": record.to_json_object(),
            "time_extracted": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        }))
    }

    fn write_state(&mut self, state: &ReplicationState) -> TapResult<()> {
        self.write_line(&json!({
            "type": "STATE",
            "value": state.to_json(),
        }))?;
        self.out.flush()?;
        Ok(())
    }
}

/// Keeps every schema, record and state snapshot in memory.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub schemas: Vec<StreamDescriptor>,
    pub records: Vec<Record>,
    pub states: Vec<ReplicationState>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records of one stream, in emission order.
    pub fn records_for<'a>(&'a self, stream: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records.iter().filter(move |r| r.stream_name == stream)
    }

    /// The last state snapshot written, if any.
    pub fn last_state(&self) -> Option<&ReplicationState> {
        self.states.last()
    }
}

impl RecordSink for CollectingSink {
    fn write_schema(&mut self, stream: &StreamDescriptor) -> TapResult<()> {
        self.schemas.push(stream.clone());
        Ok(())
    }

    fn write_record(&mut self, record: &Record) -> TapResult<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn write_state(&mut self, state: &ReplicationState) -> TapResult<()> {
        self.states.push(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sync::Bookmark;
    use crate::types::{DataType, Field, Schema, Value};

    fn descriptor() -> StreamDescriptor {
        StreamDescriptor {
            stream_name: "Sheet1".into(),
            replication_key: Some("OrderID".into()),
            schema: Schema::new(vec![
                Field::new("OrderID", DataType::Int64),
                Field::new("Amount", DataType::Float64),
            ]),
        }
    }

    fn lines(buf: Vec<u8>) -> Vec<serde_json::Value> {
        String::from_utf8(buf)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn singer_messages_are_json_lines() {
        let mut sink = SingerSink::new(Vec::new());
        sink.write_schema(&descriptor()).unwrap();
        sink.write_record(&Record {
            stream_name: "Sheet1".into(),
            columns: Arc::from(vec!["OrderID".to_string(), "Amount".to_string()]),
            values: vec![Value::Int64(1), Value::Float64(9.99)],
            emitted_at: 0,
        })
        .unwrap();
        let mut state = ReplicationState::new();
        state.set("Sheet1", Bookmark::new("OrderID", &Value::Int64(1)));
        sink.write_state(&state).unwrap();

        let msgs = lines(sink.into_inner());
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0]["type"], "SCHEMA");
        assert_eq!(msgs[0]["bookmark_properties"], json!(["OrderID"]));
        assert_eq!(msgs[0]["schema"]["properties"]["OrderID"]["type"], json!(["null", "integer"]));
        assert_eq!(msgs[1]["type"], "RECORD");
        assert_eq!(msgs[1]["record"], json!({"OrderID": 1, "Amount": 9.99}));
        assert!(msgs[1]["time_extracted"].as_str().unwrap().ends_with('Z'));
        assert_eq!(msgs[2]["type"], "STATE");
        assert_eq!(
            msgs[2]["value"]["bookmarks"]["Sheet1"]["replication_key_value"],
            1
        );
    }

    #[test]
    fn collecting_sink_filters_by_stream() {
        let mut sink = CollectingSink::new();
        for (i, stream) in ["a", "b", "a"].iter().enumerate() {
            sink.write_record(&Record {
                stream_name: stream.to_string(),
                columns: Arc::from(vec!["x".to_string()]),
                values: vec![Value::Int64(i as i64)],
                emitted_at: i as u64,
            })
            .unwrap();
        }
        assert_eq!(sink.records_for("a").count(), 2);
        assert!(sink.last_state().is_none());
    }
}
