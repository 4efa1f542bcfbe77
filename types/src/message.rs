use kaldb_basic_types::Offset;
use serde::{Deserialize, Serialize};

/// Raw record read from one partition of the upstream event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub offset: Offset,
    pub timestamp_ms: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl LogEntry {
    pub fn new(offset: Offset, timestamp_ms: i64, payload: Vec<u8>) -> Self {
        Self {
            offset,
            timestamp_ms,
            key: None,
            payload,
        }
    }
}

/// A parsed message ready to be appended to a chunk's local index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogDocument {
    pub id: String,
    pub timestamp_ms: i64,
    pub source: serde_json::Value,
}

impl LogDocument {
    /// Top-level field names of the document source, for the chunk schema
    /// record. Non-object sources index under a single `message` field.
    pub fn field_names(&self) -> Vec<String> {
        match &self.source {
            serde_json::Value::Object(map) => map.keys().cloned().collect(),
            _ => vec!["message".to_string()],
        }
    }
}
