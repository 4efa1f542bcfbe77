use std::fmt;

use kaldb_types::{LogDocument, LogEntry};

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("message payload is not valid JSON: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// Parses a raw upstream record into an indexable document.
pub trait MessageTransformer: 'static + fmt::Debug + Send + Sync {
    fn transform(&self, entry: &LogEntry) -> Result<LogDocument, TransformError>;
}

/// Treats payloads as JSON. The document id comes from an `id` field when
/// present, otherwise from the record offset; the timestamp from a
/// `timestamp` or `@timestamp` epoch-millis field, otherwise from the record.
#[derive(Debug, Default)]
pub struct JsonMessageTransformer;

impl MessageTransformer for JsonMessageTransformer {
    fn transform(&self, entry: &LogEntry) -> Result<LogDocument, TransformError> {
        let source: serde_json::Value = serde_json::from_slice(&entry.payload)?;
        let id = source
            .get("id")
            .and_then(|value| value.as_str())
            .map(str::to_owned)
            .unwrap_or_else(|| entry.offset.to_string());
        let timestamp_ms = source
            .get("timestamp")
            .or_else(|| source.get("@timestamp"))
            .and_then(|value| value.as_i64())
            .unwrap_or(entry.timestamp_ms);
        Ok(LogDocument {
            id,
            timestamp_ms,
            source,
        })
    }
}
