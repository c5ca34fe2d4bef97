//! Per-call log records.
//!
//! Every network call emits exactly one `CallRecord` through the registry's
//! `CallLogger` once it settles. The default logger discards records.

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

/// Classification of a settled network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseCode {
    /// Response received and decoded
    Ok,
    /// Connection failure, reset, abort or timeout
    NetworkFailure,
    /// JSON with trailing HTML that was cut off before parsing
    ImpureJson,
    /// An HTML page where JSON was expected
    MalformedJson,
    /// Body could not be parsed as JSON
    ParseFailure,
}

impl ResponseCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseCode::Ok => "ok",
            ResponseCode::NetworkFailure => "network_failure",
            ResponseCode::ImpureJson => "impure_json",
            ResponseCode::MalformedJson => "malformed_json",
            ResponseCode::ParseFailure => "parse_failure",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub id: String,
    pub url: String,
    pub params: Value,
    pub cookie: Option<String>,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub res_code: ResponseCode,
    /// HTTP status when a response arrived
    pub status: Option<u16>,
    /// Raw response text or the error message
    pub data: String,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Sink for call records.
pub trait CallLogger: Send + Sync {
    fn log(&self, record: &CallRecord);
}

/// Discards every record.
#[derive(Debug, Default)]
pub struct NoopLogger;

impl CallLogger for NoopLogger {
    fn log(&self, _record: &CallRecord) {}
}

/// Emits records as `tracing` events on the `model_proxy::calls` target.
#[derive(Debug, Default)]
pub struct TracingLogger;

impl CallLogger for TracingLogger {
    fn log(&self, record: &CallRecord) {
        info!(
            target: "model_proxy::calls",
            id = %record.id,
            url = %record.url,
            params = %record.params,
            cookie = record.cookie.as_deref().unwrap_or(""),
            duration_ms = record.duration.as_millis() as u64,
            res_code = record.res_code.as_str(),
            status = record.status.unwrap_or(0),
            data = %record.data,
            "interface call settled"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> CallRecord {
        CallRecord {
            id: "Api.list".to_string(),
            url: "http://127.0.0.1/list?a=1".to_string(),
            params: json!({"a": 1}),
            cookie: None,
            duration: Duration::from_millis(42),
            res_code: ResponseCode::ImpureJson,
            status: Some(200),
            data: "{}".to_string(),
        }
    }

    #[test]
    fn test_record_serialization() {
        let value = serde_json::to_value(record()).unwrap();
        assert_eq!(value["duration"], json!(42));
        assert_eq!(value["resCode"], json!("impureJson"));
        assert_eq!(value["status"], json!(200));
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_tracing_logger_emits_event() {
        TracingLogger.log(&record());
        assert!(logs_contain("interface call settled"));
        assert!(logs_contain("impure_json"));
    }

    #[test]
    fn test_noop_logger() {
        NoopLogger.log(&record());
    }
}
