//! Call parameters and their form/querystring encoding.

use serde_json::{Map, Value};
use tracing::debug;

/// Parameters passed to one interface call.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    #[default]
    None,
    /// Pre-encoded string, sent verbatim
    Text(String),
    /// Pre-encoded `key=value` fragments, joined with `&`
    List(Vec<String>),
    /// Keys and values, url-encoded on send
    Map(Map<String, Value>),
}

impl Params {
    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Text(s) => s.is_empty(),
            Params::List(items) => items.is_empty(),
            Params::Map(map) => map.is_empty(),
        }
    }

    /// Encode as `application/x-www-form-urlencoded` text.
    ///
    /// Map values that are strings are used as-is, other scalars by their
    /// text form, and `null`/objects/arrays as JSON text before
    /// percent-encoding. Keys whose value cannot be encoded are dropped.
    pub fn encode(&self) -> String {
        match self {
            Params::None => String::new(),
            Params::Text(s) => s.clone(),
            Params::List(items) => items.join("&"),
            Params::Map(map) => map
                .iter()
                .filter_map(|(key, value)| match encode_value(value) {
                    Some(text) => Some(format!("{key}={}", urlencoding::encode(&text))),
                    None => {
                        debug!("Dropping parameter '{}': value cannot be encoded", key);
                        None
                    }
                })
                .collect::<Vec<_>>()
                .join("&"),
        }
    }

    /// JSON view used in logs and call records
    pub fn to_value(&self) -> Value {
        match self {
            Params::None => Value::Null,
            Params::Text(s) => Value::String(s.clone()),
            Params::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
            Params::Map(map) => Value::Object(map.clone()),
        }
    }
}

fn encode_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => serde_json::to_string(value).ok(),
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Params::None,
            Value::String(s) => Params::Text(s),
            Value::Array(items) => Params::List(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            Value::Object(map) => Params::Map(map),
            scalar => Params::Text(scalar.to_string()),
        }
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Params::Map(map)
    }
}

impl From<&str> for Params {
    fn from(s: &str) -> Self {
        Params::Text(s.to_string())
    }
}

impl From<String> for Params {
    fn from(s: String) -> Self {
        Params::Text(s)
    }
}

impl From<Vec<String>> for Params {
    fn from(items: Vec<String>) -> Self {
        Params::List(items)
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::None
    }
}
