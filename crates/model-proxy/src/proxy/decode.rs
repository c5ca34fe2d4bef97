//! Response body decoding.
//!
//! Upstreams sometimes answer a JSON interface with an HTML error page, or
//! append one after a valid document. Bodies starting with `<` are rejected
//! without parsing; bodies containing `<!DOCTYPE` are cut at the last marker
//! and the prefix is parsed.

use crate::config::Profile;
use crate::error::CallError;
use crate::log::ResponseCode;
use base64::Engine;
use bytes::Bytes;
use serde_json::Value;

const DOCTYPE_MARKER: &str = "<!DOCTYPE";

/// Successful result of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
    Raw(Bytes),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Payload::Raw(b) => Some(b),
            _ => None,
        }
    }

    /// JSON view of the payload; raw bytes become a base64 string
    pub fn to_json(&self) -> Value {
        match self {
            Payload::Json(v) => v.clone(),
            Payload::Text(s) => Value::String(s.clone()),
            Payload::Raw(b) => {
                Value::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
        }
    }
}

/// Decode a buffered body according to the profile's encoding and data type.
pub fn decode_body(profile: &Profile, body: &Bytes) -> (Result<Payload, CallError>, ResponseCode) {
    if profile.is_raw() {
        return (Ok(Payload::Raw(body.clone())), ResponseCode::Ok);
    }

    let text = String::from_utf8_lossy(body);
    if !profile.expects_json() {
        return (Ok(Payload::Text(text.into_owned())), ResponseCode::Ok);
    }

    if text.starts_with('<') {
        return (
            Err(CallError::MalformedJson {
                id: profile.id.clone(),
            }),
            ResponseCode::MalformedJson,
        );
    }

    let (json_text, code) = match text.rfind(DOCTYPE_MARKER) {
        Some(pos) => (&text[..pos], ResponseCode::ImpureJson),
        None => (&text[..], ResponseCode::Ok),
    };

    match serde_json::from_str::<Value>(json_text) {
        Ok(value) => (Ok(Payload::Json(value)), code),
        Err(e) => (
            Err(CallError::JsonParse {
                id: profile.id.clone(),
                message: e.to_string(),
            }),
            ResponseCode::ParseFailure,
        ),
    }
}
