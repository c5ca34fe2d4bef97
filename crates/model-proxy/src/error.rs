//! Error types shared across the crate.
//!
//! Construction-time failures (`ProxyError`, `AggregatorError`) are returned
//! synchronously to the caller. Per-call runtime failures (`CallError`) are
//! always delivered as values in a batch's result collection.

use std::path::PathBuf;

/// Errors raised while wiring executors together.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("proxy registry has no profile store configured")]
    NotConfigured,
    #[error("proxy registry is already configured")]
    AlreadyConfigured,
    #[error("unknown interface id: {0}")]
    UnknownInterface(String),
    #[error("interface [{id}] has no url configured for status '{status}'")]
    MissingEnvironmentUrl { id: String, status: String },
    #[error("interface [{id}] has an invalid url '{url}': {reason}")]
    InvalidUrl {
        id: String,
        url: String,
        reason: String,
    },
    #[error("interface [{id}] has an invalid http method '{method}'")]
    InvalidMethod { id: String, method: String },
}

/// Failure of a single logical call.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("interface [{id}] timed out after {timeout_ms}ms")]
    Timeout { id: String, timeout_ms: u64 },
    #[error("interface [{id}] network error: {message}")]
    Network { id: String, message: String },
    #[error("interface [{id}] returned an html page where json was expected")]
    MalformedJson { id: String },
    #[error("interface [{id}] returned unparsable json: {message}")]
    JsonParse { id: String, message: String },
    #[error("interface [{id}] mock rule could not be loaded: {source}")]
    MockLoad {
        id: String,
        #[source]
        source: CatalogError,
    },
    #[error("interface [{id}] mock generation failed: {source}")]
    MockGeneration {
        id: String,
        #[source]
        source: MockError,
    },
}

impl CallError {
    /// Interface id the failed call targeted.
    pub fn interface_id(&self) -> &str {
        match self {
            CallError::Timeout { id, .. }
            | CallError::Network { id, .. }
            | CallError::MalformedJson { id }
            | CallError::JsonParse { id, .. }
            | CallError::MockLoad { id, .. }
            | CallError::MockGeneration { id, .. } => id,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::Timeout { .. })
    }
}

/// Errors from loading the interface catalog or its mock rules.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(String),
    #[error("catalog does not specify a global status")]
    MissingStatus,
    #[error("interface [{0}] is not configured")]
    UnknownInterface(String),
    #[error("interface [{id}] mock rule not found at {path}")]
    RuleNotFound { id: String, path: PathBuf },
    #[error("interface [{id}] mock rule at {path} could not be read: {source}")]
    RuleRead {
        id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("interface [{id}] mock rule at {path} is not valid json: {message}")]
    RuleParse {
        id: String,
        path: PathBuf,
        message: String,
    },
    #[error("interface [{id}] is invalid: {reason}")]
    InvalidInterface { id: String, reason: String },
}

/// Errors from expanding a mock template.
#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("invalid range in rule '{rule}' for key '{key}': min is greater than max")]
    InvalidRange { key: String, rule: String },
    #[error("rule '{rule}' for key '{key}' overflows")]
    Overflow { key: String, rule: String },
    #[error("repeat count {count} for '{key}' exceeds the limit of {limit}")]
    TooLarge { key: String, count: u64, limit: u64 },
    #[error("invalid arguments for @{placeholder}: {reason}")]
    InvalidArgument { placeholder: String, reason: String },
}

/// Errors from building or driving a `RequestAggregator`.
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("no method named '{0}' is bound on this aggregator")]
    UnknownMethod(String),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}
