//! Interface definitions and their normalized runtime form.

use crate::error::CatalogError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Status sentinel: answer with the rule's `response` template.
pub const STATUS_MOCK: &str = "mock";
/// Status sentinel: answer with the rule's `responseError` template.
pub const STATUS_MOCK_ERR: &str = "mockerr";
/// Encoding that returns the upstream bytes untouched.
pub const ENCODING_RAW: &str = "raw";
pub const DATA_TYPE_JSON: &str = "json";
pub const DEFAULT_METHOD: &str = "GET";
pub const DEFAULT_TIMEOUT_MS: u64 = 4500;

static ID_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_id_regex() -> &'static Regex {
    ID_REGEX.get_or_init(|| Regex::new(r"^(?:\w+\.)*\w+$").unwrap())
}

/// Check that an id is a dotted sequence of word segments (`Api.list`)
pub fn is_valid_id(id: &str) -> bool {
    get_id_regex().is_match(id)
}

/// An interface entry exactly as written in the catalog file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub urls: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub is_cookie_needed: bool,
    #[serde(default)]
    pub is_rule_static: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_file: Option<String>,
}

impl InterfaceConfig {
    /// Validate and normalize this entry into a `Profile`.
    ///
    /// `global_status` replaces the entry's own status when that status is
    /// neither a key of `urls` nor a mock sentinel. Rule files resolve under
    /// `rulebase`.
    pub fn into_profile(
        self,
        global_status: &str,
        rulebase: &Path,
    ) -> Result<Profile, CatalogError> {
        let invalid = |id: &str, reason: &str| CatalogError::InvalidInterface {
            id: id.to_string(),
            reason: reason.to_string(),
        };

        let id = match self.id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(invalid("", "no id")),
        };

        if !is_valid_id(&id) {
            return Err(invalid(&id, "id is not a dotted name"));
        }

        let urls: HashMap<String, String> = self
            .urls
            .unwrap_or_default()
            .into_iter()
            .map(|(status, url)| (status, url.trim_end_matches('/').to_string()))
            .collect();
        if urls.is_empty() {
            return Err(invalid(&id, "no urls"));
        }

        let rule_file = rulebase.join(
            self.rule_file
                .unwrap_or_else(|| format!("{id}.rule.json")),
        );

        let status = match self.status {
            Some(s) if urls.contains_key(&s) || is_mock_status(&s) => s,
            _ => global_status.to_string(),
        };

        Ok(Profile {
            urls,
            status,
            method: self
                .method
                .map(|m| m.to_uppercase())
                .unwrap_or_else(|| DEFAULT_METHOD.to_string()),
            data_type: self
                .data_type
                .map(|d| d.to_lowercase())
                .unwrap_or_else(|| DATA_TYPE_JSON.to_string()),
            encoding: self.encoding,
            timeout_ms: self
                .timeout
                .filter(|t| *t > 0)
                .unwrap_or(DEFAULT_TIMEOUT_MS),
            is_cookie_needed: self.is_cookie_needed,
            is_rule_static: self.is_rule_static,
            rule_file,
            id,
        })
    }
}

fn is_mock_status(status: &str) -> bool {
    status == STATUS_MOCK || status == STATUS_MOCK_ERR
}

/// Which template of a mock rule a mock-mode profile answers with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMode {
    Response,
    ResponseError,
}

/// Validated runtime form of an interface definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: String,
    pub urls: HashMap<String, String>,
    pub status: String,
    pub method: String,
    pub data_type: String,
    pub encoding: Option<String>,
    pub timeout_ms: u64,
    pub is_cookie_needed: bool,
    pub is_rule_static: bool,
    pub rule_file: PathBuf,
}

impl Profile {
    /// A profile with default settings and no urls
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            rule_file: PathBuf::from(format!("{id}.rule.json")),
            id,
            urls: HashMap::new(),
            status: STATUS_MOCK.to_string(),
            method: DEFAULT_METHOD.to_string(),
            data_type: DATA_TYPE_JSON.to_string(),
            encoding: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            is_cookie_needed: false,
            is_rule_static: false,
        }
    }

    pub fn mock_mode(&self) -> Option<MockMode> {
        match self.status.as_str() {
            STATUS_MOCK => Some(MockMode::Response),
            STATUS_MOCK_ERR => Some(MockMode::ResponseError),
            _ => None,
        }
    }

    /// URL for the active status, if one is configured
    pub fn active_url(&self) -> Option<&str> {
        self.urls.get(&self.status).map(String::as_str)
    }

    pub fn expects_json(&self) -> bool {
        self.data_type == DATA_TYPE_JSON
    }

    pub fn is_raw(&self) -> bool {
        self.encoding.as_deref() == Some(ENCODING_RAW)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
