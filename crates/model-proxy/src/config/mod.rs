//! Configuration types for the interface catalog.

mod interface;
mod pool;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

pub use interface::{
    is_valid_id, InterfaceConfig, MockMode, Profile, DATA_TYPE_JSON, DEFAULT_METHOD,
    DEFAULT_TIMEOUT_MS, ENCODING_RAW, STATUS_MOCK, STATUS_MOCK_ERR,
};
pub use pool::ConnectionPoolConfig;

/// Directory name used for rule files when the catalog does not set one.
pub const DEFAULT_RULEBASE: &str = "interfaceRules";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogConfig {
    /// Status applied to every interface that does not pick a valid one itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Directory holding mock rule documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rulebase: Option<String>,

    #[serde(default)]
    pub connection_pool: ConnectionPoolConfig,

    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
}

impl CatalogConfig {
    /// Read a catalog file. `.yaml`/`.yml` files are parsed as YAML,
    /// anything else as JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let config: CatalogConfig = if is_yaml {
            serde_yaml::from_str(&contents).map_err(|e| CatalogError::Parse(e.to_string()))?
        } else {
            serde_json::from_str(&contents).map_err(|e| CatalogError::Parse(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate catalog-wide settings. Individual interfaces are checked
    /// when the catalog is loaded.
    pub fn validate(&self) -> Result<(), CatalogError> {
        match self.status.as_deref() {
            Some(s) if !s.is_empty() => Ok(()),
            _ => Err(CatalogError::MissingStatus),
        }
    }

    /// Resolve the rule directory. A relative `rulebase` is taken relative
    /// to `base_dir` (the catalog file's directory when loaded from disk).
    pub fn resolve_rulebase(&self, base_dir: &Path) -> PathBuf {
        match self.rulebase.as_deref() {
            Some(rulebase) if !rulebase.is_empty() => {
                let trimmed = rulebase.trim_end_matches('/');
                let rulebase = Path::new(if trimmed.is_empty() { "/" } else { trimmed });
                if rulebase.is_absolute() {
                    rulebase.to_path_buf()
                } else {
                    base_dir.join(rulebase)
                }
            }
            _ => base_dir.join(DEFAULT_RULEBASE),
        }
    }
}
