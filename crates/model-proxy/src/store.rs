//! Profile storage.
//!
//! `ProfileStore` is the read-only lookup the proxy engine depends on.
//! `InterfaceCatalog` is the file-backed implementation: it normalizes a
//! `CatalogConfig` once and reads mock rule documents on demand.

use crate::config::{CatalogConfig, Profile};
use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Pair of templates used to synthesize answers in mock mode
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockRule {
    #[serde(default)]
    pub response: Value,
    #[serde(default)]
    pub response_error: Value,
}

/// Read-only lookup of interface profiles and their mock rules.
pub trait ProfileStore: Send + Sync {
    /// Profile for `id`, if one is configured
    fn profile(&self, id: &str) -> Option<Arc<Profile>>;

    /// Load the mock rule document for `id`
    fn rule(&self, id: &str) -> Result<MockRule, CatalogError>;

    /// Ids starting with `prefix`, in the store's iteration order
    fn ids_with_prefix(&self, prefix: &str) -> Vec<String>;
}

/// Interface catalog loaded from a `CatalogConfig`.
pub struct InterfaceCatalog {
    profiles: Vec<Arc<Profile>>,
    index: HashMap<String, usize>,
    config: CatalogConfig,
}

impl InterfaceCatalog {
    /// Load and normalize a catalog file. Relative rule paths resolve
    /// against the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let config = CatalogConfig::from_file(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_config(config, base_dir)
    }

    /// Normalize an in-memory catalog. Invalid interfaces are skipped with a
    /// warning. When an id is defined twice the later definition wins and
    /// keeps the position of the first.
    pub fn from_config(config: CatalogConfig, base_dir: &Path) -> Result<Self, CatalogError> {
        config.validate()?;
        let global_status = config.status.clone().unwrap_or_default();
        let rulebase = config.resolve_rulebase(base_dir);

        let mut profiles = Vec::with_capacity(config.interfaces.len());
        let mut index = HashMap::new();

        for entry in config.interfaces.iter().cloned() {
            match entry.into_profile(&global_status, &rulebase) {
                Ok(profile) => {
                    info!("Interface [{}] loaded (status: {})", profile.id, profile.status);
                    if let Some(&idx) = index.get(&profile.id) {
                        warn!("Interface [{}] is defined more than once, replacing", profile.id);
                        profiles[idx] = Arc::new(profile);
                        continue;
                    }
                    index.insert(profile.id.clone(), profiles.len());
                    profiles.push(Arc::new(profile));
                }
                Err(e) => warn!("{}, skipping", e),
            }
        }

        Ok(Self {
            profiles,
            index,
            config,
        })
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl ProfileStore for InterfaceCatalog {
    fn profile(&self, id: &str) -> Option<Arc<Profile>> {
        self.index.get(id).map(|&i| Arc::clone(&self.profiles[i]))
    }

    fn rule(&self, id: &str) -> Result<MockRule, CatalogError> {
        let profile = self
            .profile(id)
            .ok_or_else(|| CatalogError::UnknownInterface(id.to_string()))?;
        let path = &profile.rule_file;

        if !path.exists() {
            return Err(CatalogError::RuleNotFound {
                id: id.to_string(),
                path: path.clone(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::RuleRead {
            id: id.to_string(),
            path: path.clone(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|e| CatalogError::RuleParse {
            id: id.to_string(),
            path: path.clone(),
            message: e.to_string(),
        })
    }

    fn ids_with_prefix(&self, prefix: &str) -> Vec<String> {
        if prefix.is_empty() {
            return Vec::new();
        }
        self.profiles
            .iter()
            .filter(|p| p.id.starts_with(prefix))
            .map(|p| p.id.clone())
            .collect()
    }
}
