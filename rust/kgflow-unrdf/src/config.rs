//! Engine configuration, loadable from the environment

use crate::error::UnrdfResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the engine and hook executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_cache_size")]
    pub query_cache_size: usize,
    #[serde(default = "default_cache_ttl")]
    pub query_cache_ttl_seconds: u64,
    #[serde(default = "default_condition_timeout")]
    pub condition_timeout_ms: u64,
    /// Sled path for the persistent hook registry
    #[serde(default)]
    pub registry_path: Option<String>,
    /// Directory for cold-tier snapshots
    #[serde(default)]
    pub cold_storage_path: Option<String>,
}

fn default_cache_size() -> usize {
    1000
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_condition_timeout() -> u64 {
    5000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            query_cache_size: default_cache_size(),
            query_cache_ttl_seconds: default_cache_ttl(),
            condition_timeout_ms: default_condition_timeout(),
            registry_path: None,
            cold_storage_path: None,
        }
    }
}

impl EngineConfig {
    /// Load from `KGFLOW_`-prefixed environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> UnrdfResult<Self> {
        let cfg = ::config::Config::builder()
            .add_source(::config::Environment::with_prefix("KGFLOW"))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    pub fn condition_timeout(&self) -> Duration {
        Duration::from_millis(self.condition_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.query_cache_size, 1000);
        assert_eq!(cfg.condition_timeout(), Duration::from_secs(5));
        assert!(cfg.registry_path.is_none());
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"condition_timeout_ms": 250}"#).unwrap();
        assert_eq!(cfg.condition_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.query_cache_size, 1000);
    }
}
