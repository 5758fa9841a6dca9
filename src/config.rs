//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (QUADCORE_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [execution]
//! opt_level = 2
//! soft_limit = 1000000
//! restricted = false
//!
//! [execution.cache]
//! bind_cache_entries = 128
//! resolve_l2_entries = 65536
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! QUADCORE_EXECUTION__OPT_LEVEL=1
//! QUADCORE_EXECUTION__CACHE__BIND_CACHE_ENTRIES=256
//! ```

use figment::{providers::{Env, Format, Toml}, Figment};
use serde::{Deserialize, Serialize};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub execution: ExecConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Execution tunables: the external options of spec.md §6 (`opt_level`,
/// `soft_limit`, `restricted`, `default_graph`) plus the cache sizing
/// spec.md §4.4/§4.9 fix (128-entry bind cache, 65,536-entry resolve L2),
/// exposed so a deployment can tune them without a recompile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// 0 runs patterns in lexical order (no reorder); 1 enables the
    /// per-block selectivity reorder; 2+ additionally enables block-tree
    /// compaction.
    #[serde(default = "default_opt_level")]
    pub opt_level: u8,

    /// Row budget above which a non-restricted query truncates with a
    /// warning instead of erroring.
    #[serde(default = "default_soft_limit")]
    pub soft_limit: usize,

    /// When true, `soft_limit` is a hard cap: exceeding it fails the query
    /// instead of truncating with a warning.
    #[serde(default)]
    pub restricted: bool,

    /// RID substituted for an absent graph term when a pattern omits one.
    #[serde(default)]
    pub default_graph: Option<u64>,

    /// Row count requested from storage per resolve-phase prefetch window.
    #[serde(default = "default_prefetch_rows")]
    pub prefetch_rows: usize,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Cache sizing for the bind cache (§4.4) and the two-tier resolve cache
/// (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_bind_cache_entries")]
    pub bind_cache_entries: usize,

    #[serde(default = "default_resolve_l2_entries")]
    pub resolve_l2_entries: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_opt_level() -> u8 { 2 }
fn default_soft_limit() -> usize { 1_000_000 }
fn default_prefetch_rows() -> usize { 1800 }
fn default_bind_cache_entries() -> usize { 128 }
fn default_resolve_l2_entries() -> usize { 65_536 }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (QUADCORE_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("QUADCORE_").split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("QUADCORE_").split("__"))
            .extract()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config { execution: ExecConfig::default(), logging: LoggingConfig::default() }
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        ExecConfig {
            opt_level: default_opt_level(),
            soft_limit: default_soft_limit(),
            restricted: false,
            default_graph: None,
            prefetch_rows: default_prefetch_rows(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            bind_cache_entries: default_bind_cache_entries(),
            resolve_l2_entries: default_resolve_l2_entries(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.execution.opt_level, 2);
        assert_eq!(config.execution.cache.bind_cache_entries, 128);
        assert_eq!(config.execution.cache.resolve_l2_entries, 65_536);
        assert!(!config.execution.restricted);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[execution]"));
        assert!(toml_str.contains("[execution.cache]"));
    }
}
