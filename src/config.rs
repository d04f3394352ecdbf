//! Ambient configuration for the mutation engine.
//!
//! Provides hierarchical configuration loading from:
//! - hazeltree.toml (default configuration)
//! - hazeltree.local.toml (git-ignored local overrides)
//! - Environment variables (HAZELTREE_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # hazeltree.toml
//! stream_batch_size = 1000
//! max_level = 12
//! protect_readonly_by_default = true
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! HAZELTREE_STREAM_BATCH_SIZE=1000
//! HAZELTREE_MAX_LEVEL=12
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Cross-cutting knobs for [`crate::mutation::MutationEngine`], independent of
/// any single record or table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Rows pulled per cursor page while streaming subtree updates.
    /// An implementation knob with no single correct value, hence
    /// configurable rather than hard-coded.
    #[serde(default = "default_stream_batch_size")]
    pub stream_batch_size: usize,

    /// Optional depth cap consumed by `would_exceed_max_level`.
    #[serde(default)]
    pub max_level: Option<u32>,

    /// Initial state of the read-only guard on tree columns.
    #[serde(default = "default_true")]
    pub protect_readonly_by_default: bool,
}

fn default_stream_batch_size() -> usize {
    500
}

fn default_true() -> bool {
    true
}

impl TreeConfig {
    /// Load configuration from default locations.
    ///
    /// Merges in order:
    /// 1. Built-in defaults
    /// 2. hazeltree.toml (base configuration)
    /// 3. hazeltree.local.toml (local overrides, git-ignored)
    /// 4. Environment variables (HAZELTREE_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(TreeConfig::default()))
            .merge(Toml::file("hazeltree.toml"))
            .merge(Toml::file("hazeltree.local.toml"))
            .merge(Env::prefixed("HAZELTREE_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(TreeConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("HAZELTREE_").split("__"))
            .extract()
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            stream_batch_size: default_stream_batch_size(),
            max_level: None,
            protect_readonly_by_default: true,
        }
    }
}
