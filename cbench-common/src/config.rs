//! Benchmark run configuration.
//!
//! `BenchConfig` is a `(section, key)` string store shared across the harness.
//! Telemetry devices read their settings from it, and metadata devices write
//! discovered values (source revision, distribution version) back into it for
//! downstream consumers, so it uses interior mutability.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::debug;

/// Error raised by mandatory configuration lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A mandatory lookup found no value.
    #[error("no value for mandatory configuration: section='{section}', key='{key}'")]
    Missing { section: String, key: String },
}

/// Section/key configuration store for one benchmark run.
#[derive(Debug, Default)]
pub struct BenchConfig {
    values: RwLock<BTreeMap<(String, String), String>>,
}

impl BenchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a mandatory setting.
    pub fn opts(&self, section: &str, key: &str) -> Result<String, ConfigError> {
        self.opts_optional(section, key)
            .ok_or_else(|| ConfigError::Missing {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// Look up an optional setting; absent values are `None`, not errors.
    pub fn opts_optional(&self, section: &str, key: &str) -> Option<String> {
        let values = self.values.read().unwrap();
        values.get(&(section.to_string(), key.to_string())).cloned()
    }

    /// Insert or overwrite a setting.
    pub fn add(&self, section: &str, key: &str, value: impl Into<String>) {
        let mut values = self.values.write().unwrap();
        values.insert((section.to_string(), key.to_string()), value.into());
    }

    /// Load a configuration file, flattening `[section] key = value` tables
    /// into the store. Scalar values are rendered verbatim; arrays are joined
    /// with commas.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let doc: toml::Table = content
            .parse()
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        let config = Self::new();
        for (section, entry) in &doc {
            let toml::Value::Table(table) = entry else {
                debug!("Ignoring top-level config value outside a section: {}", section);
                continue;
            };
            for (key, value) in table {
                config.add(section, key, render_value(value));
            }
        }
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Default config file location (`~/.config/cbench/cbench.toml` on Linux).
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "cbench", "cbench")
            .map(|dirs| dirs.config_dir().join("cbench.toml"))
    }
}

fn render_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}
