//! Configuration management
//!
//! Handles loading and validating engine configuration from TOML files.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub exporter: ExporterConfig,
}

/// Slot layout configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Number of static slots (0 = auto)
    #[serde(default)]
    pub static_slots: usize,
    /// Number of dynamic slots
    #[serde(default)]
    pub dynamic_slots: usize,
    /// Carry static slot values into the retired total on unbind
    #[serde(default)]
    pub fold_static_on_unbind: bool,
}

impl EngineConfig {
    /// Get effective static slot count (one per CPU if 0)
    pub fn effective_static_slots(&self) -> usize {
        if self.static_slots == 0 {
            num_cpus::get()
        } else {
            self.static_slots
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            static_slots: 0,
            dynamic_slots: 0,
            fold_static_on_unbind: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "json", "compact" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Prometheus exporter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// Enable the exporter
    #[serde(default)]
    pub enabled: bool,
    /// Scrape endpoint bind address
    #[serde(default = "default_exporter_addr")]
    pub bind_addr: SocketAddr,
    /// Subtree to publish ("" = everything)
    #[serde(default)]
    pub subtree: String,
    /// Seconds between publishes
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Prefix for exported metric names
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: default_exporter_addr(),
            subtree: String::new(),
            interval_secs: default_interval(),
            prefix: default_prefix(),
        }
    }
}

// Default value functions
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }
fn default_exporter_addr() -> SocketAddr { SocketAddr::from(([127, 0, 0, 1], 9090)) }
fn default_interval() -> u64 { 1 }
fn default_prefix() -> String { "counters".to_string() }

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .with_context(|| "Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.exporter.enabled && self.exporter.interval_secs == 0 {
            anyhow::bail!("exporter.interval_secs must be > 0");
        }
        if self.exporter.prefix.is_empty() {
            anyhow::bail!("exporter.prefix must not be empty");
        }
        if !matches!(self.logging.format.as_str(), "json" | "compact" | "pretty") {
            anyhow::bail!("logging.format must be one of json, compact, pretty");
        }
        Ok(())
    }
}
