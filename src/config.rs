//! Decoder configuration
//!
//! This module handles loading, parsing, and validating decoder
//! configuration from files and environment variables.

use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cm::dispatch::DEFAULT_MAX_RECURSION_DEPTH;

/// Configuration of one decode session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum nesting of embedded messages (Unconnected Send,
    /// Multiple Service Packet) before decoding fails closed
    #[serde(default = "default_max_recursion_depth")]
    pub max_recursion_depth: usize,

    /// Reject unknown Safety Network Segment formats instead of keeping
    /// their bytes as opaque data
    #[serde(default)]
    pub strict_safety_format: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_recursion_depth() -> usize {
    DEFAULT_MAX_RECURSION_DEPTH
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            max_recursion_depth: default_max_recursion_depth(),
            strict_safety_format: false,
        }
    }
}

impl DecoderConfig {
    /// Load configuration from a file, with `CIP_DISSECT`-prefixed
    /// environment variables taking precedence
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let builder = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()))
            .add_source(::config::Environment::with_prefix("CIP_DISSECT").separator("__"));

        let settings = builder.build()
            .context("Failed to build configuration")?;

        let config: DecoderConfig = settings.try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        info!("Configuration loaded and validated successfully");
        Ok(config)
    }

    /// Load configuration from the default locations, falling back to
    /// defaults when no file exists
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("CIP_DISSECT_CONFIG") {
            return Self::from_file(path);
        }

        let config_paths = ["cip-dissect.yaml", "cip-dissect.json"];
        for path in &config_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        info!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_recursion_depth == 0 {
            return Err(anyhow!("max_recursion_depth must be at least 1"));
        }
        if self.max_recursion_depth > 64 {
            return Err(anyhow!(
                "max_recursion_depth {} is unreasonably deep (limit 64)",
                self.max_recursion_depth
            ));
        }
        Ok(())
    }

    /// Get log level from configuration
    pub fn get_log_level(&self) -> log::LevelFilter {
        match self.log_level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info, // Default
        }
    }
}
