// src/config.rs

//! Configuration for the chunk-parsing pipeline.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::{PipelineError, Result};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // Number of parallel decode workers.
    pub workers: usize,
    // Capacity of the shuffle buffer, in records.
    pub shuffle_size: usize,
    // Downsampling denominator: keep one record in `sample` on average.
    // 1 disables downsampling.
    pub sample: u32,
    // Records per emitted training batch.
    pub batch_size: usize,
    // Bounded capacity of each worker's record channel.
    pub channel_capacity: usize,
    /// Seed for downsampling and shuffle-slot selection. `None` draws a
    /// seed from the OS, trading reproducibility for variety.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            shuffle_size: 1 << 16,
            sample: 1,
            batch_size: 256,
            channel_capacity: 64,
            seed: None,
        }
    }
}

/// Leave two cores for the training process itself.
fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(2).max(1))
        .unwrap_or(1)
}

impl FromStr for PipelineConfig {
    type Err = PipelineError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| PipelineError::config_with_source("failed to parse TOML config", e))
    }
}

impl PipelineConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::source_with_io(path, "failed to read config file", e))?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Variables are prefixed with `CHP_`:
    // - `CHP_WORKERS` overrides `workers`
    // - `CHP_SHUFFLE_SIZE` overrides `shuffle_size`
    // - `CHP_SAMPLE` overrides `sample`
    // - `CHP_BATCH_SIZE` overrides `batch_size`
    // - `CHP_CHANNEL_CAPACITY` overrides `channel_capacity`
    // - `CHP_SEED` overrides `seed`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("CHP_WORKERS") {
            if let Ok(v) = val.parse() {
                self.workers = v;
            }
        }
        if let Ok(val) = std::env::var("CHP_SHUFFLE_SIZE") {
            if let Ok(v) = val.parse() {
                self.shuffle_size = v;
            }
        }
        if let Ok(val) = std::env::var("CHP_SAMPLE") {
            if let Ok(v) = val.parse() {
                self.sample = v;
            }
        }
        if let Ok(val) = std::env::var("CHP_BATCH_SIZE") {
            if let Ok(v) = val.parse() {
                self.batch_size = v;
            }
        }
        if let Ok(val) = std::env::var("CHP_CHANNEL_CAPACITY") {
            if let Ok(v) = val.parse() {
                self.channel_capacity = v;
            }
        }
        if let Ok(val) = std::env::var("CHP_SEED") {
            if let Ok(v) = val.parse() {
                self.seed = Some(v);
            }
        }
        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(PipelineError::config("workers must be greater than 0"));
        }
        if self.shuffle_size == 0 {
            return Err(PipelineError::config("shuffle_size must be greater than 0"));
        }
        if self.sample == 0 {
            return Err(PipelineError::config(
                "sample must be greater than 0 (1 disables downsampling)",
            ));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::config("batch_size must be greater than 0"));
        }
        if self.channel_capacity == 0 {
            return Err(PipelineError::config(
                "channel_capacity must be greater than 0",
            ));
        }
        Ok(())
    }
}
