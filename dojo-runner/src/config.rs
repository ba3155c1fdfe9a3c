//! Dojo configuration, loadable from TOML.
//!
//! Every field has a default, so a config file only needs the options it
//! changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::criteria::AcceptanceCriteria;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Options for a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DojoConfig {
    /// Passed to `write_report` by each level. A ladder run only trains levels
    /// whose section is missing, so this never replaces data during `Dojo::run`.
    pub overwrite_existing: bool,
    /// Keep training the remaining pseudopotentials after one fails.
    pub continue_on_failure: bool,
    /// Parent of the per-pseudopotential `DOJO_{key}` working directories.
    pub workdir_root: PathBuf,
    /// Pseudopotentials trained concurrently; 1 trains them in order.
    pub threads: usize,
    /// Extra attempts for a challenge that failed to execute.
    pub challenge_retries: u32,
    /// Keep the raw challenge results as `LEVEL_{n}/ppdojo_results.json`.
    pub save_raw_results: bool,

    pub hints: HintsConfig,
    pub delta_factor: DeltaFactorConfig,
}

impl Default for DojoConfig {
    fn default() -> Self {
        Self {
            overwrite_existing: false,
            continue_on_failure: true,
            workdir_root: PathBuf::from("."),
            threads: 1,
            challenge_retries: 0,
            save_raw_results: true,
            hints: HintsConfig::default(),
            delta_factor: DeltaFactorConfig::default(),
        }
    }
}

/// Level 0: cutoff-energy convergence sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HintsConfig {
    /// First cutoff (Ha) of the coarse search.
    pub coarse_start: f64,
    /// Cutoff increment (Ha) of the coarse search; also pads the fine window.
    pub coarse_step: f64,
    /// Cutoff increment (Ha) of the fine sweep.
    pub fine_step: f64,
    /// Lowest cutoff (Ha) the fine sweep may start from.
    pub min_ecut: f64,
}

impl Default for HintsConfig {
    fn default() -> Self {
        Self {
            coarse_start: 5.0,
            coarse_step: 10.0,
            fine_step: 5.0,
            min_ecut: 5.0,
        }
    }
}

/// Level 1: delta-factor equation-of-state validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaFactorConfig {
    /// k-points per reciprocal atom.
    pub kppa: u32,
    /// Bounds on the recorded metrics; empty accepts every complete result.
    pub criteria: AcceptanceCriteria,
}

impl Default for DeltaFactorConfig {
    fn default() -> Self {
        Self {
            kppa: 1,
            criteria: AcceptanceCriteria::default(),
        }
    }
}

impl DojoConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::Invalid("threads must be at least 1".into()));
        }
        let hints = &self.hints;
        if !(hints.coarse_start > 0.0) {
            return Err(ConfigError::Invalid("hints.coarse_start must be positive".into()));
        }
        if !(hints.coarse_step > 0.0) || !(hints.fine_step > 0.0) {
            return Err(ConfigError::Invalid("hints steps must be positive".into()));
        }
        if !(hints.min_ecut >= 0.0) {
            return Err(ConfigError::Invalid("hints.min_ecut must be non-negative".into()));
        }
        if self.delta_factor.kppa == 0 {
            return Err(ConfigError::Invalid("delta_factor.kppa must be positive".into()));
        }
        Ok(())
    }
}
