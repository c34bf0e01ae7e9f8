//! Workbench configuration
//!
//! Every field has a default, so an empty JSON object is a valid config file.
//! Environment variables override file values:
//!
//! - `DATAMINE_AUTOSAVE_SECS` - autosave interval in seconds
//! - `DATAMINE_BACKUP_DIR` - autosave backup directory
//! - `DATAMINE_SEED` - training seed

use crate::{Error, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fixed seed for splits and estimators (reproducible metrics)
pub const DEFAULT_SEED: u64 = 42;

/// Ensemble size for full training
pub const DEFAULT_ESTIMATORS: usize = 100;

/// Ensemble size for quick analysis training
pub const QUICK_ESTIMATORS: usize = 50;

/// Held-out fraction for evaluation
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Autosave period (5 minutes)
pub const DEFAULT_AUTOSAVE_SECS: u64 = 300;

/// Backup directory name under the user's home
pub const BACKUP_DIR_NAME: &str = ".datamine_backup";

/// Training pipeline parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Seed shared by the split and the estimators
    pub seed: u64,
    /// Number of independent estimators averaged by the ensemble
    pub n_estimators: usize,
    /// Fraction of rows held out for evaluation
    pub test_fraction: f64,
    /// Maximum tree depth (`None` grows until leaves are pure)
    pub max_depth: Option<usize>,
    /// Minimum rows in a node before it may be split
    pub min_samples_split: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            n_estimators: DEFAULT_ESTIMATORS,
            test_fraction: DEFAULT_TEST_FRACTION,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

impl TrainingConfig {
    /// Smaller ensemble used by quick dataset analysis.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            n_estimators: QUICK_ESTIMATORS,
            ..Self::default()
        }
    }

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a parameter is out of range
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(Error::Config("n_estimators must be at least 1".to_string()));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(Error::Config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.min_samples_split < 2 {
            return Err(Error::Config(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// Background autosave parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Seconds between ticks
    pub interval_secs: u64,
    /// Backup directory; `None` resolves to `~/.datamine_backup`
    pub backup_dir: Option<PathBuf>,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_AUTOSAVE_SECS,
            backup_dir: None,
        }
    }
}

impl AutosaveConfig {
    /// Tick period.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Resolve the backup directory, falling back to the home directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no directory is configured and the home
    /// directory cannot be determined
    pub fn resolve_backup_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.backup_dir {
            return Ok(dir.clone());
        }
        BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(BACKUP_DIR_NAME))
            .ok_or_else(|| Error::Config("no home directory for autosave backups".to_string()))
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    /// Name written into save manifests
    pub workspace_name: String,
    /// Training parameters
    pub training: TrainingConfig,
    /// Autosave parameters
    pub autosave: AutosaveConfig,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            workspace_name: "DataMine_Workspace".to_string(),
            training: TrainingConfig::default(),
            autosave: AutosaveConfig::default(),
        }
    }
}

impl WorkbenchConfig {
    /// Create a configuration builder
    #[must_use]
    pub fn builder() -> WorkbenchConfigBuilder {
        WorkbenchConfigBuilder::default()
    }

    /// Load from a JSON file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or if the result
    /// fails validation
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "failed to read {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;
        config.with_env_overrides()
    }

    /// Apply `DATAMINE_*` environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on unparsable values or failed validation
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(secs) = lookup("DATAMINE_AUTOSAVE_SECS") {
            self.autosave.interval_secs = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("DATAMINE_AUTOSAVE_SECS: {e}")))?;
        }
        if let Some(dir) = lookup("DATAMINE_BACKUP_DIR") {
            self.autosave.backup_dir = Some(PathBuf::from(dir));
        }
        if let Some(seed) = lookup("DATAMINE_SEED") {
            self.training.seed = seed
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("DATAMINE_SEED: {e}")))?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check every section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when any parameter is out of range
    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        if self.autosave.interval_secs == 0 {
            return Err(Error::Config(
                "autosave interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`WorkbenchConfig`]
#[derive(Debug, Default)]
pub struct WorkbenchConfigBuilder {
    config: WorkbenchConfig,
}

impl WorkbenchConfigBuilder {
    /// Set the workspace name recorded in manifests
    #[must_use]
    pub fn workspace_name(mut self, name: impl Into<String>) -> Self {
        self.config.workspace_name = name.into();
        self
    }

    /// Replace the training parameters
    #[must_use]
    pub fn training(mut self, training: TrainingConfig) -> Self {
        self.config.training = training;
        self
    }

    /// Set the number of estimators
    #[must_use]
    pub const fn n_estimators(mut self, n: usize) -> Self {
        self.config.training.n_estimators = n;
        self
    }

    /// Set the autosave period in seconds
    #[must_use]
    pub const fn autosave_interval_secs(mut self, secs: u64) -> Self {
        self.config.autosave.interval_secs = secs;
        self
    }

    /// Set the autosave backup directory
    #[must_use]
    pub fn backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.autosave.backup_dir = Some(dir.into());
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if validation fails
    pub fn build(self) -> Result<WorkbenchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
