//! Layered run configuration.
//!
//! Settings are merged from, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. The user config file (`config.toml` in the platform config directory)
//! 3. A file passed with `--config`
//! 4. `LINKDUPE_*` environment variables (e.g. `LINKDUPE_MIN_SIZE=1MiB`)
//! 5. Command-line flags
//!
//! ```toml
//! min_size = "64KiB"
//! batch_size = 128
//! chunk_size = 65536
//! strategy = "atomic"
//! dry_run = false
//! extension = ".iso"
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Deserializer, Serialize};

use crate::actions::{LinkConfig, LinkStrategy};
use crate::cli::{parse_size, Cli};
use crate::driver::DriverConfig;
use crate::duplicates::partition::{
    PartitionConfig, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE,
};
use crate::scanner::{WalkerConfig, DEFAULT_MIN_SIZE};

/// Prefix of the environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "LINKDUPE_";

/// Errors raised while assembling the configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A file passed with `--config` does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// A source could not be parsed or held a bad value.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    /// The configuration could not be written as TOML.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Effective settings of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Files smaller than this many bytes are ignored
    #[serde(deserialize_with = "deserialize_size")]
    pub min_size: u64,
    /// Candidates compared against one pivot at a time
    pub batch_size: usize,
    /// Bytes read per file per comparison step
    #[serde(deserialize_with = "deserialize_size")]
    pub chunk_size: u64,
    /// How duplicates are replaced
    pub strategy: LinkStrategy,
    /// Report without changing anything
    pub dry_run: bool,
    /// Only consider files with this extension
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE as u64,
            strategy: LinkStrategy::default(),
            dry_run: false,
            extension: None,
        }
    }
}

/// Sizes may be written as plain integers or as strings like `"16KiB"`.
fn deserialize_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSize {
        Bytes(u64),
        Text(String),
    }

    match RawSize::deserialize(deserializer)? {
        RawSize::Bytes(n) => Ok(n),
        RawSize::Text(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

impl Config {
    /// Path of the per-user config file, if the platform has a config directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "linkdupe").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Defaults merged with the given TOML files, without environment variables.
    ///
    /// A missing `user_file` is ignored; a missing `explicit` file is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `explicit` does not exist.
    pub fn figment(user_file: Option<&Path>, explicit: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = user_file {
            log::trace!("Reading user config {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            log::debug!("Reading config {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        Ok(figment)
    }

    /// Load every layer except the command line.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `explicit` is missing or any source holds an
    /// invalid value.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let user_file = Self::default_path();
        Self::figment(user_file.as_deref(), explicit)?
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| ConfigError::Invalid(Box::new(e)))
    }

    /// Overlay the options given on the command line.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(min_size) = cli.min_size {
            self.min_size = min_size;
        }
        if let Some(batch_size) = cli.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(chunk_size) = cli.chunk_size {
            self.chunk_size = chunk_size;
        }
        if let Some(strategy) = cli.strategy {
            self.strategy = strategy;
        }
        if cli.dry_run {
            self.dry_run = true;
        }
        if cli.extension.is_some() {
            self.extension.clone_from(&cli.extension);
        }
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Settings for the [`Driver`](crate::driver::Driver). Out-of-range
    /// values are clamped.
    #[must_use]
    pub fn driver_config(&self) -> DriverConfig {
        let chunk_size = usize::try_from(self.chunk_size).unwrap_or(MAX_CHUNK_SIZE);
        DriverConfig {
            walker: WalkerConfig::new(self.min_size, self.extension.clone()),
            partition: PartitionConfig::new(self.batch_size, chunk_size),
            link: LinkConfig::default()
                .with_strategy(self.strategy)
                .with_dry_run(self.dry_run),
        }
    }
}
