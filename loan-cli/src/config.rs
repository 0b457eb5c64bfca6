//! TOML configuration file for the command-line calculator.
//!
//! ```toml
//! [storage]
//! backend  = "sqlite"          # memory | file | sqlite
//! location = "loans.db"
//!
//! [display]
//! decimals = 2
//!
//! [logging]
//! level = "info"
//! file  = "loan-calculator.log"
//! ```
//!
//! Every key is optional. Command-line flags take precedence over the file.

use std::io;
use std::path::{Path, PathBuf};

use loan_core::storage::StorageConfig;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_BACKEND: &str = "file";
pub const DEFAULT_LOCATION: &str = ".loan-calculator";
pub const DEFAULT_DECIMALS: u32 = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub storage: StorageSection,
    pub display: DisplaySection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub backend: String,
    pub location: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            location: DEFAULT_LOCATION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplaySection {
    pub decimals: u32,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            decimals: DEFAULT_DECIMALS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

impl CliConfig {
    /// Reads the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            backend: self.storage.backend.clone(),
            location: self.storage.location.clone(),
        }
    }
}
