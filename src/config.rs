// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use std::{
    fs, io,
    path::{Path, PathBuf},
};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use super::{
    capture::{CaptureCommand, DEFAULT_BATCH_SIZE},
    store::{DEFAULT_RECORD_CAPACITY, DEFAULT_SNAPSHOT_CAPACITY},
};

const SEARCH_PATH: [&str; 2] = ["config.toml", "/etc/pxmonitor/config.toml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub program: String,
    pub interface: String,
    /// replaces the tshark arguments, the interface is ignored then
    pub args: Option<Vec<String>>,
    pub batch_size: usize,
    pub autostart: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            program: "tshark".to_string(),
            interface: "eth0".to_string(),
            args: None,
            batch_size: DEFAULT_BATCH_SIZE,
            autostart: false,
        }
    }
}

impl CaptureConfig {
    pub fn command(&self) -> CaptureCommand {
        match &self.args {
            Some(args) => CaptureCommand::new(self.program.clone(), args.clone()),
            None => CaptureCommand::tshark(self.program.clone(), self.interface.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub records: usize,
    pub snapshots: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig {
            records: DEFAULT_RECORD_CAPACITY,
            snapshots: DEFAULT_SNAPSHOT_CAPACITY,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig { port: 3001 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub directory: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            directory: PathBuf::from("."),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub retention: RetentionConfig,
    pub http: HttpConfig,
    pub export: ExportConfig,
}

impl Config {
    pub fn from_toml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let config = toml::from_str::<Config>(text).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(path, &text)
    }

    /// The explicit path must exist, otherwise the first file found in the
    /// search path is used, or the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        for path in SEARCH_PATH.iter().map(Path::new) {
            if path.is_file() {
                tracing::info!(path = tracing::field::display(path.display()), "loading config");
                return Self::from_file(path);
            }
        }
        tracing::info!("no config file found, using defaults");
        Ok(Config::default())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.batch_size == 0 {
            return Err(ConfigError::Invalid("capture.batch_size must be positive".to_string()));
        }
        if self.capture.program.trim().is_empty() {
            return Err(ConfigError::Invalid("capture.program must not be empty".to_string()));
        }
        Ok(())
    }
}
