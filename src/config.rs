// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! House-keeper works without any configuration at all. However, a settings
//! file can be placed at `$XDG_CONFIG_HOME/house-keeper/config.toml` to change
//! the defaults that commands use when a flag is not given on the command
//! line. Flags always win over settings, and settings always win over the
//! built-in defaults.
//!
//! # General Layout
//!
//! ```toml
//! alias_file = "~/.hkd_alias"
//!
//! [rsync]
//! options = ["--human-readable", "--compress", "--progress", "--stats"]
//!
//! [db]
//! host = "localhost"
//! port = 5432
//! dbname = "postgres"
//! username = "postgres"
//!
//! [checksum]
//! tool = "/usr/bin/sha1sum"
//! ```

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument};

/// Default options handed to rsync.
pub const DEFAULT_RSYNC_OPTIONS: [&str; 4] =
    ["--human-readable", "--compress", "--progress", "--stats"];

/// Settings layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Path to alias file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_file: Option<PathBuf>,

    /// Settings for rsync transfers.
    pub rsync: RsyncSettings,

    /// Settings for database commands.
    pub db: DbSettings,

    /// Settings for checksum command.
    pub checksum: ChecksumSettings,
}

impl Settings {
    /// Load settings from target file.
    ///
    /// Missing file means default settings.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file content is invalid.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            debug!("no settings file at {:?}, using defaults", path.display());
            return Ok(Self::default());
        }

        debug!("load settings from {:?}", path.display());
        read_to_string(path)
            .map_err(|err| ConfigError::Read {
                source: err,
                path: path.to_path_buf(),
            })?
            .parse()
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on path fields.
        settings.alias_file = settings.alias_file.as_deref().map(expand_path).transpose()?;
        settings.checksum.tool = settings
            .checksum
            .tool
            .as_deref()
            .map(expand_path)
            .transpose()?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Rsync settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RsyncSettings {
    /// Options passed to rsync when none are given on the command line.
    pub options: Vec<String>,
}

impl Default for RsyncSettings {
    fn default() -> Self {
        Self {
            options: DEFAULT_RSYNC_OPTIONS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Database connection settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DbSettings {
    /// Database host.
    pub host: String,

    /// Database port.
    pub port: u16,

    /// Database name.
    pub dbname: String,

    /// Database user name.
    pub username: String,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            dbname: "postgres".into(),
            username: "postgres".into(),
        }
    }
}

/// Checksum settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChecksumSettings {
    /// Checksum tool to use instead of detecting one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<PathBuf>,
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read settings file.
    #[error("failed to read settings file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
