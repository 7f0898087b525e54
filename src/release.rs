// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Build information and self update.

use crate::launch::Launch;

use regex_lite::Regex;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Name of crate to install on update.
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

/// Information about current build.
///
/// Commit hash and build date are taken from `HKD_COMMIT_HASH` and
/// `HKD_BUILD_DATE` at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub commit: &'static str,
    pub build_date: &'static str,
}

impl BuildInfo {
    /// Information about the running binary.
    pub fn current() -> Self {
        Self {
            name: CRATE_NAME,
            version: env!("CARGO_PKG_VERSION"),
            commit: option_env!("HKD_COMMIT_HASH").unwrap_or("unknown"),
            build_date: option_env!("HKD_BUILD_DATE").unwrap_or("unknown"),
        }
    }
}

impl Display for BuildInfo {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        writeln!(fmt, "{}", self.name)?;
        writeln!(fmt, "Commit: {}", self.commit)?;
        writeln!(fmt, "Version: {}", self.version)?;
        write!(fmt, "Build Date: {}", self.build_date)
    }
}

/// Build launch that installs target version of house-keeper.
///
/// No version means the latest release.
///
/// # Errors
///
/// - Return [`ReleaseError::MalformedVersion`] if version is not of the form
///   `[v]MAJOR.MINOR.PATCH`.
pub fn update_launch(version: Option<&str>) -> Result<Launch> {
    let launch = Launch::new("cargo").args(["install", "--locked", CRATE_NAME]);
    let Some(version) = version.map(str::trim) else {
        return Ok(launch);
    };

    // INVARIANT: Version regex is a valid literal.
    let pattern = Regex::new(r"^v?\d+\.\d+\.\d+$").map_err(|_| {
        ReleaseError::MalformedVersion(version.to_string())
    })?;
    if !pattern.is_match(version) {
        return Err(ReleaseError::MalformedVersion(version.to_string()));
    }

    Ok(launch.args(["--version", version.trim_start_matches('v')]))
}

/// Release error types.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    /// Version does not look like a release version.
    #[error("version format of {0} is malformed")]
    MalformedVersion(String),
}

/// Friendly result alias :3
pub type Result<T, E = ReleaseError> = std::result::Result<T, E>;
