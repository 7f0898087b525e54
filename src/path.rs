// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, e.g., the alias file, the settings file, custom tool
//! files supplied by the user, etc.

use std::path::{Path, PathBuf};

/// File name of alias file placed in user's home directory.
pub const ALIAS_FILE_NAME: &str = ".hkd_alias";

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`PathError::NoWayHome`] if home directory path cannot be
///   determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(PathError::NoWayHome)
}

/// Determine default absolute path to alias file.
///
/// Uses `$HOME/.hkd_alias`. Does not check if the path returned actually
/// exists.
///
/// # Errors
///
/// - Return [`PathError::NoWayHome`] if home directory path cannot be
///   determined.
pub fn default_alias_file() -> Result<PathBuf> {
    home_dir().map(|path| path.join(ALIAS_FILE_NAME))
}

/// Determine default absolute path to settings file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/house-keeper/config.toml`.
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`PathError::NoWayHome`] if configuration directory cannot be
///   determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_settings_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("house-keeper").join("config.toml"))
        .ok_or(PathError::NoWayHome)
}

/// Perform shell expansion on user supplied path.
///
/// Expands leading tilde and environment variables, e.g., `~/secret` or
/// `$HOME/secret`.
///
/// # Errors
///
/// - Return [`PathError::ShellExpansion`] if variable lookup fails.
pub fn expand(path: impl AsRef<str>) -> Result<PathBuf> {
    Ok(PathBuf::from(shellexpand::full(path.as_ref())?.into_owned()))
}

/// Validate working directory.
///
/// An empty path means the current directory.
///
/// # Errors
///
/// - Return [`PathError::WorkingDirMissing`] if path does not exist.
/// - Return [`PathError::WorkingDirNotDir`] if path is not a directory.
/// - Return [`PathError::CurrentDir`] if current directory is unknown.
pub fn working_dir(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
        _ => std::env::current_dir().map_err(PathError::CurrentDir)?,
    };

    if !path.exists() {
        return Err(PathError::WorkingDirMissing(path));
    }

    if !path.is_dir() {
        return Err(PathError::WorkingDirNotDir(path));
    }

    Ok(path)
}

/// Resolve symlink one level deep.
///
/// Relative link targets are resolved against the link's parent directory.
/// Paths that are not symlinks are returned as-is.
pub fn resolve_symlink(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    match std::fs::read_link(path) {
        Ok(target) if target.is_absolute() => target,
        Ok(target) => path
            .parent()
            .map(|parent| parent.join(&target))
            .unwrap_or(target),
        Err(_) => path.to_path_buf(),
    }
}

/// Path resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// No way to determine user's home directory.
    #[error("cannot determine absolute path to user's home directory")]
    NoWayHome,

    /// Shell expansion on path failed.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Current directory cannot be determined.
    #[error("failed to get current directory")]
    CurrentDir(#[source] std::io::Error),

    /// Working directory does not exist.
    #[error("specified working directory does not exist: {}", .0.display())]
    WorkingDirMissing(PathBuf),

    /// Working directory is not a directory.
    #[error("specified working directory is not a directory: {}", .0.display())]
    WorkingDirNotDir(PathBuf),
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("HKD_SECRET_DIR", "/srv/secrets")])]
    fn expand_environment_variables() -> anyhow::Result<()> {
        let result = expand("$HKD_SECRET_DIR/pg.pass")?;
        assert_eq!(result, PathBuf::from("/srv/secrets/pg.pass"));
        Ok(())
    }

    #[test]
    fn working_dir_must_be_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("file");
        std::fs::write(&file, "data")?;

        assert_eq!(working_dir(Some(dir.path()))?, dir.path());
        assert!(matches!(
            working_dir(Some(&file)),
            Err(PathError::WorkingDirNotDir(_))
        ));
        assert!(matches!(
            working_dir(Some(&dir.path().join("missing"))),
            Err(PathError::WorkingDirMissing(_))
        ));

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn resolve_relative_symlink() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir(dir.path().join("real"))?;
        std::os::unix::fs::symlink("real", dir.path().join("link"))?;

        assert_eq!(resolve_symlink(dir.path().join("link")), dir.path().join("real"));
        assert_eq!(resolve_symlink(dir.path().join("real")), dir.path().join("real"));

        Ok(())
    }
}
