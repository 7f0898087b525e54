// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Password handling.
//!
//! Tools like pg_dump and rsync need passwords to reach remote services.
//! House-keeper never takes passwords as plain command line arguments, since
//! those leak into shell history and process listings. Instead passwords are
//! read from a __password file__, or taken from well-known environment
//! variables, and then handed to the tool through its environment.
//!
//! # Password Files
//!
//! A password file must only be accessible by its owner, and the owner must
//! be able to read it, e.g., 0400, 0600, or 0700. Any permission granted to
//! group or other means the password file is rejected.

use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Environment variable read by PostgreSQL tools.
pub const ENV_PG_PASSWORD: &str = "PGPASSWORD";

/// Environment variable read by rsync daemon authentication.
pub const ENV_RSYNC_PASSWORD: &str = "RSYNC_PASSWORD";

/// Environment variable read by `sshpass -e`.
pub const ENV_SSHPASS: &str = "SSHPASS";

/// Validate permission bits of password file.
///
/// # Errors
///
/// - Return [`SecretError::GroupOrOtherAccess`] if group or other have any
///   permission.
/// - Return [`SecretError::NoReadPermission`] if owner cannot read.
pub fn validate_password_file_mode(mode: u32) -> Result<()> {
    let mode = mode & 0o777;
    if mode & 0o077 != 0 {
        return Err(SecretError::GroupOrOtherAccess(mode));
    }

    if mode & 0o400 == 0 {
        return Err(SecretError::NoReadPermission(mode));
    }

    Ok(())
}

/// Read password from password file.
///
/// Password is trimmed of surrounding whitespace.
///
/// # Errors
///
/// - Return [`SecretError::PasswordFileMissing`] if file does not exist.
/// - Return [`SecretError::ReadPasswordFile`] if file cannot be read.
/// - Return [`SecretError::GroupOrOtherAccess`] or
///   [`SecretError::NoReadPermission`] if file permissions are wrong.
/// - Return [`SecretError::EmptyPasswordFile`] if file has no password.
#[instrument(skip(path), level = "debug")]
pub fn read_password_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    debug!("read password file {:?}", path.display());

    if !path.exists() {
        return Err(SecretError::PasswordFileMissing(path.to_path_buf()));
    }

    let metadata = fs::metadata(path).map_err(|err| SecretError::ReadPasswordFile {
        source: err,
        path: path.to_path_buf(),
    })?;
    validate_password_file_mode(file_mode(&metadata))?;

    let content = fs::read_to_string(path).map_err(|err| SecretError::ReadPasswordFile {
        source: err,
        path: path.to_path_buf(),
    })?;

    let password = content.trim();
    if password.is_empty() {
        return Err(SecretError::EmptyPasswordFile(path.to_path_buf()));
    }

    Ok(password.to_string())
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o400
    } else {
        0o600
    }
}

/// Environment variable that supplied a remote password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordSource {
    /// Both variables were set to the same value.
    Both,

    /// Only `RSYNC_PASSWORD` was set.
    Rsync,

    /// Only `SSHPASS` was set.
    Sshpass,
}

/// Password for remote server taken from environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePassword {
    /// The password itself.
    pub value: String,

    /// Where the password came from.
    pub source: PasswordSource,
}

/// Pick remote password from `RSYNC_PASSWORD` and `SSHPASS` values.
///
/// Values are trimmed, and blank values count as unset.
///
/// # Errors
///
/// - Return [`SecretError::PasswordMismatch`] if both are set but differ.
/// - Return [`SecretError::MissingRemotePassword`] if neither is set.
pub fn negotiate_remote_password(
    rsync_password: Option<&str>,
    sshpass: Option<&str>,
) -> Result<RemotePassword> {
    let rsync_password = rsync_password.map(str::trim).filter(|pw| !pw.is_empty());
    let sshpass = sshpass.map(str::trim).filter(|pw| !pw.is_empty());

    match (rsync_password, sshpass) {
        (Some(rsync_password), Some(sshpass)) if rsync_password != sshpass => {
            Err(SecretError::PasswordMismatch)
        }
        (Some(password), Some(_)) => Ok(RemotePassword {
            value: password.to_string(),
            source: PasswordSource::Both,
        }),
        (Some(password), None) => Ok(RemotePassword {
            value: password.to_string(),
            source: PasswordSource::Rsync,
        }),
        (None, Some(password)) => Ok(RemotePassword {
            value: password.to_string(),
            source: PasswordSource::Sshpass,
        }),
        (None, None) => Err(SecretError::MissingRemotePassword),
    }
}

/// Read non-blank environment variable.
pub fn env_password(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Password handling error types.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// Group or other has access to password file.
    #[error("not allowed to have permission for group/other on password file (mode {0:o})")]
    GroupOrOtherAccess(u32),

    /// Owner cannot read password file.
    #[error("password file requires read permission (mode {0:o})")]
    NoReadPermission(u32),

    /// Password file does not exist.
    #[error("supplied password file does not exist: {}", .0.display())]
    PasswordFileMissing(PathBuf),

    /// Password file cannot be read.
    #[error("failed to read password file {:?}", path.display())]
    ReadPasswordFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Password file is blank.
    #[error("password file is empty: {}", .0.display())]
    EmptyPasswordFile(PathBuf),

    /// Both password variables are set with different values.
    #[error(
        "both environment variables RSYNC_PASSWORD and SSHPASS are set but mis-match, \
         consider remove one to take the rest"
    )]
    PasswordMismatch,

    /// No password for remote server.
    #[error(
        "missing password for remote server, either environment variable RSYNC_PASSWORD \
         or SSHPASS or flag --password-file is required"
    )]
    MissingRemotePassword,
}

/// Friendly result alias :3
pub type Result<T, E = SecretError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;

    #[test_case(0o200, false; "write only")]
    #[test_case(0o220, false; "group write")]
    #[test_case(0o222, false; "all write")]
    #[test_case(0o202, false; "other write")]
    #[test_case(0o400, true; "owner read")]
    #[test_case(0o440, false; "group read")]
    #[test_case(0o444, false; "all read")]
    #[test_case(0o404, false; "other read")]
    #[test_case(0o500, true; "owner read exec")]
    #[test_case(0o550, false; "group read exec")]
    #[test_case(0o555, false; "all read exec")]
    #[test_case(0o505, false; "other read exec")]
    #[test_case(0o600, true; "owner read write")]
    #[test_case(0o660, false; "group read write")]
    #[test_case(0o666, false; "all read write")]
    #[test_case(0o606, false; "other read write")]
    #[test_case(0o700, true; "owner all")]
    #[test_case(0o770, false; "group all")]
    #[test_case(0o777, false; "everyone all")]
    #[test_case(0o707, false; "other all")]
    #[test_case(0o411, false; "group other exec")]
    #[test_case(0o640, false; "group read only")]
    #[test_case(0o750, false; "group read exec only")]
    #[test]
    fn password_file_modes(mode: u32, allowed: bool) {
        pretty_assertions::assert_eq!(validate_password_file_mode(mode).is_ok(), allowed);
    }

    #[test]
    fn file_type_bits_are_ignored() {
        assert!(validate_password_file_mode(0o100600).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn read_password_file_checks_permissions() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let file = dir.path().join("pg.pass");
        fs::write(&file, "  s3cret\n")?;

        fs::set_permissions(&file, fs::Permissions::from_mode(0o644))?;
        assert!(matches!(
            read_password_file(&file),
            Err(SecretError::GroupOrOtherAccess(0o644))
        ));

        fs::set_permissions(&file, fs::Permissions::from_mode(0o600))?;
        assert_eq!(read_password_file(&file)?, "s3cret");

        fs::write(&file, " \n")?;
        assert!(matches!(
            read_password_file(&file),
            Err(SecretError::EmptyPasswordFile(_))
        ));

        assert!(matches!(
            read_password_file(dir.path().join("missing")),
            Err(SecretError::PasswordFileMissing(_))
        ));

        Ok(())
    }

    #[test]
    fn negotiate_password_sources() -> anyhow::Result<()> {
        let result = negotiate_remote_password(Some("pw"), Some(" pw "))?;
        assert_eq!(result.source, PasswordSource::Both);
        assert_eq!(result.value, "pw");

        let result = negotiate_remote_password(Some("pw"), Some(""))?;
        assert_eq!(result.source, PasswordSource::Rsync);

        let result = negotiate_remote_password(None, Some("pw"))?;
        assert_eq!(result.source, PasswordSource::Sshpass);

        assert!(matches!(
            negotiate_remote_password(Some("a"), Some("b")),
            Err(SecretError::PasswordMismatch)
        ));
        assert!(matches!(
            negotiate_remote_password(Some(" "), None),
            Err(SecretError::MissingRemotePassword)
        ));

        Ok(())
    }

    #[sealed_test(env = [("HKD_BLANK", "   "), ("HKD_SET", " value ")])]
    fn env_password_ignores_blank_values() {
        assert_eq!(env_password("HKD_BLANK"), None);
        assert_eq!(env_password("HKD_SET"), Some("value".to_string()));
        assert_eq!(env_password("HKD_UNSET_FOR_SURE"), None);
    }
}
