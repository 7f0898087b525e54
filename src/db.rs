// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Database housekeeping.
//!
//! Backup and restore PostgreSQL databases through `pg_dump` and
//! `pg_restore`. Only PostgreSQL is supported for now.
//!
//! # Passwords
//!
//! The database password is either read from a password file and handed to
//! the tool as `PGPASSWORD`, or must already be present in the environment
//! as `PGPASSWORD`.

pub mod pg_dump;
pub mod pg_restore;

use crate::{
    launch::Environment,
    secret::{self, ENV_PG_PASSWORD},
};

use chrono::Local;
use std::{path::PathBuf, str::FromStr};

/// Supported database types.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    /// PostgreSQL.
    #[default]
    Postgres,
}

impl FromStr for DbType {
    type Err = DbError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "postgres" => Ok(Self::Postgres),
            other => Err(DbError::UnsupportedType(other.to_string())),
        }
    }
}

/// Connection information of database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Database host, omitted from arguments when blank.
    pub host: String,

    /// Database port.
    pub port: u16,

    /// Database name.
    pub dbname: String,

    /// User name, omitted from arguments when blank.
    pub username: String,
}

impl Connection {
    /// Validate mandatory connection fields.
    ///
    /// # Errors
    ///
    /// - Return [`DbError::MissingFlag`] if port is zero or database name is
    ///   blank.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(DbError::MissingFlag("port"));
        }

        if self.dbname.trim().is_empty() {
            return Err(DbError::MissingFlag("dbname"));
        }

        Ok(())
    }

    pub(crate) fn host_arg(&self) -> Option<String> {
        non_blank(&self.host).map(|host| format!("--host={host}"))
    }

    pub(crate) fn port_arg(&self) -> String {
        format!("--port={}", self.port)
    }

    pub(crate) fn username_arg(&self) -> Option<String> {
        non_blank(&self.username).map(|username| format!("--username={username}"))
    }
}

/// Determine environment that carries database password to tool.
///
/// A password file wins over the environment. The `lookup` function reads
/// environment variables, returning `None` for unset or blank variables.
///
/// # Errors
///
/// - Return [`DbError::Secret`] if password file is invalid.
/// - Return [`DbError::MissingPassword`] if no password is available.
pub fn password_env(
    password_file: Option<PathBuf>,
    username: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Environment> {
    match password_file {
        Some(path) => {
            let password = secret::read_password_file(path)?;
            Ok(Environment::Extend(vec![(
                ENV_PG_PASSWORD.into(),
                password.into(),
            )]))
        }
        None if lookup(ENV_PG_PASSWORD).is_some() => Ok(Environment::Inherit),
        None => Err(DbError::MissingPassword(username.to_string())),
    }
}

/// Current local time in human readable form.
pub fn now() -> String {
    Local::now().format("%Y-%b-%d %H:%M:%S").to_string()
}

fn non_blank(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|value| !value.is_empty())
}

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database type is not supported.
    #[error("not supported database type {0:?}, only valid value is \"postgres\"")]
    UnsupportedType(String),

    /// Mandatory flag has no value.
    #[error("missing value for mandatory flag --{0}")]
    MissingFlag(&'static str),

    /// No password for database user.
    #[error(
        "missing password for user {0}, either environment variable PGPASSWORD \
         or flag --password-file is required"
    )]
    MissingPassword(String),

    /// Output file is not a bare file name.
    #[error("output file name must be file name alone, can not contains directory part")]
    OutputFileHasDirectory,

    /// Output file already exists.
    #[error("output file already exists: {}", .0.display())]
    OutputFileExists(PathBuf),

    /// Input file does not exist.
    #[error("input file does not exists: {}", .0.display())]
    InputFileMissing(PathBuf),

    /// Superuser is required for data-only restore.
    #[error("flag --superuser is mandatory when --data-only=true (default)")]
    SuperuserRequired,

    /// Superuser is forbidden for full restore.
    #[error("flag --superuser is not allowed when --data-only=false")]
    SuperuserForbidden,

    /// Path could not be made absolute.
    #[error("failed to convert {:?} into absolute path", path.display())]
    Absolute {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Tool could not be resolved.
    #[error(transparent)]
    Tool(#[from] crate::tools::ToolError),

    /// Password file is invalid.
    #[error(transparent)]
    Secret(#[from] crate::secret::SecretError),
}

/// Friendly result alias :3
pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn only_postgres_is_supported() {
        assert_eq!("postgres".parse::<DbType>().ok(), Some(DbType::Postgres));
        assert!(matches!(
            "mysql".parse::<DbType>(),
            Err(DbError::UnsupportedType(_))
        ));
    }

    #[test]
    fn connection_requires_port_and_dbname() {
        let connection = Connection {
            host: "localhost".into(),
            port: 0,
            dbname: "postgres".into(),
            username: "postgres".into(),
        };
        assert!(matches!(
            connection.validate(),
            Err(DbError::MissingFlag("port"))
        ));

        let connection = Connection {
            port: 5432,
            dbname: " ".into(),
            ..connection
        };
        assert!(matches!(
            connection.validate(),
            Err(DbError::MissingFlag("dbname"))
        ));
    }

    #[test]
    fn password_from_environment() -> anyhow::Result<()> {
        let env = password_env(None, "postgres", |_| Some("pw".into()))?;
        assert_eq!(env, Environment::Inherit);

        assert!(matches!(
            password_env(None, "postgres", |_| None),
            Err(DbError::MissingPassword(_))
        ));

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn password_from_file() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let file = dir.path().join("pg.pass");
        std::fs::write(&file, "s3cret\n")?;
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o400))?;

        let env = password_env(Some(file), "postgres", |_| None)?;
        assert_eq!(
            env,
            Environment::Extend(vec![("PGPASSWORD".into(), "s3cret".into())])
        );

        Ok(())
    }
}
