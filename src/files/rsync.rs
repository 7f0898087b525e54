// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Wrapper around rsync.
//!
//! Transfers between local paths, or between local paths and one remote
//! server over ssh. A path containing a colon is considered remote, e.g.,
//! `backup@192.168.0.2:/mnt/md0/backup`. The direction of the transfer must
//! always be confirmed by flag, so a typo cannot silently reverse a backup.
//!
//! Passwords for remote servers are handed to `sshpass` when it exists,
//! and to rsync through `RSYNC_PASSWORD` otherwise.

use crate::{
    files::{FilesError, Result},
    launch::{Environment, Launch},
    secret::{self, PasswordSource, ENV_RSYNC_PASSWORD, ENV_SSHPASS},
    tools::Toolbox,
};

use std::{ffi::OsString, path::PathBuf};
use tracing::{info, instrument, warn};

/// Direction of transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Both paths are local.
    LocalToLocal,

    /// Send local files to remote server.
    LocalToRemote,

    /// Receive files from remote server.
    RemoteToLocal,
}

impl Direction {
    /// Detect direction of transfer between two paths.
    ///
    /// # Errors
    ///
    /// - Return [`FilesError::RemoteToRemote`] if both paths are remote.
    pub fn detect(src: &str, dest: &str) -> Result<Self> {
        match (is_remote(src), is_remote(dest)) {
            (true, true) => Err(FilesError::RemoteToRemote),
            (true, false) => Ok(Self::RemoteToLocal),
            (false, true) => Ok(Self::LocalToRemote),
            (false, false) => Ok(Self::LocalToLocal),
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::LocalToLocal => "from local to local",
            Self::LocalToRemote => "from local to remote",
            Self::RemoteToLocal => "from remote to local",
        }
    }

    fn confirm_flag(self) -> &'static str {
        match self {
            Self::LocalToLocal => "local-to-local",
            Self::LocalToRemote => "local-to-remote",
            Self::RemoteToLocal => "remote-to-local",
        }
    }
}

/// Request to transfer files via rsync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsyncRequest {
    /// Source path, local or remote.
    pub src: String,

    /// Destination path, local or remote.
    pub dest: String,

    /// Directions confirmed by the operator.
    pub confirmed: Vec<Direction>,

    /// Options passed to rsync.
    pub options: Vec<String>,

    /// Rsync binary to launch.
    pub tool: PathBuf,

    /// Directory that relative local paths are based on.
    pub working_dir: PathBuf,

    /// File holding password of remote server.
    pub password_file: Option<PathBuf>,

    /// Connect to remote server without password.
    pub no_password: bool,

    /// Make sshpass wait for passphrase prompt instead of password prompt.
    pub passphrase: bool,
}

impl RsyncRequest {
    /// Plan rsync launch.
    ///
    /// The `lookup` function reads password environment variables, returning
    /// `None` for unset variables.
    ///
    /// # Errors
    ///
    /// - Return [`FilesError::EmptyEndpoint`] if source or destination is
    ///   blank.
    /// - Return [`FilesError::RemoteToRemote`] or
    ///   [`FilesError::UnconfirmedDirection`] for invalid direction.
    /// - Return [`FilesError::SourceMissing`],
    ///   [`FilesError::RecursiveRequired`], or
    ///   [`FilesError::DestinationExists`] for invalid local paths.
    /// - Return [`FilesError::Secret`] if password cannot be obtained.
    #[instrument(skip(self, toolbox, lookup), level = "debug")]
    pub fn plan(
        &self,
        toolbox: &impl Toolbox,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Launch> {
        let src = self.src.trim();
        if src.is_empty() {
            return Err(FilesError::EmptyEndpoint("source"));
        }

        let dest = self.dest.trim();
        if dest.is_empty() {
            return Err(FilesError::EmptyEndpoint("destination"));
        }

        let direction = Direction::detect(src, dest)?;
        if !self.confirmed.contains(&direction) {
            return Err(FilesError::UnconfirmedDirection {
                direction: direction.description(),
                flag: direction.confirm_flag(),
            });
        }

        let options = self
            .options
            .iter()
            .map(|option| option.trim())
            .filter(|option| !option.is_empty())
            .collect::<Vec<_>>();

        if !is_remote(src) {
            self.check_local_source(src, &options)?;
        }

        if !is_remote(dest) && self.working_dir.join(dest).is_file() {
            return Err(FilesError::DestinationExists(dest.to_string()));
        }

        let rsync = Launch::new(&self.tool)
            .args(options.iter().copied())
            .current_dir(&self.working_dir)
            .propagate_exit_code();

        if direction == Direction::LocalToLocal {
            return Ok(rsync.args([src, dest]));
        }

        let over_ssh = ["-e", "ssh", src, dest];
        if self.no_password {
            return Ok(rsync.args(over_ssh));
        }

        let sshpass_prompt: &[&str] = if self.passphrase {
            &["-P", "assphrase"]
        } else {
            &[]
        };

        if let Some(password_file) = &self.password_file {
            // INVARIANT: sshpass runs inside working directory, so it must see
            // the same password file that was validated here.
            let password_file = std::path::absolute(password_file).map_err(|err| {
                FilesError::AbsolutePath {
                    source: err,
                    path: password_file.clone(),
                }
            })?;
            let password = secret::read_password_file(&password_file)?;

            if toolbox.has_sshpass() {
                info!("using sshpass to passing password file");
                let mut args = sshpass_prompt
                    .iter()
                    .map(OsString::from)
                    .collect::<Vec<_>>();
                args.extend([OsString::from("-f"), password_file.into_os_string()]);
                args.extend(into_args(rsync));
                return Ok(Launch::new("sshpass")
                    .args(args)
                    .args(over_ssh)
                    .current_dir(&self.working_dir)
                    .propagate_exit_code());
            }

            info!(
                "using environment variable {ENV_RSYNC_PASSWORD} to passing password from \
                 password file to rsync"
            );
            warn!(
                "if remote machine does not have rsync service running, password prompt \
                 still appears"
            );
            return Ok(rsync
                .args(over_ssh)
                .env(extend_env(ENV_RSYNC_PASSWORD, password)));
        }

        let password = secret::negotiate_remote_password(
            lookup(ENV_RSYNC_PASSWORD).as_deref(),
            lookup(ENV_SSHPASS).as_deref(),
        )?;

        if toolbox.has_sshpass() {
            if password.source == PasswordSource::Rsync {
                info!(
                    "copied environment variable value from {ENV_RSYNC_PASSWORD} to \
                     {ENV_SSHPASS}"
                );
            }
            info!("using sshpass to passing password via environment variable {ENV_SSHPASS}");

            let mut args = sshpass_prompt
                .iter()
                .map(OsString::from)
                .collect::<Vec<_>>();
            args.push("-e".into());
            args.extend(into_args(rsync));
            return Ok(Launch::new("sshpass")
                .args(args)
                .args(over_ssh)
                .env(extend_env(ENV_SSHPASS, password.value))
                .current_dir(&self.working_dir)
                .propagate_exit_code());
        }

        if password.source == PasswordSource::Sshpass {
            info!("copied environment variable value from {ENV_SSHPASS} to {ENV_RSYNC_PASSWORD}");
        }
        info!("using environment variable {ENV_RSYNC_PASSWORD} to passing password to rsync");
        warn!(
            "if remote machine does not have rsync service running, password prompt still \
             appears"
        );
        Ok(rsync
            .args(over_ssh)
            .env(extend_env(ENV_RSYNC_PASSWORD, password.value)))
    }

    fn check_local_source(&self, src: &str, options: &[&str]) -> Result<()> {
        let path = self.working_dir.join(src);
        if is_glob(src) {
            let pattern = path.to_string_lossy().into_owned();
            let mut matches = glob::glob(&pattern).map_err(|err| FilesError::Pattern {
                source: err,
                pattern: src.to_string(),
            })?;
            if !matches.any(|entry| entry.is_ok()) {
                return Err(FilesError::SourceMissing(src.to_string()));
            }

            return Ok(());
        }

        if !path.exists() {
            return Err(FilesError::SourceMissing(src.to_string()));
        }

        if path.is_dir() && !options.iter().any(|option| is_or_contains_recursive_flag(option)) {
            return Err(FilesError::RecursiveRequired(src.to_string()));
        }

        Ok(())
    }
}

/// Check if rsync option enables recursion.
///
/// Either the long option `--recursive`, or a cluster of short options that
/// contains `r`, e.g., `-r` or `-rlptgoD`.
pub fn is_or_contains_recursive_flag(option: &str) -> bool {
    if option == "--recursive" {
        return true;
    }

    match option.strip_prefix('-') {
        Some(short) if !short.starts_with('-') => short.contains('r'),
        _ => false,
    }
}

fn is_remote(path: &str) -> bool {
    path.contains(':')
}

fn is_glob(path: &str) -> bool {
    path.contains(['*', '?', '['])
}

fn into_args(launch: Launch) -> Vec<OsString> {
    let mut args = vec![launch.program().to_os_string()];
    args.extend(launch.arguments().iter().cloned());
    args
}

fn extend_env(key: &str, value: String) -> Environment {
    Environment::Extend(vec![(key.into(), value.into())])
}
