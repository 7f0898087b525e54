// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    db::{now, Connection, DbError, Result},
    launch::{Environment, ExitCode, Launch, OutputSinks},
};

use std::path::PathBuf;
use tracing::instrument;

/// Request to restore database via pg_restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgRestoreRequest {
    /// Database to restore into.
    pub connection: Connection,

    /// Directory that relative input file is based on.
    pub working_dir: PathBuf,

    /// Dump file to restore.
    pub input_file: PathBuf,

    /// pg_restore binary to launch.
    pub tool: PathBuf,

    /// Restore data only, without schema.
    pub data_only: bool,

    /// Superuser used to disable triggers during data-only restore.
    pub superuser: Option<String>,

    /// Skip publications and subscriptions.
    pub no_pub_sub: bool,
}

/// Planned pg_restore launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgRestorePlan {
    /// Absolute path of dump file.
    pub input_file: PathBuf,

    /// The launch itself.
    pub launch: Launch,
}

impl PgRestoreRequest {
    /// Validate request and build pg_restore launch.
    ///
    /// # Errors
    ///
    /// - Return [`DbError::MissingFlag`] for invalid connection.
    /// - Return [`DbError::InputFileMissing`] if dump file does not exist.
    /// - Return [`DbError::SuperuserRequired`] or
    ///   [`DbError::SuperuserForbidden`] for superuser misuse.
    pub fn plan(&self, env: Environment) -> Result<PgRestorePlan> {
        self.connection.validate()?;

        let input_file = self.working_dir.join(&self.input_file);
        let input_file = std::path::absolute(&input_file).map_err(|err| DbError::Absolute {
            source: err,
            path: input_file.clone(),
        })?;
        if !input_file.is_file() {
            return Err(DbError::InputFileMissing(input_file));
        }

        let superuser = self
            .superuser
            .as_deref()
            .map(str::trim)
            .filter(|superuser| !superuser.is_empty());
        let superuser = match (self.data_only, superuser) {
            (true, None) => return Err(DbError::SuperuserRequired),
            (false, Some(_)) => return Err(DbError::SuperuserForbidden),
            (_, superuser) => superuser,
        };

        let mut args: Vec<String> = Vec::new();
        args.extend(self.connection.host_arg());
        args.push(self.connection.port_arg());
        args.extend(self.connection.username_arg());
        args.push(format!("--dbname={}", self.connection.dbname.trim()));
        args.push("--single-transaction".into());
        if self.no_pub_sub {
            args.push("--no-publications".to_string());
            args.push("--no-subscriptions".to_string());
        }
        args.push("--no-owner".into());
        if let Some(superuser) = superuser {
            args.push("--data-only".to_string());
            args.push("--disable-triggers".to_string());
            args.push(format!("--superuser={superuser}"));
        }
        args.push(input_file.display().to_string());

        let launch = Launch::new(&self.tool)
            .args(args)
            .env(env)
            .current_dir(&self.working_dir)
            .propagate_exit_code();

        Ok(PgRestorePlan { input_file, launch })
    }
}

impl PgRestorePlan {
    /// Run pg_restore, reporting progress with timestamps.
    #[instrument(skip(self), level = "debug")]
    pub async fn run(self) -> ExitCode {
        let input = self.input_file.display().to_string();

        println!("Input file: {input}");
        println!("Restore arguments:\n {}", self.launch);
        println!("Begin restore {input} at {}", now());

        let code = self.launch.run_captured(OutputSinks::new()).await;
        if code.is_success() {
            println!("Finished restore {input} at {}", now());
        } else {
            println!("Failed to restore {input} at {}", now());
        }

        code
    }
}
