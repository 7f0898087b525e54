// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    db::{now, Connection, DbError, Result},
    launch::{Environment, ExitCode, Launch, OutputSinks},
};

use chrono::NaiveDate;
use std::path::{Component, Path, PathBuf};
use tracing::instrument;

/// Default schema to backup.
pub const DEFAULT_SCHEMA: &str = "public";

/// Default name of dump file for target date.
pub fn default_output_file(date: NaiveDate) -> String {
    format!("db-{}.dump", date.format("%Y-%m-%d"))
}

/// Request to backup database via pg_dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgDumpRequest {
    /// Database to backup.
    pub connection: Connection,

    /// Directory to place dump file in.
    pub working_dir: PathBuf,

    /// Name of dump file.
    pub output_file: String,

    /// Schema to backup.
    pub schema: String,

    /// pg_dump binary to launch.
    pub tool: PathBuf,
}

/// Planned pg_dump launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgDumpPlan {
    /// Absolute path of dump file.
    pub output_file: PathBuf,

    /// The launch itself.
    pub launch: Launch,
}

impl PgDumpRequest {
    /// Validate request and build pg_dump launch.
    ///
    /// # Errors
    ///
    /// - Return [`DbError::MissingFlag`] for invalid connection or blank
    ///   output file.
    /// - Return [`DbError::OutputFileHasDirectory`] if output file is not a
    ///   bare file name.
    /// - Return [`DbError::OutputFileExists`] if dump file already exists.
    pub fn plan(&self, env: Environment) -> Result<PgDumpPlan> {
        self.connection.validate()?;

        let output_file = self.output_file.trim();
        if output_file.is_empty() {
            return Err(DbError::MissingFlag("output-file"));
        }

        let mut components = Path::new(output_file).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(DbError::OutputFileHasDirectory);
        }

        let output_path = self.working_dir.join(output_file);
        let output_path =
            std::path::absolute(&output_path).map_err(|err| DbError::Absolute {
                source: err,
                path: output_path.clone(),
            })?;
        if output_path.exists() {
            return Err(DbError::OutputFileExists(output_path));
        }

        let mut args: Vec<String> = Vec::new();
        args.extend(self.connection.host_arg());
        args.push(self.connection.port_arg());
        let schema = self.schema.trim();
        if !schema.is_empty() {
            args.push(format!("--schema={schema}"));
        }
        args.push("-Fc".into());
        args.extend(self.connection.username_arg());
        args.push(format!("--file={}", output_path.display()));
        args.push(self.connection.dbname.trim().to_string());

        let launch = Launch::new(&self.tool)
            .args(args)
            .env(env)
            .current_dir(&self.working_dir)
            .propagate_exit_code();

        Ok(PgDumpPlan {
            output_file: output_path,
            launch,
        })
    }
}

impl PgDumpPlan {
    /// Run pg_dump, reporting progress with timestamps.
    #[instrument(skip(self), level = "debug")]
    pub async fn run(self) -> ExitCode {
        let name = self
            .output_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        println!("Output file: {}", self.output_file.display());
        println!("Dump arguments:\n {}", self.launch);
        println!("Begin dump {name} at {}", now());

        let code = self.launch.run_captured(OutputSinks::new()).await;
        if code.is_success() {
            println!("Finished dump {name} at {}", now());
        } else {
            println!("Failed to dump {name} at {}", now());
        }

        code
    }
}
