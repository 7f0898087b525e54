// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! SHA-1 checksums through sha1sum or shasum.
//!
//! Checksumming large backups takes a while, so results can be cached in a
//! __sentinel__ file placed next to each checksummed file, named
//! `<file>.hkd.sha1`. A sentinel is only consulted when the operator asks to
//! trust it.

use crate::{
    files::{FilesError, Result},
    launch::{ExitCode, Launch, OutputSinks},
};

use std::{
    cell::RefCell,
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// Suffix of checksum cache sentinel.
pub const SENTINEL_SUFFIX: &str = ".hkd.sha1";

/// Path of sentinel that caches checksum of target file.
pub fn sentinel_path(file: impl AsRef<Path>) -> PathBuf {
    let mut path = OsString::from(file.as_ref().as_os_str());
    path.push(SENTINEL_SUFFIX);
    PathBuf::from(path)
}

/// Request to checksum files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumRequest {
    /// Files to checksum, relative to working directory.
    pub files: Vec<PathBuf>,

    /// Checksum tool to launch.
    pub tool: PathBuf,

    /// Directory that relative paths are based on.
    pub working_dir: PathBuf,

    /// Append every output line to this file.
    pub output_file: Option<PathBuf>,

    /// Use and maintain checksum sentinels.
    pub cache_and_trust: bool,
}

impl ChecksumRequest {
    /// Checksum each file in order.
    ///
    /// Stops at the first file whose checksum fails, reporting the exit code
    /// of the checksum tool.
    ///
    /// # Errors
    ///
    /// - Return [`FilesError::FileMissing`] if any file does not exist.
    /// - Return [`FilesError::OpenOutputFile`] if output file cannot be
    ///   opened for appending.
    #[instrument(skip(self), level = "debug")]
    pub async fn run(&self) -> Result<ExitCode> {
        let files = self
            .files
            .iter()
            .map(|file| self.working_dir.join(file))
            .collect::<Vec<_>>();

        if let Some(missing) = files.iter().find(|file| !file.exists()) {
            return Err(FilesError::FileMissing(missing.clone()));
        }

        let output = match &self.output_file {
            Some(path) => Some(open_for_append(&self.working_dir.join(path))?),
            None => None,
        };
        let output = RefCell::new(output);

        for file in &files {
            let code = self.checksum(file, &output).await;
            if !code.is_success() {
                return Ok(code);
            }
        }

        Ok(ExitCode::SUCCESS)
    }

    async fn checksum(&self, file: &Path, output: &RefCell<Option<File>>) -> ExitCode {
        let sentinel = sentinel_path(file);
        if self.cache_and_trust && sentinel.is_file() {
            match fs::read_to_string(&sentinel) {
                Ok(cached) => {
                    debug!("trust cached checksum {:?}", sentinel.display());
                    for line in cached.lines() {
                        println!("{line}");
                        append_line(output, line);
                    }

                    return ExitCode::SUCCESS;
                }
                Err(err) => warn!("failed to read cache {:?}: {err}", sentinel.display()),
            }
        }

        let mut captured = Vec::new();
        let sinks = OutputSinks::new()
            .on_stdout(|line| {
                captured.push(line.to_string());
                append_line(output, line);
            })
            .on_stderr(|line| append_line(output, line));

        let code = Launch::new(&self.tool)
            .arg(file)
            .current_dir(&self.working_dir)
            .propagate_exit_code()
            .run_captured(sinks)
            .await;

        if code.is_success() && self.cache_and_trust {
            let mut content = captured.join("\n");
            content.push('\n');
            if let Err(err) = fs::write(&sentinel, content) {
                warn!("failed to write cache {:?}: {err}", sentinel.display());
            }
        }

        code
    }
}

fn open_for_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| FilesError::OpenOutputFile {
            source: err,
            path: path.to_path_buf(),
        })
}

fn append_line(output: &RefCell<Option<File>>, line: &str) {
    if let Some(file) = output.borrow_mut().as_mut() {
        if let Err(err) = writeln!(file, "{line}") {
            warn!("failed to append to output file: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sentinel_sits_next_to_file() {
        assert_eq!(
            sentinel_path("/backup/db-2025-01-01.dump"),
            PathBuf::from("/backup/db-2025-01-01.dump.hkd.sha1")
        );
    }

    #[tokio::test]
    async fn missing_file_is_rejected_before_launch() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("present"), "data")?;
        let request = ChecksumRequest {
            files: vec!["present".into(), "absent".into()],
            tool: PathBuf::from("/nonexistent/sha1sum"),
            working_dir: dir.path().to_path_buf(),
            output_file: Some("out.txt".into()),
            cache_and_trust: false,
        };

        assert!(matches!(
            request.run().await,
            Err(FilesError::FileMissing(_))
        ));
        assert!(!dir.path().join("out.txt").exists());

        Ok(())
    }

    #[tokio::test]
    async fn trusted_cache_skips_tool() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("db.dump");
        std::fs::write(&file, "data")?;
        std::fs::write(sentinel_path(&file), "cafebabe  db.dump\n")?;

        let request = ChecksumRequest {
            files: vec!["db.dump".into()],
            tool: PathBuf::from("/nonexistent/sha1sum"),
            working_dir: dir.path().to_path_buf(),
            output_file: Some("out.txt".into()),
            cache_and_trust: true,
        };

        let code = request.run().await?;
        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.txt"))?,
            "cafebabe  db.dump\n"
        );

        Ok(())
    }

    #[tokio::test]
    async fn failing_tool_stops_processing() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir(dir.path().join("first"))?;
        std::fs::write(dir.path().join("second"), "second contents\n")?;
        let request = ChecksumRequest {
            files: vec!["first".into(), "second".into()],
            tool: PathBuf::from("cat"),
            working_dir: dir.path().to_path_buf(),
            output_file: Some("out.txt".into()),
            cache_and_trust: true,
        };

        let code = request.run().await?;
        assert_eq!(code, ExitCode::FAILURE);
        assert!(!sentinel_path(dir.path().join("first")).exists());
        assert!(!sentinel_path(dir.path().join("second")).exists());
        let output = std::fs::read_to_string(dir.path().join("out.txt"))?;
        assert!(!output.contains("second contents"));

        Ok(())
    }
}
