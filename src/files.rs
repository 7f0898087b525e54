// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! File housekeeping.
//!
//! Commands that interact with files inside a __working directory__:
//!
//! - [`list`]: list, filter, order, and optionally delete files.
//! - [`rsync`]: transfer files locally or to and from remote servers.
//! - [`checksum`]: compute SHA-1 checksums with an optional cache.

pub mod checksum;
pub mod list;
pub mod rsync;

use std::path::PathBuf;

/// File housekeeping error types.
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Order of listing is not supported.
    #[error("not supported value {0:?} for flag --order-by, expect \"name\" or \"date\"")]
    UnknownOrder(String),

    /// Directory entries could not be listed.
    #[error("failed to listing entries in directory {:?}", path.display())]
    ReadDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File metadata could not be read.
    #[error("failed to stats file {:?}", path.display())]
    Stat {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File could not be deleted.
    #[error("failed to delete file {:?}", path.display())]
    Delete {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Source or destination of transfer is blank.
    #[error("{0} file/dir is empty")]
    EmptyEndpoint(&'static str),

    /// Transfer between two remote servers.
    #[error("not support transfer direction from remote to remote")]
    RemoteToRemote,

    /// Transfer direction was not confirmed by flag.
    #[error("detected transfer direction is {direction} so flag --{flag} is required to confirm")]
    UnconfirmedDirection {
        direction: &'static str,
        flag: &'static str,
    },

    /// Local source does not exist.
    #[error("local source file/dir does not exists: {0}")]
    SourceMissing(String),

    /// Glob pattern of local source is invalid.
    #[error("invalid glob pattern for local source {pattern:?}")]
    Pattern {
        #[source]
        source: glob::PatternError,
        pattern: String,
    },

    /// Local source directory without recursive option.
    #[error("local source {0} is a directory, require option --recursive or -r")]
    RecursiveRequired(String),

    /// Local destination is an existing file.
    #[error("local destination file/dir already exists: {0}")]
    DestinationExists(String),

    /// File to checksum does not exist.
    #[error("file does not exists: {}", .0.display())]
    FileMissing(PathBuf),

    /// Output file could not be opened for appending.
    #[error("failed to open file for append: {}", path.display())]
    OpenOutputFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Path cannot be made absolute.
    #[error("failed to make path absolute {:?}", path.display())]
    AbsolutePath {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Tool could not be resolved.
    #[error(transparent)]
    Tool(#[from] crate::tools::ToolError),

    /// Password could not be obtained.
    #[error(transparent)]
    Secret(#[from] crate::secret::SecretError),
}

/// Friendly result alias :3
pub type Result<T, E = FilesError> = std::result::Result<T, E>;
