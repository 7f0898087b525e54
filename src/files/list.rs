// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::files::{FilesError, Result};

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::SystemTime,
};
use tracing::{info, instrument};

/// How to order listed files.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    /// By absolute path.
    #[default]
    Name,

    /// By modification time.
    Date,
}

impl FromStr for OrderBy {
    type Err = FilesError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "name" => Ok(Self::Name),
            "date" => Ok(Self::Date),
            other => Err(FilesError::UnknownOrder(other.to_string())),
        }
    }
}

/// Options for file listing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Keep files whose name contains every one of these.
    pub contains: Vec<String>,

    /// Order of result.
    pub order_by: OrderBy,

    /// Reverse order.
    pub desc: bool,

    /// Skip first N results.
    pub skip: usize,

    /// Delete files in result.
    pub delete: bool,
}

/// List files directly inside directory.
///
/// Directories are excluded. Paths are absolute. If deletion was requested,
/// the returned files no longer exist.
///
/// # Errors
///
/// - Return [`FilesError::ReadDir`] if directory cannot be listed.
/// - Return [`FilesError::Stat`] if modification time cannot be read.
/// - Return [`FilesError::Delete`] if a file cannot be deleted.
#[instrument(skip(dir, options), level = "debug")]
pub fn list_files(dir: impl AsRef<Path>, options: &ListOptions) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = files_within_dir(dir)?
        .into_iter()
        .filter(|file| {
            let name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            options
                .contains
                .iter()
                .filter(|part| !part.is_empty())
                .all(|part| name.contains(part.as_str()))
        })
        .collect::<Vec<_>>();

    match options.order_by {
        OrderBy::Name => files.sort(),
        OrderBy::Date => {
            let mut dated = files
                .into_iter()
                .map(|file| modified(&file).map(|time| (time, file)))
                .collect::<Result<Vec<_>>>()?;
            dated.sort();
            files = dated.into_iter().map(|(_, file)| file).collect();
        }
    }

    if options.desc {
        files.reverse();
    }

    let files = files.into_iter().skip(options.skip).collect::<Vec<_>>();

    if options.delete {
        for file in &files {
            fs::remove_file(file).map_err(|err| FilesError::Delete {
                source: err,
                path: file.clone(),
            })?;
            info!("deleted {}", file.display());
        }
    }

    Ok(files)
}

fn files_within_dir(dir: &Path) -> Result<BTreeSet<PathBuf>> {
    let read_dir_error = |err| FilesError::ReadDir {
        source: err,
        path: dir.to_path_buf(),
    };

    let dir = std::path::absolute(dir).map_err(read_dir_error)?;
    let mut files = BTreeSet::new();
    for entry in fs::read_dir(&dir).map_err(read_dir_error)? {
        let entry = entry.map_err(read_dir_error)?;
        let is_dir = entry.file_type().map_err(read_dir_error)?.is_dir();
        if !is_dir {
            files.insert(dir.join(entry.file_name()));
        }
    }

    Ok(files)
}

fn modified(file: &Path) -> Result<SystemTime> {
    fs::metadata(file)
        .and_then(|metadata| metadata.modified())
        .map_err(|err| FilesError::Stat {
            source: err,
            path: file.to_path_buf(),
        })
}
