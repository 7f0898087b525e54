// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Command aliases.
//!
//! An __alias__ is a short name for a shell command that an operator runs
//! often on a server, e.g., `esrs` to restart the evmosd service, or `esl` to
//! follow its logs. Aliases come from two places:
//!
//! 1. __Built-in aliases__ registered by inspecting the host. For example,
//!    node management aliases are only registered when the node binary or its
//!    systemd unit file exists.
//! 2. __Alias file__ entries read from `~/.hkd_alias`. Each line has the form
//!    `<alias><tab><command>`. Lines starting with `#` and blank lines are
//!    ignored. An entry with the same name as a built-in alias overrides it.
//!
//! # Alterations
//!
//! Some built-in aliases accept extra arguments that change the command they
//! run. For instance, `esl 1 hour ago` becomes
//! `sudo journalctl -fu evmosd --since '1 hour ago'`. The way extra arguments
//! are folded into the command is called an [`Alteration`].
//!
//! # Execution
//!
//! Resolved commands are joined with spaces and run through `/bin/bash -c`,
//! so shell operators like `&&` work as expected.

use crate::{
    launch::{ExitCode, Launch},
    path::resolve_symlink,
    tools::{SystemToolbox, Toolbox},
};

use ignore::WalkBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    collections::BTreeMap,
    ffi::OsStr,
    fmt::Write as _,
    fs::read_to_string,
    io::{self, BufRead, IsTerminal},
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, instrument, warn};

/// Shell used to execute alias commands.
pub const SHELL: &str = "/bin/bash";

/// Node data directories at or above this size cannot be reset via alias.
const RESET_LIMIT_BYTES: u64 = 1_000_000_000_000;

/// Node binaries and the alias prefix used to manage them.
const NODES: &[(&str, &str)] = &[
    ("evmosd", "es"),
    ("dymd", "dym"),
    ("ethermintd", "eth"),
    ("gaid", "ga"),
];

/// Plain services and the alias prefix used to manage them.
const SERVICES: &[(&str, &str)] = &[("crawld", "ec"), ("epod", "ep")];

/// Way to fold extra alias arguments into a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alteration {
    /// Append `--since '<args>'` to a journalctl command.
    JournalSince,

    /// Follow logs of service named by first argument, and treat the rest as
    /// a `--since` time filter.
    ServiceLog,

    /// Fetch, then checkout and pull every branch given as argument.
    GitPull,
}

impl Alteration {
    /// Alter command with extra arguments.
    pub fn apply(self, command: &[String], args: &[String]) -> Vec<String> {
        match self {
            Self::JournalSince => {
                let mut command = command.to_vec();
                command.extend(["--since".to_string(), format!("'{}'", args.join(" "))]);
                command
            }
            Self::ServiceLog => {
                let Some((service, since)) = args.split_first() else {
                    return command.to_vec();
                };
                let mut command = strings(["sudo", "journalctl", "-fu"]);
                command.push(service.clone());
                if !since.is_empty() {
                    command = Self::JournalSince.apply(&command, since);
                }
                command
            }
            Self::GitPull => {
                let mut command = strings(["git", "fetch", "--all"]);
                for branch in args {
                    command.extend(strings(["&&", "git", "checkout"]));
                    command.push(branch.clone());
                    command.extend(strings(["&&", "git", "pull"]));
                }
                command
            }
        }
    }
}

/// A registered alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    /// Name used to invoke alias.
    pub name: String,

    /// Usage description, e.g., `esl [?since]`.
    pub usage: String,

    /// Command to run when no extra arguments are given.
    pub command: Vec<String>,

    /// How extra arguments alter the command.
    pub alteration: Option<Alteration>,

    /// Whether alias file replaced a built-in alias.
    pub overridden: bool,
}

/// Registry of all known aliases.
///
/// Aliases are kept sorted by name.
#[derive(Debug, Default, Clone)]
pub struct AliasRegistry {
    aliases: BTreeMap<String, Alias>,
}

impl AliasRegistry {
    /// Construct new empty alias registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register alias.
    ///
    /// The alias name is the first word of the usage description. Any existing
    /// alias of the same name is replaced.
    pub fn register(
        &mut self,
        usage: impl Into<String>,
        command: impl IntoIterator<Item = impl Into<String>>,
        alteration: Option<Alteration>,
    ) {
        let usage = usage.into();
        let name = usage.split(' ').next().unwrap_or_default().to_string();
        self.aliases.insert(
            name.clone(),
            Alias {
                name,
                usage,
                command: command.into_iter().map(Into::into).collect(),
                alteration,
                overridden: false,
            },
        );
    }

    /// Register built-in aliases based on what the host provides.
    #[instrument(skip(self, host), level = "debug")]
    pub fn register_builtin(&mut self, host: &impl Host) {
        let home = host.home_dir();

        for (binary, prefix) in NODES {
            let has_binary = host.has_binary(binary);
            self.register_service(host, binary, prefix);

            if host.is_root() || !has_binary {
                continue;
            }

            if let Some(home) = home.as_deref() {
                self.register_node_reset(home, binary, prefix);
            }
        }

        for (service, prefix) in SERVICES {
            self.register_service(host, service, prefix);
        }

        self.register(
            "log [?service] [?since]",
            ["sudo", "journalctl"],
            Some(Alteration::ServiceLog),
        );

        if host.in_git_repo() {
            self.register(
                "pull [?branch] [?branch2] [...]",
                [
                    "git", "fetch", "--all", "&&", "git", "checkout", "main", "&&", "git", "pull",
                ],
                Some(Alteration::GitPull),
            );
        }
    }

    fn register_service(&mut self, host: &impl Host, service: &str, prefix: &str) {
        if !host.has_binary(service) && !host.has_service_file(service) {
            return;
        }

        debug!("register aliases for service {service}");
        self.register(
            format!("{prefix}rs"),
            ["sudo", "systemctl", "restart", service],
            None,
        );
        self.register(
            format!("{prefix}stop"),
            ["sudo", "systemctl", "stop", service],
            None,
        );
        self.register(
            format!("{prefix}l [?since]"),
            ["sudo", "journalctl", "-fu", service],
            Some(Alteration::JournalSince),
        );
    }

    fn register_node_reset(&mut self, home: &Path, binary: &str, prefix: &str) {
        let node_home = home.join(format!(".{binary}"));
        if !node_home.exists() {
            return;
        }

        let data = resolve_symlink(resolve_symlink(&node_home).join("data"));
        let alias = format!("{prefix}reset");
        match dir_size(&data, RESET_LIMIT_BYTES) {
            Ok(size) if size >= RESET_LIMIT_BYTES => {
                warn!("{alias} is not supported for node with data size >= 1.00 TB");
            }
            Ok(_) => self.register(
                alias,
                [
                    binary.to_string(),
                    "tendermint".into(),
                    "unsafe-reset-all".into(),
                    "--home".into(),
                    node_home.to_string_lossy().into_owned(),
                    "--keep-addr-book".into(),
                ],
                None,
            ),
            Err(err) => warn!(
                "failed to calculate total data size of {}: {err}",
                data.display()
            ),
        }
    }

    /// Load aliases from alias file.
    ///
    /// Missing alias file, or a directory in its place, is not an error.
    ///
    /// # Errors
    ///
    /// - Return [`AliasError::ReadAliasFile`] if alias file cannot be read.
    /// - Return [`AliasError::Malformed`] if an entry lacks a command.
    #[instrument(skip(self, path), level = "debug")]
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if !path.is_file() {
            debug!("no alias file at {:?}", path.display());
            return Ok(());
        }

        let content = read_to_string(path).map_err(|err| AliasError::ReadAliasFile {
            source: err,
            path: path.to_path_buf(),
        })?;

        self.extend_from_str(&content)
    }

    /// Register aliases from alias file content.
    ///
    /// # Errors
    ///
    /// - Return [`AliasError::Malformed`] if an entry lacks a command.
    pub fn extend_from_str(&mut self, content: &str) -> Result<()> {
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut words = line.split_whitespace().map(ToString::to_string);
            let name = words.next().unwrap_or_default();
            let command = words.collect::<Vec<_>>();
            if command.is_empty() {
                return Err(AliasError::Malformed(number + 1));
            }

            match self.aliases.get_mut(&name) {
                Some(alias) => {
                    alias.usage = name;
                    alias.command = command;
                    alias.overridden = true;
                }
                None => self.register(name, command, None),
            }
        }

        Ok(())
    }

    /// Get alias by name.
    pub fn get(&self, name: &str) -> Option<&Alias> {
        self.aliases.get(name)
    }

    /// Iterate through aliases in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Alias> {
        self.aliases.values()
    }

    /// Check if registry has no aliases.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Resolve alias and its extra arguments into command to execute.
    ///
    /// # Errors
    ///
    /// - Return [`AliasError::Unregistered`] if alias does not exist.
    /// - Return [`AliasError::EmptyCommand`] if resolved command is empty.
    pub fn resolve(&self, name: &str, args: &[String]) -> Result<Vec<String>> {
        let alias = self
            .get(name)
            .ok_or_else(|| AliasError::Unregistered(name.to_string()))?;

        let command = match alias.alteration {
            Some(alteration) if !args.is_empty() => alteration.apply(&alias.command, args),
            _ => alias.command.clone(),
        };

        if command.is_empty() {
            return Err(AliasError::EmptyCommand(name.to_string()));
        }

        Ok(command)
    }

    /// Render listing of registered aliases.
    pub fn listing(&self) -> String {
        let width = self.iter().map(|alias| alias.usage.len()).max().unwrap_or(0) + 1;
        let mut out = String::from("Registered aliases:\n");
        for alias in self.iter() {
            let marker = if alias.overridden { " *overridden*" } else { "" };
            let _ = writeln!(
                out,
                "{marker} {:<width$}: {}",
                alias.usage,
                alias.command.join(" "),
            );
        }

        out
    }
}

/// Operator answer to confirmation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Go ahead.
    Yes,

    /// Abort.
    No,

    /// Anything else, which also aborts.
    Invalid(String),
}

impl From<&str> for Answer {
    fn from(text: &str) -> Self {
        let text = text.trim().to_lowercase();
        match text.as_str() {
            "y" | "yes" => Self::Yes,
            "n" | "no" => Self::No,
            _ => Self::Invalid(text),
        }
    }
}

/// Ask operator to confirm execution of command.
///
/// # Errors
///
/// - Return [`AliasError::Prompt`] if prompt cannot be shown or answered.
pub fn confirm(command: &str) -> Result<Answer> {
    println!("Are you sure want to execute the following command?");
    println!("> {command}");
    println!("(actual command: [{SHELL}] [-c] [{command}])");

    if io::stdin().is_terminal() {
        let text = inquire::Text::new("Yes/No?").prompt()?;
        return Ok(Answer::from(text.as_str()));
    }

    println!("Yes/No?");
    read_answer(io::stdin().lock())
}

/// Read one line answer from non-interactive input.
///
/// # Errors
///
/// - Return [`AliasError::ReadAnswer`] if input cannot be read.
pub fn read_answer(mut reader: impl BufRead) -> Result<Answer> {
    let mut text = String::new();
    reader.read_line(&mut text).map_err(AliasError::ReadAnswer)?;
    Ok(Answer::from(text.as_str()))
}

/// Count down before executing command without confirmation.
///
/// # Errors
///
/// - Return [`AliasError::IndicatifStyleTemplate`] if progress bar style is
///   invalid.
pub async fn countdown(command: &str, seconds: u64) -> Result<()> {
    println!("Pending execution command:");
    println!("> {command}");
    println!("(actual command: [{SHELL}] [-c] [{command}])");

    let bar = ProgressBar::new(seconds);
    let style = ProgressStyle::with_template("Executing in {msg}  [{wide_bar:.yellow/blue}]")?
        .progress_chars("-Cco.");
    bar.set_style(style);

    for remaining in (1..=seconds).rev() {
        bar.set_message(format!("{remaining} seconds..."));
        tokio::time::sleep(Duration::from_secs(1)).await;
        bar.inc(1);
    }
    bar.finish_and_clear();

    Ok(())
}

/// Execute resolved alias command through the shell.
///
/// Standard streams are inherited, so interactive commands work.
pub async fn execute(command: &str) -> ExitCode {
    println!("Executing...");
    Launch::new(SHELL)
        .args(["-c", command])
        .propagate_exit_code()
        .run_direct()
        .await
}

/// Layer of indirection for host inspection.
pub trait Host: Toolbox {
    /// Check if systemd unit file exists for service.
    fn has_service_file(&self, service: &str) -> bool;

    /// Check if current user is root.
    fn is_root(&self) -> bool;

    /// Home directory of current user.
    fn home_dir(&self) -> Option<PathBuf>;

    /// Check if current directory is a Git repository.
    fn in_git_repo(&self) -> bool;
}

/// Inspect the current host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl Toolbox for SystemHost {
    fn has_binary(&self, name: &str) -> bool {
        SystemToolbox.has_binary(name)
    }

    fn probe(&self, tool: &OsStr, args: &[&str]) -> bool {
        SystemToolbox.probe(tool, args)
    }
}

impl Host for SystemHost {
    fn has_service_file(&self, service: &str) -> bool {
        Path::new("/etc/systemd/system")
            .join(format!("{service}.service"))
            .is_file()
    }

    fn is_root(&self) -> bool {
        ["USER", "LOGNAME"]
            .into_iter()
            .find_map(|key| std::env::var(key).ok())
            .is_some_and(|user| user == "root")
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn in_git_repo(&self) -> bool {
        Path::new(".git").exists()
    }
}

/// Sum size of files in directory tree.
///
/// Stops early once `stop_after` bytes are reached, unless it is zero.
fn dir_size(path: &Path, stop_after: u64) -> std::result::Result<u64, ignore::Error> {
    let mut size = 0;
    let walker = WalkBuilder::new(path)
        .standard_filters(false)
        .follow_links(false)
        .build();

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_some_and(|kind| kind.is_dir()) {
            continue;
        }

        size += entry.metadata()?.len();
        if stop_after > 0 && size >= stop_after {
            break;
        }
    }

    Ok(size)
}

fn strings<const N: usize>(words: [&str; N]) -> Vec<String> {
    words.into_iter().map(ToString::to_string).collect()
}

/// Alias error types.
#[derive(Debug, thiserror::Error)]
pub enum AliasError {
    /// Alias file cannot be read.
    #[error("failed to read alias file {:?}", path.display())]
    ReadAliasFile {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Alias file entry has no command.
    #[error("malformed alias file at line {0}, expect \"<alias><tab><command>\"")]
    Malformed(usize),

    /// Alias is not registered.
    #[error("alias '{0}' has not been registered before")]
    Unregistered(String),

    /// Alias resolves to nothing.
    #[error("alias '{0}' has empty command")]
    EmptyCommand(String),

    /// Confirmation prompt failed.
    #[error(transparent)]
    Prompt(#[from] inquire::InquireError),

    /// Answer cannot be read from standard input.
    #[error("failed to read answer from standard input")]
    ReadAnswer(#[source] std::io::Error),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = AliasError> = std::result::Result<T, E>;
