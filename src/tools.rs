// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External tool discovery.
//!
//! House-keeper never reimplements what standard system utilities already
//! do. Thus, before a command can do any real work it must figure out which
//! tools are available on the host, and which binary to actually launch.

use crate::path;

use std::{
    ffi::OsStr,
    path::PathBuf,
    process::{Command, Stdio},
};
use tracing::{debug, instrument};

/// Mandatory tools probed by tool verification.
///
/// Each entry lists alternatives where any single one is enough, and the
/// arguments used to probe them.
const MANDATORY_TOOLS: &[&[(&str, &[&str])]] = &[
    &[("pg_dump", &["--help"])],
    &[("rsync", &["--help"])],
    &[("sshpass", &["-V"])],
    &[("sha1sum", &["--version"]), ("shasum", &["--version"])],
];

/// Optional tools with install hints.
const OPTIONAL_TOOLS: &[(&str, &str)] = &[
    ("telnet", "sudo apt install telnet -y"),
    ("htop", "sudo apt install htop -y"),
    ("screen", "sudo apt install screen -y"),
    ("wget", "sudo apt install wget -y"),
    ("jq", "sudo apt install jq -y"),
    ("lz4", "sudo apt install snapd -y && sudo snap install lz4"),
    ("psql", "sudo apt install postgresql-client"),
];

/// Layer of indirection for probing host tools.
pub trait Toolbox {
    /// Check if binary can be found on `PATH`.
    fn has_binary(&self, name: &str) -> bool;

    /// Run tool silently and check if it exits successfully.
    fn probe(&self, tool: &OsStr, args: &[&str]) -> bool;

    /// Check if sshpass is usable.
    fn has_sshpass(&self) -> bool {
        self.probe(OsStr::new("sshpass"), &["-V"])
    }

    /// Select available SHA-1 checksum tool.
    ///
    /// Prefers `sha1sum`, falls back to `shasum`.
    ///
    /// # Errors
    ///
    /// - Return [`ToolError::NoChecksumTool`] if neither tool is usable.
    fn checksum_tool(&self) -> Result<PathBuf> {
        ["sha1sum", "shasum"]
            .into_iter()
            .find(|tool| self.probe(OsStr::new(tool), &["--version"]))
            .map(PathBuf::from)
            .ok_or(ToolError::NoChecksumTool)
    }
}

/// Tool probing on the current host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemToolbox;

impl Toolbox for SystemToolbox {
    fn has_binary(&self, name: &str) -> bool {
        which::which(name).is_ok()
    }

    #[instrument(skip(self), level = "debug")]
    fn probe(&self, tool: &OsStr, args: &[&str]) -> bool {
        let status = Command::new(tool)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) => status.success(),
            Err(err) => {
                debug!("probe of {tool:?} failed: {err}");
                false
            }
        }
    }
}

/// Resolve tool to launch.
///
/// A custom tool path supplied by the user takes precedence over the default
/// tool name, but must exist. Custom paths are shell expanded.
///
/// # Errors
///
/// - Return [`ToolError::CustomToolMissing`] if custom tool does not exist.
/// - Return [`ToolError::Path`] if custom tool path cannot be expanded.
pub fn resolve_tool(custom: Option<&str>, default: &str) -> Result<PathBuf> {
    match custom.map(str::trim).filter(|custom| !custom.is_empty()) {
        Some(custom) => {
            let tool = path::expand(custom)?;
            if !tool.exists() {
                return Err(ToolError::CustomToolMissing(tool));
            }

            Ok(tool)
        }
        None => Ok(PathBuf::from(default)),
    }
}

/// Result of tool verification.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ToolReport {
    /// Mandatory tools that might not exist.
    pub missing_mandatory: Vec<String>,

    /// Optional tools that might not exist along with install hint.
    pub missing_optional: Vec<(String, String)>,
}

impl ToolReport {
    /// Check if all mandatory tools were found.
    pub fn is_ok(&self) -> bool {
        self.missing_mandatory.is_empty()
    }
}

/// Verify that tools used by house-keeper are installed.
pub fn verify_tools(toolbox: &impl Toolbox) -> ToolReport {
    let mut report = ToolReport::default();

    for alternatives in MANDATORY_TOOLS {
        let found = alternatives
            .iter()
            .any(|(tool, args)| toolbox.probe(OsStr::new(tool), args));
        if !found {
            let names = alternatives.iter().map(|(tool, _)| *tool).collect::<Vec<_>>();
            report.missing_mandatory.push(names.join(" or "));
        }
    }

    for (tool, hint) in OPTIONAL_TOOLS {
        if !toolbox.has_binary(tool) {
            report
                .missing_optional
                .push((tool.to_string(), hint.to_string()));
        }
    }
    report.missing_optional.sort();

    report
}

/// Tool discovery error types.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Custom tool file does not exist.
    #[error("custom tool file does not exist: {}", .0.display())]
    CustomToolMissing(PathBuf),

    /// No checksum tool is available.
    #[error("require at least either tools sha1sum or shasum")]
    NoChecksumTool,

    /// Path of tool could not be resolved.
    #[error(transparent)]
    Path(#[from] crate::path::PathError),
}

/// Friendly result alias :3
pub type Result<T, E = ToolError> = std::result::Result<T, E>;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    /// Fake toolbox that knows a fixed set of tools.
    #[derive(Debug, Default, Clone)]
    pub(crate) struct FakeToolbox {
        pub(crate) tools: HashSet<String>,
    }

    impl FakeToolbox {
        pub(crate) fn with(tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
            Self {
                tools: tools.into_iter().map(Into::into).collect(),
            }
        }
    }

    impl Toolbox for FakeToolbox {
        fn has_binary(&self, name: &str) -> bool {
            self.tools.contains(name)
        }

        fn probe(&self, tool: &OsStr, _args: &[&str]) -> bool {
            self.tools.contains(tool.to_string_lossy().as_ref())
        }
    }

    #[test]
    fn checksum_tool_prefers_sha1sum() -> anyhow::Result<()> {
        let toolbox = FakeToolbox::with(["sha1sum", "shasum"]);
        assert_eq!(toolbox.checksum_tool()?, PathBuf::from("sha1sum"));

        let toolbox = FakeToolbox::with(["shasum"]);
        assert_eq!(toolbox.checksum_tool()?, PathBuf::from("shasum"));

        let toolbox = FakeToolbox::default();
        assert!(matches!(
            toolbox.checksum_tool(),
            Err(ToolError::NoChecksumTool)
        ));

        Ok(())
    }

    #[test]
    fn verify_tools_reports_missing() {
        let toolbox = FakeToolbox::with(["rsync", "shasum", "jq", "htop", "telnet", "screen"]);
        let report = verify_tools(&toolbox);

        assert!(!report.is_ok());
        assert_eq!(report.missing_mandatory, vec!["pg_dump", "sshpass"]);
        assert_eq!(
            report.missing_optional,
            vec![
                (
                    "lz4".to_string(),
                    "sudo apt install snapd -y && sudo snap install lz4".to_string()
                ),
                ("psql".to_string(), "sudo apt install postgresql-client".to_string()),
                ("wget".to_string(), "sudo apt install wget -y".to_string()),
            ]
        );
    }

    #[test]
    fn verify_tools_all_mandatory_present() {
        let toolbox = FakeToolbox::with(["pg_dump", "rsync", "sshpass", "sha1sum"]);
        assert!(verify_tools(&toolbox).is_ok());

        let toolbox = FakeToolbox::with(["pg_dump", "rsync", "sshpass"]);
        assert_eq!(verify_tools(&toolbox).missing_mandatory, vec!["sha1sum or shasum"]);
    }

    #[test]
    fn resolve_custom_tool() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let tool = dir.path().join("rsync");
        std::fs::write(&tool, "")?;

        assert_eq!(resolve_tool(None, "rsync")?, PathBuf::from("rsync"));
        assert_eq!(resolve_tool(Some("  "), "rsync")?, PathBuf::from("rsync"));
        assert_eq!(resolve_tool(tool.to_str(), "rsync")?, tool);
        assert!(matches!(
            resolve_tool(Some("/nonexistent/rsync"), "rsync"),
            Err(ToolError::CustomToolMissing(_))
        ));

        Ok(())
    }

    #[test]
    fn system_toolbox_probes_real_binaries() {
        let toolbox = SystemToolbox;
        assert!(toolbox.has_binary("sh"));
        assert!(toolbox.probe(OsStr::new("true"), &[]));
        assert!(!toolbox.probe(OsStr::new("false"), &[]));
        assert!(!toolbox.probe(OsStr::new("/nonexistent/house-keeper/tool"), &[]));
    }
}
