// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration snippet generators.

use std::fmt::Write as _;

/// Generate sudoers snippet that lets user manage a service.
///
/// User `statd` may additionally read firewall status, and user `bots` may
/// additionally reboot or shut down the server.
pub fn visudo(service: &str, user: &str) -> String {
    let mut out = format!("# Allow user '{user}' to manage '{service}' service\n");
    for action in ["start", "stop", "restart", "enable", "disable", "status"] {
        let _ = writeln!(out, "{user} ALL= NOPASSWD: /usr/bin/systemctl {action} {service}");
    }
    let _ = writeln!(out, "{user} ALL= NOPASSWD: /usr/bin/journalctl");

    match user {
        "statd" => {
            let _ = write!(
                out,
                "\n# Allow user '{user}' to get current firewall status\n\
                 {user} ALL= NOPASSWD: /usr/sbin/ufw status\n"
            );
        }
        "bots" => {
            let _ = write!(
                out,
                "\n# Allow user '{user}' to restart/shutdown server\n\
                 {user} ALL= NOPASSWD: /usr/sbin/reboot\n\
                 {user} ALL= NOPASSWD: /usr/sbin/shutdown now\n"
            );
        }
        _ => {}
    }

    out
}

/// Name of current user.
///
/// # Errors
///
/// - Return [`GenError::UnknownUser`] if neither `USER` nor `LOGNAME` is set.
pub fn current_user() -> Result<String> {
    ["USER", "LOGNAME"]
        .into_iter()
        .find_map(|key| std::env::var(key).ok())
        .map(|user| user.trim().to_string())
        .filter(|user| !user.is_empty())
        .ok_or(GenError::UnknownUser)
}

/// Generator error types.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    /// Current user cannot be determined.
    #[error("failed to get current user, supply user name explicitly")]
    UnknownUser,
}

/// Friendly result alias :3
pub type Result<T, E = GenError> = std::result::Result<T, E>;
