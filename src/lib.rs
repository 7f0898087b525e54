// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! House-keeping toolkit for servers.
//!
//! House-keeper bundles the chores an operator repeats on a server: backing
//! up databases, moving files around with rsync, checksumming backups,
//! following service logs, and running handy command aliases. Every chore is
//! delegated to a standard system utility through the [`launch`] module.

pub mod alias;
pub mod config;
pub mod db;
pub mod files;
pub mod gen;
pub mod launch;
pub mod path;
pub mod release;
pub mod secret;
pub mod tools;
