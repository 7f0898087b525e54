// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::FileFixture;

use anyhow::Result;
use pretty_assertions::assert_eq;
use std::{
    io::Write,
    process::{Command, Output, Stdio},
};

/// Run hkd isolated from operator's home and settings.
fn hkd(fixture: &FileFixture, args: &[&str], stdin: &str) -> Result<Output> {
    let mut child = Command::new(env!("CARGO_BIN_EXE_hkd"))
        .args(args)
        .env("HOME", fixture.path())
        .env("XDG_CONFIG_HOME", fixture.path().join(".config"))
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(mut input) = child.stdin.take() {
        input.write_all(stdin.as_bytes())?;
    }

    Ok(child.wait_with_output()?)
}

#[test]
fn checksum_echoes_each_line_once() -> Result<()> {
    let fixture = FileFixture::new()?;
    let first = fixture.write("first", "1")?;
    let second = fixture.write("second", "2")?;
    let working_dir = fixture.path().to_string_lossy().into_owned();

    let output = hkd(
        &fixture,
        &[
            "files",
            "checksum",
            "--working-dir",
            working_dir.as_str(),
            "--tool-file",
            "/bin/echo",
            "first",
            "second",
        ],
        "",
    )?;

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        String::from_utf8(output.stdout)?,
        format!("{}\n{}\n", first.display(), second.display())
    );

    Ok(())
}

#[test]
fn alias_reads_piped_confirmation() -> Result<()> {
    let fixture = FileFixture::new()?;
    fixture.write(".hkd_alias", "hello\techo hi-from-alias\n")?;

    let output = hkd(&fixture, &["a", "hello"], "y\n")?;
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Executing..."));
    assert!(stdout.ends_with("hi-from-alias\n"));

    Ok(())
}

#[test]
fn alias_declined_aborts_with_failure() -> Result<()> {
    let fixture = FileFixture::new()?;
    fixture.write(".hkd_alias", "hello\techo hi-from-alias\n")?;

    let output = hkd(&fixture, &["a", "hello"], "n\n")?;
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("Aborted"));
    assert!(!stdout.contains("Executing..."));

    let output = hkd(&fixture, &["a", "hello"], "maybe\n")?;
    assert_eq!(output.status.code(), Some(1));
    assert!(!String::from_utf8(output.stdout)?.contains("Executing..."));

    Ok(())
}
