// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::FileFixture;

use anyhow::Result;
use house_keeper::{
    files::checksum::{sentinel_path, ChecksumRequest},
    launch::ExitCode,
    tools::{SystemToolbox, Toolbox},
};
use pretty_assertions::assert_eq;

const HELLO_SHA1: &str = "f572d396fae9206628714fb2ce00f72e94f2258f";

#[tokio::test]
async fn checksum_caches_and_trusts_sentinels() -> Result<()> {
    let fixture = FileFixture::new()?;
    let first = fixture.write("first.txt", "hello\n")?;
    let second = fixture.write("second.txt", "hello\n")?;

    let request = ChecksumRequest {
        files: vec!["first.txt".into(), "second.txt".into()],
        tool: SystemToolbox.checksum_tool()?,
        working_dir: fixture.path().to_path_buf(),
        output_file: Some("sums.txt".into()),
        cache_and_trust: true,
    };

    assert_eq!(request.run().await?, ExitCode::SUCCESS);

    let output = fixture.read("sums.txt")?;
    let lines = output.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|line| line.starts_with(HELLO_SHA1)));
    assert!(std::fs::read_to_string(sentinel_path(&first))?.starts_with(HELLO_SHA1));
    assert!(std::fs::read_to_string(sentinel_path(&second))?.starts_with(HELLO_SHA1));

    // Tampered sentinel proves the tool is skipped.
    std::fs::write(sentinel_path(&first), "trusted  first.txt\n")?;
    assert_eq!(request.run().await?, ExitCode::SUCCESS);

    let output = fixture.read("sums.txt")?;
    let lines = output.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[2], "trusted  first.txt");
    assert!(lines[3].starts_with(HELLO_SHA1));

    Ok(())
}

#[tokio::test]
async fn checksum_without_cache_leaves_no_sentinel() -> Result<()> {
    let fixture = FileFixture::new()?;
    let file = fixture.write("data.txt", "hello\n")?;

    let request = ChecksumRequest {
        files: vec![file.clone()],
        tool: SystemToolbox.checksum_tool()?,
        working_dir: fixture.path().to_path_buf(),
        output_file: None,
        cache_and_trust: false,
    };

    assert_eq!(request.run().await?, ExitCode::SUCCESS);
    assert!(!sentinel_path(&file).exists());

    Ok(())
}
