// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::FileFixture;

use anyhow::Result;
use house_keeper::launch::{Environment, ExitCode, Launch, OutputSinks};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn captured_lines_reach_sinks_in_order() -> Result<()> {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let sinks = OutputSinks::new()
        .on_stdout(|line| out.push(line.to_string()))
        .on_stderr(|line| err.push(line.to_string()));

    let code = Launch::new("sh")
        .args(["-c", "printf 'one\\ntwo\\n'; printf 'oops\\n' >&2; printf 'three'"])
        .run_captured(sinks)
        .await;

    assert_eq!(code, ExitCode::SUCCESS);
    assert_eq!(out, vec!["one", "two", "three"]);
    assert_eq!(err, vec!["oops"]);

    Ok(())
}

#[tokio::test]
async fn sequential_launches_never_overlap() -> Result<()> {
    let fixture = FileFixture::new()?;
    let journal = fixture.path().join("journal");
    let script = format!(
        "echo begin >> '{0}'; sleep 0.2; echo end >> '{0}'",
        journal.display()
    );

    for _ in 0..3 {
        let code = Launch::new("sh")
            .args(["-c", script.as_str()])
            .run_captured(OutputSinks::new())
            .await;
        assert_eq!(code, ExitCode::SUCCESS);
    }

    assert_eq!(
        fixture.read("journal")?,
        "begin\nend\nbegin\nend\nbegin\nend\n"
    );

    Ok(())
}

#[tokio::test]
async fn exit_policies() -> Result<()> {
    let collapsed = Launch::new("sh").args(["-c", "exit 7"]).run_direct().await;
    assert_eq!(collapsed, ExitCode::FAILURE);

    let propagated = Launch::new("sh")
        .args(["-c", "exit 7"])
        .propagate_exit_code()
        .run_captured(OutputSinks::new())
        .await;
    assert_eq!(propagated.code(), 7);

    let missing = Launch::new("/nonexistent/house-keeper/tool")
        .propagate_exit_code()
        .run_direct()
        .await;
    assert_eq!(missing, ExitCode::FAILURE);

    Ok(())
}

#[tokio::test]
async fn child_runs_inside_working_directory_with_extra_env() -> Result<()> {
    let fixture = FileFixture::new()?;
    fixture.write("marker", "here")?;

    let mut out = Vec::new();
    let code = Launch::new("sh")
        .args(["-c", "cat marker; echo \" $HKD_EXTRA\""])
        .current_dir(fixture.path())
        .env(Environment::Extend(vec![("HKD_EXTRA".into(), "extra".into())]))
        .run_captured(OutputSinks::new().on_stdout(|line| out.push(line.to_string())))
        .await;

    assert_eq!(code, ExitCode::SUCCESS);
    assert_eq!(out, vec!["here extra"]);

    Ok(())
}
