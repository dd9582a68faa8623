use std::path::Path;
use std::process::{Command, Output};

use anyhow::{Context, Result};

pub(crate) fn base_git_command() -> Command {
    let mut command = Command::new("git");
    command
        .arg("-c")
        .arg("core.autocrlf=false")
        .arg("-c")
        .arg("core.eol=lf");
    if cfg!(windows) {
        command.arg("-c").arg("core.longpaths=true");
    }
    command
}

fn run_git(repo_root: &Path, args: &[&str]) -> Result<Output> {
    base_git_command()
        .args(args)
        .current_dir(repo_root)
        .output()
        .with_context(|| {
            format!(
                "failed launching git {} in {}",
                args.join(" "),
                repo_root.display()
            )
        })
}

pub(crate) fn run_git_command(repo_root: &Path, args: &[&str]) -> Result<()> {
    let output = run_git(repo_root, args)?;
    if !output.status.success() {
        anyhow::bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

pub(crate) fn git_stdout(repo_root: &Path, args: &[&str]) -> Result<String> {
    let output = run_git(repo_root, args)?;
    if !output.status.success() {
        anyhow::bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let stdout = String::from_utf8(output.stdout)
        .with_context(|| format!("git {} produced non-UTF-8 output", args.join(" ")))?;
    Ok(stdout.trim().to_string())
}
