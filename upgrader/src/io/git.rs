//! Git adapter for the source-control collaborator.
//!
//! The controller only needs clone, branch and commit-and-push, so we keep a
//! small, explicit wrapper around `git` subprocess calls.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

/// Source-control operations consumed by the setup and finalize phases.
pub trait SourceControl {
    /// Clone `url` into `dest` (which must not exist or be empty).
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;

    /// Create `name` from the tip of `base` and check it out.
    fn create_and_checkout_branch(&self, repo: &Path, name: &str, base: &str) -> Result<()>;

    /// Stage every change, commit it, and push `branch` to `origin`.
    fn commit_and_push(&self, repo: &Path, branch: &str, message: &str) -> Result<()>;
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Create and checkout `branch` starting at `start_point`.
    #[instrument(skip_all, fields(branch, start_point))]
    pub fn checkout_new_branch(&self, branch: &str, start_point: &str) -> Result<()> {
        debug!(branch, start_point, "creating and checking out new branch");
        self.run_checked(&["checkout", "-b", branch, start_point])?;
        Ok(())
    }

    /// Stage all changes (respects .gitignore).
    pub fn add_all(&self) -> Result<()> {
        self.run_checked(&["add", "-A"])?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run(&["diff", "--cached", "--name-only"])?;
        Ok(!String::from_utf8_lossy(&out.stdout).trim().is_empty())
    }

    /// Commit staged changes with a message.
    ///
    /// If there are no staged changes, this returns Ok(false) and does nothing.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        debug!("committing staged changes");
        self.run_checked(&["commit", "-m", message])?;
        Ok(true)
    }

    /// Push `branch` to `origin` and record it as the upstream.
    #[instrument(skip_all, fields(branch))]
    pub fn push_upstream(&self, branch: &str) -> Result<()> {
        self.run_checked(&["push", "-u", "origin", branch])?;
        Ok(())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        check_output(args, output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        git_command()
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// `git` that fails instead of prompting for credentials on the terminal.
fn git_command() -> Command {
    let mut cmd = Command::new("git");
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd
}

fn check_output(args: &[&str], output: Output) -> Result<Output> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
    }
    Ok(output)
}

/// [`SourceControl`] backed by the `git` executable.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitSourceControl;

impl SourceControl for GitSourceControl {
    #[instrument(skip_all, fields(url, dest = %dest.display()))]
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        info!("cloning repository");
        let dest_str = dest
            .to_str()
            .ok_or_else(|| anyhow!("workspace path is not valid UTF-8: {}", dest.display()))?;
        let args = ["clone", "--quiet", url, dest_str];
        let output = git_command()
            .args(args)
            .output()
            .context("spawn git clone")?;
        check_output(&args, output)?;
        Ok(())
    }

    #[instrument(skip_all, fields(branch = name, base))]
    fn create_and_checkout_branch(&self, repo: &Path, name: &str, base: &str) -> Result<()> {
        let git = Git::new(repo);
        git.checkout_new_branch(name, &format!("origin/{base}"))
            .with_context(|| format!("create branch {name} from {base}"))?;
        info!("feature branch checked out");
        Ok(())
    }

    #[instrument(skip_all, fields(branch))]
    fn commit_and_push(&self, repo: &Path, branch: &str, message: &str) -> Result<()> {
        let git = Git::new(repo);
        git.add_all()?;
        if !git.commit_staged(message)? {
            return Err(anyhow!("no changes to commit"));
        }
        git.push_upstream(branch)
            .with_context(|| format!("push {branch}"))?;
        info!("changes committed and pushed");
        Ok(())
    }
}
