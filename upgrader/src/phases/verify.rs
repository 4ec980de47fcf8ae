//! Verify: build and test the workspace.

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument, warn};

use crate::core::state::RunState;
use crate::core::types::{BuildResult, BuildToolKind};
use crate::phases::{PhaseSettings, Toolkit};

/// Clears the previous errors, runs the build, and records the outcome.
///
/// An unrecognized build tool is fatal; a failing build is not.
#[instrument(skip_all, fields(build_tool = %state.build_tool))]
pub fn run(state: &mut RunState, tools: &Toolkit<'_>, _settings: &PhaseSettings) -> Result<()> {
    state.clear_build_errors();
    if state.build_tool == BuildToolKind::Unknown {
        return Err(anyhow!("cannot verify: build tool is unknown"));
    }
    let root = state.workspace()?.to_path_buf();

    let result = tools
        .build
        .build_and_test(&root, state.build_tool)
        .context("run build")?;
    state.flags.build_succeeded = result.success;

    if result.success {
        info!("build succeeded");
        return Ok(());
    }
    match error_text(&result) {
        Some(text) => state.add_build_error(text),
        None => warn!(exit_code = ?result.exit_code, "build failed without error output"),
    }
    info!(
        exit_code = ?result.exit_code,
        timed_out = result.timed_out,
        errors = state.build_errors.len(),
        "build failed"
    );
    Ok(())
}

/// Error output of a failed build.
///
/// Stderr when it has content; otherwise the `[ERROR]` lines Maven writes to
/// stdout.
pub fn error_text(result: &BuildResult) -> Option<String> {
    if !result.stderr.trim().is_empty() {
        return Some(result.stderr.clone());
    }
    let lines: Vec<&str> = result
        .stdout
        .lines()
        .filter(|line| line.contains("[ERROR]"))
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_stderr() {
        let result = BuildResult {
            stdout: "[ERROR] from stdout".to_string(),
            ..BuildResult::failure("boom")
        };
        assert_eq!(error_text(&result).as_deref(), Some("boom"));
    }

    #[test]
    fn falls_back_to_maven_error_lines() {
        let result = BuildResult {
            stdout: "[INFO] Building demo\n[ERROR] cannot find symbol\n[INFO] done\n[ERROR] BUILD FAILURE"
                .to_string(),
            ..BuildResult::failure("  \n")
        };
        assert_eq!(
            error_text(&result).as_deref(),
            Some("[ERROR] cannot find symbol\n[ERROR] BUILD FAILURE")
        );
    }

    #[test]
    fn nothing_to_report() {
        let result = BuildResult {
            stdout: "[INFO] quiet".to_string(),
            ..BuildResult::failure("")
        };
        assert_eq!(error_text(&result), None);
    }
}
