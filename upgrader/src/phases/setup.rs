//! Setup: transformation tool, workspace, clone and feature branch.

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::report::default_branch_name;
use crate::core::state::{RunState, validate_branch_name};
use crate::io::workspace::create_workspace;
use crate::phases::{PhaseSettings, Toolkit};

/// Every failure here is fatal; the controller removes a created workspace.
#[instrument(skip_all)]
pub fn run(state: &mut RunState, tools: &Toolkit<'_>, settings: &PhaseSettings) -> Result<()> {
    tools
        .transform
        .ensure_installed()
        .context("install transformation engine")?;
    state.flags.transform_tool_ready = true;

    let workspace = create_workspace(&settings.workspace)?;
    state.workspace = Some(workspace.clone());
    info!(workspace = %workspace.display(), "workspace ready");

    if state.branch.is_none() {
        let params = state.params();
        let derived =
            default_branch_name(params.target_version.as_deref(), &params.base_branch);
        validate_branch_name(&derived).context("derive feature branch name")?;
        state.branch = Some(derived);
    }
    let branch = state.branch_name()?.to_string();
    let params = state.params();

    tools
        .source_control
        .clone_repo(&params.repository_url, &workspace)
        .with_context(|| format!("clone {}", params.repository_url))?;
    tools
        .source_control
        .create_and_checkout_branch(&workspace, &branch, &params.base_branch)
        .with_context(|| format!("create feature branch {branch}"))?;

    info!(branch = %branch, "setup complete");
    state.flags.setup_complete = true;
    Ok(())
}
