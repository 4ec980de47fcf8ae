//! Finalize: commit, push, open the change request, remove the workspace.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::report::{change_request_body, change_request_title, commit_message};
use crate::core::state::RunState;
use crate::io::hosting::ChangeRequest;
use crate::io::workspace::remove_workspace;
use crate::phases::{PhaseSettings, Toolkit};

/// Every step is attempted regardless of earlier outcomes; failures are
/// recorded in the summary. Workspace removal always runs last.
#[instrument(skip_all)]
pub fn run(state: &mut RunState, tools: &Toolkit<'_>, _settings: &PhaseSettings) -> Result<()> {
    let root = state.workspace()?.to_path_buf();
    let branch = state.branch_name()?.to_string();

    if state.flags.build_succeeded {
        state.note(format!(
            "Build succeeded after {} troubleshooting attempt(s).",
            state.attempt
        ));
    } else {
        state.note(format!(
            "Build still failing after {} of {} attempts; the change request needs manual fixes.",
            state.attempt,
            state.params().max_attempts
        ));
    }

    if let Err(err) = tools
        .source_control
        .commit_and_push(&root, &branch, &commit_message(state))
    {
        warn!(err = %format!("{err:#}"), "commit/push failed");
        state.note(format!("Commit/push failed: {err:#}"));
    }

    let request = ChangeRequest {
        repository_url: state.params().repository_url.clone(),
        base_branch: state.params().base_branch.clone(),
        head_branch: branch,
        title: change_request_title(
            &state.platform_version,
            &state.framework_version,
            state.params().target_version.as_deref(),
        ),
        body: change_request_body(state),
    };
    match tools.code_host.create_change_request(&request) {
        Ok(url) => {
            info!(url = %url, "change request created");
            state.change_request_url = url;
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "change request creation failed");
            state.note(format!("Pull request creation failed: {err:#}"));
        }
    }

    match remove_workspace(&root) {
        Ok(()) => state.workspace = None,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "workspace cleanup failed");
            state.note(format!("Workspace cleanup failed: {err:#}"));
        }
    }
    Ok(())
}
