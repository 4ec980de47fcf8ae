//! State-machine driver for one upgrade run.
//!
//! The controller owns the [`RunState`], executes one phase at a time, and
//! asks the transition table for the next phase until finalize returns. The
//! only loop is the troubleshoot -> apply changes back-edge, bounded by
//! `max_attempts`.

use std::fmt;

use anyhow::Result;
use tracing::{error, info, instrument, warn};

use crate::core::router::next_phase;
use crate::core::state::{RunParams, RunState};
use crate::core::types::Phase;
use crate::io::workspace::remove_workspace;
use crate::phases::{self, PhaseSettings, Toolkit};

/// A phase failed in a way that ends the run.
///
/// Returned inside `anyhow::Error`; classify with `downcast_ref`.
#[derive(Debug)]
pub struct PhaseFailure {
    pub phase: Phase,
    /// Narrative summary accumulated before the failure.
    pub summary: String,
    source: anyhow::Error,
}

impl fmt::Display for PhaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} phase failed", self.phase)
    }
}

impl std::error::Error for PhaseFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Final state of a completed run plus the phases it went through.
#[derive(Debug)]
pub struct RunOutcome {
    pub state: RunState,
    pub visited: Vec<Phase>,
}

impl RunOutcome {
    pub fn build_succeeded(&self) -> bool {
        self.state.flags.build_succeeded
    }

    pub fn visits(&self, phase: Phase) -> usize {
        self.visited.iter().filter(|p| **p == phase).count()
    }
}

/// Run the whole workflow to termination.
///
/// Parameter validation errors and fatal phase failures ([`PhaseFailure`])
/// are returned as `Err`. Exhausting the attempt bound is a normal outcome
/// with `build_succeeded() == false`.
#[instrument(skip_all, fields(repository = %params.repository_url, base = %params.base_branch))]
pub fn run_upgrade(
    params: RunParams,
    tools: &Toolkit<'_>,
    settings: &PhaseSettings,
) -> Result<RunOutcome> {
    let mut state = RunState::new(params)?;
    let mut visited = Vec::new();
    let mut phase = Phase::Setup;

    loop {
        info!(phase = %phase, attempt = state.attempt, "entering phase");
        visited.push(phase);

        if let Err(source) = run_phase(phase, &mut state, tools, settings) {
            error!(phase = %phase, err = %format!("{source:#}"), "fatal phase failure");
            discard_workspace(&mut state);
            return Err(PhaseFailure {
                phase,
                summary: state.summary,
                source,
            }
            .into());
        }

        match next_phase(phase, &state) {
            Some(next) => {
                if phase == Phase::Verify {
                    info!(
                        route = %next,
                        build_succeeded = state.flags.build_succeeded,
                        attempt = state.attempt,
                        max_attempts = state.params().max_attempts,
                        "routing after verify"
                    );
                }
                phase = next;
            }
            None => break,
        }
    }

    info!(
        build_succeeded = state.flags.build_succeeded,
        attempts = state.attempt,
        change_request = %state.change_request_url,
        "run finished"
    );
    Ok(RunOutcome { state, visited })
}

fn run_phase(
    phase: Phase,
    state: &mut RunState,
    tools: &Toolkit<'_>,
    settings: &PhaseSettings,
) -> Result<()> {
    match phase {
        Phase::Setup => phases::setup::run(state, tools, settings),
        Phase::Analysis => phases::analysis::run(state, tools, settings),
        Phase::ApplyChanges => phases::apply::run(state, tools, settings).map(|_| ()),
        Phase::Verify => phases::verify::run(state, tools, settings),
        Phase::Troubleshoot => phases::troubleshoot::run(state, tools, settings),
        Phase::Finalize => phases::finalize::run(state, tools, settings),
    }
}

/// Best-effort removal of the workspace after a fatal failure.
fn discard_workspace(state: &mut RunState) {
    let Some(path) = state.workspace.take() else {
        return;
    };
    if let Err(err) = remove_workspace(&path) {
        warn!(err = %format!("{err:#}"), "workspace cleanup failed");
        state.note(format!("Workspace cleanup failed: {err:#}"));
    }
}
