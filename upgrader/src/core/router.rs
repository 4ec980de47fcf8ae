//! Post-verify routing and the phase transition table.
//!
//! The workflow graph has a single conditional edge (after verify) and a
//! single back-edge (troubleshoot -> apply changes):
//!
//! ```text
//! setup -> analysis -> apply_changes -> verify -> route
//!                           ^                        |-> troubleshoot -+
//!                           +------------------------------------------+
//!                                                    |-> finalize -> end
//! ```

use crate::core::state::RunState;
use crate::core::types::Phase;

/// Decision taken after each verify phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Troubleshoot,
    Finalize,
}

impl From<Route> for Phase {
    fn from(route: Route) -> Self {
        match route {
            Route::Troubleshoot => Phase::Troubleshoot,
            Route::Finalize => Phase::Finalize,
        }
    }
}

/// Pick the phase after verify.
///
/// A passing build always finalizes. A failing build finalizes once the
/// attempt counter reaches the bound; `flags.build_succeeded` stays false so
/// that terminal failure remains distinguishable from success.
pub fn route(state: &RunState) -> Route {
    if state.flags.build_succeeded || state.has_reached_max_attempts() {
        Route::Finalize
    } else {
        Route::Troubleshoot
    }
}

/// Transition table: the phase that follows `current`, or `None` once finalized.
pub fn next_phase(current: Phase, state: &RunState) -> Option<Phase> {
    match current {
        Phase::Setup => Some(Phase::Analysis),
        Phase::Analysis => Some(Phase::ApplyChanges),
        Phase::ApplyChanges => Some(Phase::Verify),
        Phase::Verify => Some(route(state).into()),
        Phase::Troubleshoot => Some(Phase::ApplyChanges),
        Phase::Finalize => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::RunParams;

    fn state(max_attempts: u32, attempt: u32, build_succeeded: bool) -> RunState {
        let mut params = RunParams::new("https://github.com/acme/demo", "main");
        params.max_attempts = max_attempts;
        let mut state = RunState::new(params).expect("state");
        state.attempt = attempt;
        state.flags.build_succeeded = build_succeeded;
        state
    }

    #[test]
    fn success_always_finalizes() {
        for attempt in 0..=3 {
            assert_eq!(route(&state(3, attempt, true)), Route::Finalize);
        }
    }

    #[test]
    fn failure_below_bound_troubleshoots() {
        assert_eq!(route(&state(3, 0, false)), Route::Troubleshoot);
        assert_eq!(route(&state(3, 2, false)), Route::Troubleshoot);
    }

    #[test]
    fn failure_at_bound_finalizes_without_success() {
        let s = state(2, 2, false);
        assert_eq!(route(&s), Route::Finalize);
        assert!(!s.flags.build_succeeded);
    }

    #[test]
    fn transition_table_has_one_back_edge() {
        let s = state(1, 0, false);
        assert_eq!(next_phase(Phase::Setup, &s), Some(Phase::Analysis));
        assert_eq!(next_phase(Phase::Analysis, &s), Some(Phase::ApplyChanges));
        assert_eq!(next_phase(Phase::ApplyChanges, &s), Some(Phase::Verify));
        assert_eq!(next_phase(Phase::Verify, &s), Some(Phase::Troubleshoot));
        assert_eq!(next_phase(Phase::Troubleshoot, &s), Some(Phase::ApplyChanges));
        assert_eq!(next_phase(Phase::Finalize, &s), None);
    }
}
