//! Troubleshoot: ask for one corrective recipe based on the latest build errors.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::excerpt;
use crate::core::state::RunState;
use crate::io::advisory::FixRequest;
use crate::phases::{PhaseSettings, Toolkit};

/// Characters of the advisory's error analysis kept in the narrative.
const ANALYSIS_NOTE_CHARS: usize = 500;

/// Consumes an attempt on every entry, even when there is nothing to act on.
///
/// Never fails: an advisory error or an empty answer leaves the recipe set
/// unchanged for the next apply pass.
#[instrument(skip_all)]
pub fn run(state: &mut RunState, tools: &Toolkit<'_>, settings: &PhaseSettings) -> Result<()> {
    state.increment_attempt();
    let attempt = state.attempt;
    let max_attempts = state.params().max_attempts;
    info!(attempt, max_attempts, "troubleshooting");

    if state.build_errors.is_empty() {
        info!("no build errors to troubleshoot");
        return Ok(());
    }

    let errors = state.build_errors.join("\n");
    let request = FixRequest {
        model: state.params().model.clone(),
        build_errors: excerpt::tail(&errors, settings.error_excerpt_chars).to_string(),
        build_tool: state.build_tool,
        platform_version: state.platform_version.clone(),
        framework_version: state.framework_version.clone(),
    };

    match tools.advisor.propose_fix(&request) {
        Ok(fix) => {
            let analysis = excerpt::head(fix.analysis.trim(), ANALYSIS_NOTE_CHARS);
            if !analysis.is_empty() {
                state.note(format!("Attempt {attempt}/{max_attempts} analysis: {analysis}"));
            }
            match fix.recipe {
                Some(recipe) => {
                    let added = state.recipes.insert(recipe.as_str());
                    info!(recipe = %recipe, added, "fix recipe proposed");
                    state.note(format!(
                        "Attempt {attempt}/{max_attempts}: proposed fix recipe {recipe}"
                    ));
                }
                None => {
                    info!("fix proposal named no recipe");
                    state.note(format!(
                        "Attempt {attempt}/{max_attempts}: no fix recipe proposed"
                    ));
                }
            }
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "fix generation failed");
            state.note(format!(
                "Attempt {attempt}/{max_attempts}: fix generation failed: {err:#}"
            ));
        }
    }
    Ok(())
}
