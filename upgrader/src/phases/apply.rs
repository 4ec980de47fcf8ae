//! Apply changes: run every accumulated recipe against the workspace.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::state::RunState;
use crate::phases::{PhaseSettings, Toolkit};

/// Per-recipe outcome of one apply pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: Vec<String>,
    /// `(recipe, error)` for every recipe that failed.
    pub failed: Vec<(String, String)>,
}

/// Best effort: a failing recipe is recorded and the batch continues.
///
/// Recipes are never removed, so a later pass re-applies the whole set.
#[instrument(skip_all, fields(recipes = state.recipes.len()))]
pub fn run(
    state: &mut RunState,
    tools: &Toolkit<'_>,
    _settings: &PhaseSettings,
) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();
    if state.recipes.is_empty() {
        info!("no recipes to apply");
        return Ok(report);
    }
    let root = state.workspace()?.to_path_buf();

    for recipe in state.recipes.iter() {
        match tools.transform.apply(&root, recipe) {
            Ok(()) => report.applied.push(recipe.to_string()),
            Err(err) => {
                warn!(recipe, err = %format!("{err:#}"), "recipe failed");
                report.failed.push((recipe.to_string(), format!("{err:#}")));
            }
        }
    }

    for (recipe, err) in &report.failed {
        state.note(format!("Failed to apply recipe {recipe}: {err}"));
    }
    info!(
        applied = report.applied.len(),
        failed = report.failed.len(),
        "apply pass finished"
    );
    Ok(report)
}
