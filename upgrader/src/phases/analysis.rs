//! Analysis: build tool, current versions and the upgrade strategy.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::excerpt;
use crate::core::state::RunState;
use crate::core::versions::extract_versions;
use crate::io::advisory::StrategyRequest;
use crate::io::build::read_manifest;
use crate::phases::{PhaseSettings, Toolkit};

/// Fails only when no build manifest is recognized (or cannot be read).
///
/// An advisory failure degrades the run: it is noted in the summary and the
/// recipe set stays as it was.
#[instrument(skip_all)]
pub fn run(state: &mut RunState, tools: &Toolkit<'_>, settings: &PhaseSettings) -> Result<()> {
    let root = state.workspace()?.to_path_buf();
    let kind = tools
        .build
        .detect_kind(&root)
        .context("detect build tool")?;
    state.build_tool = kind;

    let manifest = read_manifest(&root, kind).context("read build manifest")?;
    let versions = extract_versions(kind, &manifest);
    info!(
        build_tool = %kind,
        platform = %versions.platform,
        framework = %versions.framework,
        "project analyzed"
    );
    state.platform_version = versions.platform;
    state.framework_version = versions.framework;

    let request = StrategyRequest {
        model: state.params().model.clone(),
        build_tool: kind,
        platform_version: state.platform_version.clone(),
        framework_version: state.framework_version.clone(),
        target_version: state.params().target_version.clone(),
        manifest_excerpt: excerpt::head(&manifest, settings.manifest_excerpt_chars).to_string(),
    };
    match tools.advisor.propose_strategy(&request) {
        Ok(strategy) => {
            let added = state.recipes.extend(strategy.recipes.iter());
            info!(added, total = state.recipes.len(), "upgrade strategy received");
            state.note(strategy.narrative);
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "strategy creation failed, continuing without a plan");
            state.note(format!("Strategy creation failed: {err:#}"));
        }
    }

    state.flags.analysis_complete = true;
    Ok(())
}
