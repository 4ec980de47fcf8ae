//! The six workflow phases.
//!
//! Each phase takes the run state by mutable reference and returns `Err` only
//! for failures that must end the run. Degraded outcomes are logged and
//! recorded in the narrative summary instead.

pub mod analysis;
pub mod apply;
pub mod finalize;
pub mod setup;
pub mod troubleshoot;
pub mod verify;

use crate::io::advisory::Advisor;
use crate::io::build::BuildSystem;
use crate::io::config::{UpgraderConfig, WorkspaceConfig};
use crate::io::git::SourceControl;
use crate::io::hosting::CodeHost;
use crate::io::rewrite::TransformEngine;

/// Collaborators available to every phase.
#[derive(Clone, Copy)]
pub struct Toolkit<'a> {
    pub source_control: &'a dyn SourceControl,
    pub transform: &'a dyn TransformEngine,
    pub build: &'a dyn BuildSystem,
    pub advisor: &'a dyn Advisor,
    pub code_host: &'a dyn CodeHost,
}

/// Knobs the phases read from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSettings {
    pub workspace: WorkspaceConfig,
    /// Leading characters of the manifest sent with the strategy request.
    pub manifest_excerpt_chars: usize,
    /// Trailing characters of build errors sent with a fix request.
    pub error_excerpt_chars: usize,
}

impl PhaseSettings {
    pub fn from_config(cfg: &UpgraderConfig) -> Self {
        Self {
            workspace: cfg.workspace.clone(),
            manifest_excerpt_chars: cfg.advisory.manifest_excerpt_chars,
            error_excerpt_chars: cfg.advisory.error_excerpt_chars,
        }
    }
}

impl Default for PhaseSettings {
    fn default() -> Self {
        Self::from_config(&UpgraderConfig::default())
    }
}
