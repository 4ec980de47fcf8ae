//! Shared deterministic types for the upgrade controller.
//!
//! These types are the stable vocabulary between phases, the router and the
//! collaborator adapters. They carry no I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel stored when a version cannot be determined from the manifest.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Build tooling detected in the checkout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildToolKind {
    Maven,
    Gradle,
    #[default]
    Unknown,
}

impl BuildToolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildToolKind::Maven => "maven",
            BuildToolKind::Gradle => "gradle",
            BuildToolKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BuildToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured outcome of one build/test invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// Exit status, `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// The build runner gave up waiting and killed the process.
    pub timed_out: bool,
}

impl BuildResult {
    /// A failed build whose only diagnostic is `stderr`.
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stderr: stderr.into(),
            ..Self::default()
        }
    }
}

/// Workflow phases driven by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    Analysis,
    ApplyChanges,
    Verify,
    Troubleshoot,
    Finalize,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Analysis => "analysis",
            Phase::ApplyChanges => "apply_changes",
            Phase::Verify => "verify",
            Phase::Troubleshoot => "troubleshoot",
            Phase::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_tool_kind_serializes_lowercase() {
        let json = serde_json::to_string(&BuildToolKind::Gradle).expect("serialize");
        assert_eq!(json, "\"gradle\"");
        assert_eq!(BuildToolKind::default(), BuildToolKind::Unknown);
    }

    #[test]
    fn phase_display_matches_serde_name() {
        let json = serde_json::to_string(&Phase::ApplyChanges).expect("serialize");
        assert_eq!(json, format!("\"{}\"", Phase::ApplyChanges));
    }
}
