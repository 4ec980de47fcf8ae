//! Run parameters and the mutable run state threaded through every phase.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use serde::Serialize;

use crate::core::recipes::RecipeSet;
use crate::core::types::{BuildToolKind, UNKNOWN_VERSION};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Validated input for a single upgrade run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunParams {
    /// Source-control URL of the repository to upgrade.
    pub repository_url: String,
    /// Branch the upgrade starts from and the change request targets.
    pub base_branch: String,
    /// Desired Java or Spring Boot version, free-form.
    pub target_version: Option<String>,
    /// Advisory-service model identifier.
    pub model: String,
    /// Upper bound on troubleshooting passes.
    pub max_attempts: u32,
    /// Feature branch name; derived during setup when absent.
    pub feature_branch: Option<String>,
}

impl RunParams {
    pub fn new(repository_url: impl Into<String>, base_branch: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            base_branch: base_branch.into(),
            target_version: None,
            model: DEFAULT_MODEL.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            feature_branch: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.repository_url.trim().is_empty() {
            return Err(anyhow!("repository url must not be empty"));
        }
        if self.base_branch.trim().is_empty() {
            return Err(anyhow!("base branch must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(anyhow!("advisory model must not be empty"));
        }
        if self.max_attempts == 0 {
            return Err(anyhow!("max attempts must be >= 1"));
        }
        if let Some(branch) = &self.feature_branch {
            validate_branch_name(branch)?;
            if branch == self.base_branch.trim() {
                return Err(anyhow!(
                    "feature branch must differ from the base branch ('{branch}')"
                ));
            }
        }
        Ok(())
    }
}

/// Validate that `name` is usable as a git branch name.
pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(anyhow!("branch name must not be empty"));
    }
    if name
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/')))
    {
        return Err(anyhow!(
            "branch name must be [A-Za-z0-9._/-] only (got '{name}')"
        ));
    }
    if name.starts_with(['-', '/', '.'])
        || name.ends_with(['/', '.'])
        || name.ends_with(".lock")
        || name.contains("..")
        || name.contains("//")
    {
        return Err(anyhow!("'{name}' is not a valid git branch name"));
    }
    Ok(())
}

/// Advisory bookkeeping about which phases completed.
///
/// Only `build_succeeded` feeds transition decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseFlags {
    pub setup_complete: bool,
    pub analysis_complete: bool,
    pub transform_tool_ready: bool,
    pub build_succeeded: bool,
}

/// Mutable record owned by the controller for the lifetime of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunState {
    params: RunParams,
    /// Feature branch, set from the parameters or derived during setup.
    pub branch: Option<String>,
    /// Number of troubleshooting passes entered so far.
    pub attempt: u32,
    pub recipes: RecipeSet,
    /// Errors captured by the most recent verify phase only.
    pub build_errors: Vec<String>,
    /// Local checkout; `None` until setup creates it and after finalize deletes it.
    pub workspace: Option<PathBuf>,
    pub build_tool: BuildToolKind,
    pub platform_version: String,
    pub framework_version: String,
    /// Locator of the created change request, empty until finalize succeeds.
    pub change_request_url: String,
    /// Human-readable report. Only ever appended to.
    pub summary: String,
    pub flags: PhaseFlags,
}

impl RunState {
    pub fn new(mut params: RunParams) -> Result<Self> {
        params.validate()?;
        params.repository_url = params.repository_url.trim().to_string();
        params.base_branch = params.base_branch.trim().to_string();
        params.target_version = params
            .target_version
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let branch = params.feature_branch.clone();
        Ok(Self {
            params,
            branch,
            attempt: 0,
            recipes: RecipeSet::new(),
            build_errors: Vec::new(),
            workspace: None,
            build_tool: BuildToolKind::Unknown,
            platform_version: UNKNOWN_VERSION.to_string(),
            framework_version: UNKNOWN_VERSION.to_string(),
            change_request_url: String::new(),
            summary: String::new(),
            flags: PhaseFlags::default(),
        })
    }

    pub fn params(&self) -> &RunParams {
        &self.params
    }

    /// Target version hint, or `"latest"` when none was given.
    pub fn target_label(&self) -> &str {
        self.params.target_version.as_deref().unwrap_or("latest")
    }

    pub fn workspace(&self) -> Result<&Path> {
        self.workspace
            .as_deref()
            .ok_or_else(|| anyhow!("workspace not created (setup has not run)"))
    }

    pub fn branch_name(&self) -> Result<&str> {
        self.branch
            .as_deref()
            .ok_or_else(|| anyhow!("feature branch not set (setup has not run)"))
    }

    pub fn increment_attempt(&mut self) {
        self.attempt += 1;
    }

    pub fn has_reached_max_attempts(&self) -> bool {
        self.attempt >= self.params.max_attempts
    }

    pub fn clear_build_errors(&mut self) {
        self.build_errors.clear();
    }

    pub fn add_build_error(&mut self, error: impl Into<String>) {
        self.build_errors.push(error.into());
    }

    /// Append a line (or block) to the narrative summary.
    pub fn note(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref().trim_end();
        if text.is_empty() {
            return;
        }
        if !self.summary.is_empty() {
            self.summary.push('\n');
        }
        self.summary.push_str(text);
    }
}
