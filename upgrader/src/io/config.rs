//! Upgrader configuration stored in `upgrader.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "upgrader.toml";

/// Upgrader configuration (TOML).
///
/// Every section is optional; missing fields fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpgraderConfig {
    pub advisory: AdvisoryConfig,
    pub hosting: HostingConfig,
    pub rewrite: RewriteConfig,
    pub build: BuildConfig,
    pub workspace: WorkspaceConfig,
}

/// OpenAI-compatible advisory service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// Base URL; `/v1/chat/completions` is appended.
    pub endpoint: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f64,
    pub timeout_secs: u64,
    /// Characters of the build manifest sent with the strategy request.
    pub manifest_excerpt_chars: usize,
    /// Characters of build error text sent with a fix request (tail kept).
    pub error_excerpt_chars: usize,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.1,
            timeout_secs: 120,
            manifest_excerpt_chars: 2_000,
            error_excerpt_chars: 8_000,
        }
    }
}

/// Code-hosting service (GitHub REST API).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HostingConfig {
    pub api_base: String,
    /// Environment variable holding the API token.
    pub token_env: String,
    pub timeout_secs: u64,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            timeout_secs: 60,
        }
    }
}

/// OpenRewrite CLI installation and invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RewriteConfig {
    /// Executable name or path.
    pub command: String,
    /// Archive fetched when the executable cannot be resolved.
    pub download_url: String,
    /// Where a downloaded CLI is installed (default `~/.local/bin`).
    pub install_dir: Option<PathBuf>,
    /// Per-recipe wall-clock limit.
    pub apply_timeout_secs: u64,
    pub output_limit_bytes: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            command: "rewrite".to_string(),
            download_url:
                "https://github.com/openrewrite/rewrite-cli/releases/latest/download/rewrite-cli.zip"
                    .to_string(),
            install_dir: None,
            apply_timeout_secs: 30 * 60,
            output_limit_bytes: 200_000,
        }
    }
}

impl RewriteConfig {
    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs)
    }
}

/// Build/test invocation limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BuildConfig {
    pub timeout_secs: u64,
    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60 * 60,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl BuildConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where per-run checkouts are created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub prefix: String,
    /// Parent directory; the system temp dir when unset.
    pub parent_dir: Option<PathBuf>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            prefix: "upgrade_agent_".to_string(),
            parent_dir: None,
        }
    }
}

impl UpgraderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.advisory.endpoint.trim().is_empty() {
            return Err(anyhow!("advisory.endpoint must not be empty"));
        }
        if self.advisory.timeout_secs == 0 {
            return Err(anyhow!("advisory.timeout_secs must be > 0"));
        }
        if self.advisory.manifest_excerpt_chars == 0 {
            return Err(anyhow!("advisory.manifest_excerpt_chars must be > 0"));
        }
        if self.advisory.error_excerpt_chars == 0 {
            return Err(anyhow!("advisory.error_excerpt_chars must be > 0"));
        }
        if !(0.0..=2.0).contains(&self.advisory.temperature) {
            return Err(anyhow!("advisory.temperature must be within 0.0..=2.0"));
        }
        if self.hosting.api_base.trim().is_empty() {
            return Err(anyhow!("hosting.api_base must not be empty"));
        }
        if self.hosting.timeout_secs == 0 {
            return Err(anyhow!("hosting.timeout_secs must be > 0"));
        }
        if self.rewrite.command.trim().is_empty() {
            return Err(anyhow!("rewrite.command must not be empty"));
        }
        if self.rewrite.apply_timeout_secs == 0 {
            return Err(anyhow!("rewrite.apply_timeout_secs must be > 0"));
        }
        if self.rewrite.output_limit_bytes == 0 {
            return Err(anyhow!("rewrite.output_limit_bytes must be > 0"));
        }
        if self.build.timeout_secs == 0 {
            return Err(anyhow!("build.timeout_secs must be > 0"));
        }
        if self.build.output_limit_bytes == 0 {
            return Err(anyhow!("build.output_limit_bytes must be > 0"));
        }
        if self.workspace.prefix.contains(std::path::MAIN_SEPARATOR) {
            return Err(anyhow!("workspace.prefix must not contain a path separator"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `UpgraderConfig::default()`.
pub fn load_config(path: &Path) -> Result<UpgraderConfig> {
    if !path.exists() {
        let cfg = UpgraderConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: UpgraderConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &UpgraderConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, UpgraderConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("upgrader.toml");
        let mut cfg = UpgraderConfig::default();
        cfg.workspace.parent_dir = Some(temp.path().join("work"));
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("upgrader.toml");
        fs::write(&path, "[build]\ntimeout_secs = 90\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.build.timeout_secs, 90);
        assert_eq!(cfg.build.output_limit_bytes, BuildConfig::default().output_limit_bytes);
        assert_eq!(cfg.advisory, AdvisoryConfig::default());
    }

    #[test]
    fn rejects_zero_timeouts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("upgrader.toml");
        fs::write(&path, "[rewrite]\napply_timeout_secs = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("apply_timeout_secs"));
    }
}
