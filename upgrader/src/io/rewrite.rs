//! OpenRewrite CLI adapter for the transformation-engine collaborator.
//!
//! Installation is an idempotent capability check: the executable is resolved
//! on `PATH` or in the install directory on every call, and downloaded only
//! when neither has it.

use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::io::config::RewriteConfig;
use crate::io::process::run_with_timeout;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
const UNZIP_TIMEOUT: Duration = Duration::from_secs(120);

/// Code-transformation collaborator used by setup and apply-changes.
pub trait TransformEngine {
    /// Make sure the engine can be invoked, installing it if necessary.
    fn ensure_installed(&self) -> Result<()>;

    /// Apply one named transformation to the checkout at `root`.
    fn apply(&self, root: &Path, recipe: &str) -> Result<()>;
}

/// [`TransformEngine`] that runs `rewrite run --recipe <id>`.
#[derive(Debug, Clone)]
pub struct RewriteCli {
    command: String,
    download_url: String,
    install_dir: PathBuf,
    apply_timeout: Duration,
    output_limit_bytes: usize,
}

impl RewriteCli {
    pub fn new(cfg: &RewriteConfig) -> Result<Self> {
        let install_dir = match &cfg.install_dir {
            Some(dir) => dir.clone(),
            None => default_install_dir()?,
        };
        Ok(Self {
            command: cfg.command.clone(),
            download_url: cfg.download_url.clone(),
            install_dir,
            apply_timeout: cfg.apply_timeout(),
            output_limit_bytes: cfg.output_limit_bytes,
        })
    }

    /// Resolve the executable: explicit path, then `PATH`, then the install dir.
    pub fn resolve(&self) -> Option<PathBuf> {
        let command = Path::new(&self.command);
        if command.components().count() > 1 {
            return command.is_file().then(|| command.to_path_buf());
        }
        let path_dirs = env::var_os("PATH")
            .map(|p| env::split_paths(&p).collect::<Vec<_>>())
            .unwrap_or_default();
        find_in_dirs(
            &self.command,
            path_dirs.into_iter().chain([self.install_dir.clone()]),
        )
    }

    #[instrument(skip_all, fields(url = %self.download_url))]
    fn install(&self) -> Result<PathBuf> {
        info!(install_dir = %self.install_dir.display(), "installing OpenRewrite CLI");
        let scratch = tempfile::tempdir().context("create download directory")?;
        let archive = scratch.path().join("rewrite-cli.zip");
        download(&self.download_url, &archive)?;

        let extracted = scratch.path().join("extracted");
        let mut unzip = Command::new("unzip");
        unzip.arg("-q").arg("-o").arg(&archive).arg("-d").arg(&extracted);
        let out = run_with_timeout(unzip, UNZIP_TIMEOUT, 64 * 1024)
            .context("extract OpenRewrite CLI archive")?;
        if !out.success() {
            return Err(anyhow!("unzip failed: {}", out.stderr_text().trim()));
        }

        let found = locate_launcher(&extracted)
            .ok_or_else(|| anyhow!("could not find rewrite executable in downloaded package"))?;
        install_launcher(&found, &self.install_dir, &self.command)
    }
}

impl TransformEngine for RewriteCli {
    fn ensure_installed(&self) -> Result<()> {
        if let Some(path) = self.resolve() {
            debug!(path = %path.display(), "OpenRewrite CLI already available");
            return Ok(());
        }
        let path = self.install()?;
        info!(path = %path.display(), "OpenRewrite CLI installed");
        Ok(())
    }

    #[instrument(skip_all, fields(recipe))]
    fn apply(&self, root: &Path, recipe: &str) -> Result<()> {
        let program = self
            .resolve()
            .ok_or_else(|| anyhow!("OpenRewrite CLI '{}' is not installed", self.command))?;
        let mut cmd = Command::new(program);
        cmd.args(["run", "--recipe", recipe]).current_dir(root);
        let out = run_with_timeout(cmd, self.apply_timeout, self.output_limit_bytes)
            .with_context(|| format!("run recipe {recipe}"))?;
        if out.timed_out {
            return Err(anyhow!(
                "recipe {recipe} timed out after {}s",
                self.apply_timeout.as_secs()
            ));
        }
        if !out.success() {
            let stderr = out.stderr_text();
            let detail = if stderr.trim().is_empty() {
                out.stdout_text()
            } else {
                stderr
            };
            warn!(exit_code = ?out.status.code(), "recipe failed");
            return Err(anyhow!("recipe {recipe} failed: {}", detail.trim()));
        }
        debug!("recipe applied");
        Ok(())
    }
}

fn default_install_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".local").join("bin"))
        .ok_or_else(|| anyhow!("cannot determine home directory for the rewrite install dir"))
}

/// First regular file named `name` in `dirs`.
pub fn find_in_dirs(name: &str, dirs: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    dirs.into_iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn download(url: &str, dest: &Path) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .context("build HTTP client")?;
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("download {url}"))?;
    if !response.status().is_success() {
        return Err(anyhow!("download of {url} failed with HTTP {}", response.status()));
    }
    let bytes = response.bytes().context("read download body")?;
    if bytes.is_empty() {
        return Err(anyhow!("downloaded archive from {url} is empty"));
    }
    fs::write(dest, &bytes).with_context(|| format!("write {}", dest.display()))
}

/// Find the CLI inside an extracted archive: a `rewrite*.jar` or `rewrite*.exe`.
///
/// Entries are visited in sorted order so the pick is stable.
pub fn locate_launcher(root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .find(|path| {
            let name = path.file_name().and_then(OsStr::to_str).unwrap_or_default();
            let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
            name.starts_with("rewrite") && (ext == "jar" || ext == "exe")
        })
}

/// Install `found` into `install_dir` as `command`.
///
/// Jars get a `java -jar` launcher script next to a copy of the jar.
pub fn install_launcher(found: &Path, install_dir: &Path, command: &str) -> Result<PathBuf> {
    fs::create_dir_all(install_dir)
        .with_context(|| format!("create {}", install_dir.display()))?;
    let launcher = install_dir.join(command);
    let is_jar = found.extension().and_then(OsStr::to_str) == Some("jar");
    if is_jar {
        let jar = install_dir.join(format!("{command}.jar"));
        fs::copy(found, &jar).with_context(|| format!("copy {}", found.display()))?;
        let script = format!(
            "#!/bin/sh\nexec java -jar '{}' \"$@\"\n",
            jar.display()
        );
        fs::write(&launcher, script)
            .with_context(|| format!("write launcher {}", launcher.display()))?;
    } else {
        fs::copy(found, &launcher).with_context(|| format!("copy {}", found.display()))?;
    }
    make_executable(&launcher)?;
    Ok(launcher)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(install_dir: &Path, command: &str) -> RewriteCli {
        let cfg = RewriteConfig {
            command: command.to_string(),
            install_dir: Some(install_dir.to_path_buf()),
            download_url: "http://127.0.0.1:9/unreachable.zip".to_string(),
            apply_timeout_secs: 10,
            ..RewriteConfig::default()
        };
        RewriteCli::new(&cfg).expect("cli")
    }

    #[test]
    fn locates_jar_in_nested_archive_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let nested = temp.path().join("rewrite-cli-1.0").join("lib");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(nested.join("README.txt"), "").expect("write");
        fs::write(nested.join("rewrite-cli-1.0.jar"), "jar").expect("write");
        let found = locate_launcher(temp.path()).expect("found");
        assert_eq!(found, nested.join("rewrite-cli-1.0.jar"));
    }

    #[test]
    fn missing_launcher_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("other.jar"), "jar").expect("write");
        assert!(locate_launcher(temp.path()).is_none());
    }

    #[test]
    fn jar_install_writes_launcher_script() {
        let temp = tempfile::tempdir().expect("tempdir");
        let jar = temp.path().join("rewrite-cli.jar");
        fs::write(&jar, "jar").expect("write");
        let bin = temp.path().join("bin");
        let launcher = install_launcher(&jar, &bin, "rewrite").expect("install");
        assert_eq!(launcher, bin.join("rewrite"));
        let script = fs::read_to_string(&launcher).expect("read");
        assert!(script.contains("java -jar"));
        assert!(bin.join("rewrite.jar").is_file());
    }

    #[test]
    fn find_in_dirs_takes_first_match() {
        let temp = tempfile::tempdir().expect("tempdir");
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        fs::create_dir_all(&a).expect("mkdir");
        fs::create_dir_all(&b).expect("mkdir");
        fs::write(b.join("tool"), "").expect("write");
        assert_eq!(find_in_dirs("tool", [a.clone(), b.clone()]), Some(b.join("tool")));
        assert_eq!(find_in_dirs("absent", [a, b]), None);
    }

    #[cfg(unix)]
    #[test]
    fn preinstalled_cli_skips_download_and_applies() {
        let temp = tempfile::tempdir().expect("tempdir");
        let bin = temp.path().join("bin");
        fs::create_dir_all(&bin).expect("mkdir");
        let script = bin.join("upgrader-test-rewrite");
        fs::write(
            &script,
            "#!/bin/sh\n[ \"$1\" = run ] && [ \"$2\" = --recipe ] || exit 9\necho \"$3\" >> applied.txt\n",
        )
        .expect("write");
        make_executable(&script).expect("chmod");

        let engine = cli(&bin, "upgrader-test-rewrite");
        engine.ensure_installed().expect("installed");

        let repo = temp.path().join("repo");
        fs::create_dir_all(&repo).expect("mkdir");
        engine
            .apply(&repo, "org.openrewrite.java.migrate.UpgradeToJava17")
            .expect("apply");
        let applied = fs::read_to_string(repo.join("applied.txt")).expect("read");
        assert_eq!(applied.trim(), "org.openrewrite.java.migrate.UpgradeToJava17");
    }

    #[cfg(unix)]
    #[test]
    fn failing_recipe_carries_stderr() {
        let temp = tempfile::tempdir().expect("tempdir");
        let script = temp.path().join("upgrader-test-rewrite-fail");
        fs::write(&script, "#!/bin/sh\necho 'recipe not found' >&2\nexit 1\n").expect("write");
        make_executable(&script).expect("chmod");

        let engine = cli(temp.path(), "upgrader-test-rewrite-fail");
        let err = engine.apply(temp.path(), "custom.Missing").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("custom.Missing"));
        assert!(msg.contains("recipe not found"));
    }

    #[test]
    fn apply_without_install_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let engine = cli(temp.path(), "upgrader-test-rewrite-absent");
        let err = engine.apply(temp.path(), "x.Y").unwrap_err();
        assert!(err.to_string().contains("not installed"));
    }

    #[test]
    fn failed_download_fails_install() {
        let temp = tempfile::tempdir().expect("tempdir");
        let engine = cli(temp.path(), "upgrader-test-rewrite-absent");
        assert!(engine.ensure_installed().is_err());
    }
}
