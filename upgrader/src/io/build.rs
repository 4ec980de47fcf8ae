//! Build-tool detection and the build/test runner.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument, warn};

use crate::core::types::{BuildResult, BuildToolKind};
use crate::io::config::BuildConfig;
use crate::io::process::run_with_timeout;

/// Manifests probed in order; the first one present decides the kind.
const MANIFESTS: [(&str, BuildToolKind); 3] = [
    ("pom.xml", BuildToolKind::Maven),
    ("build.gradle", BuildToolKind::Gradle),
    ("build.gradle.kts", BuildToolKind::Gradle),
];

/// Build-system collaborator used by the analysis and verify phases.
pub trait BuildSystem {
    /// Identify the build tool from manifests at the checkout root.
    fn detect_kind(&self, root: &Path) -> Result<BuildToolKind>;

    /// Run the full build and test suite.
    ///
    /// A failing build is a successful call with `success == false`. `Err` is
    /// reserved for a kind the runner cannot handle.
    fn build_and_test(&self, root: &Path, kind: BuildToolKind) -> Result<BuildResult>;
}

/// Detect the build tool, failing when no known manifest is present.
pub fn detect_build_tool(root: &Path) -> Result<BuildToolKind> {
    MANIFESTS
        .iter()
        .find(|(name, _)| root.join(name).is_file())
        .map(|(_, kind)| *kind)
        .ok_or_else(|| {
            anyhow!(
                "could not detect build tool in {} (no pom.xml, build.gradle or build.gradle.kts)",
                root.display()
            )
        })
}

/// Path of the manifest that decides `kind`, if present.
pub fn manifest_path(root: &Path, kind: BuildToolKind) -> Option<PathBuf> {
    MANIFESTS
        .iter()
        .filter(|(_, k)| *k == kind)
        .map(|(name, _)| root.join(name))
        .find(|path| path.is_file())
}

/// Read the manifest for `kind`.
pub fn read_manifest(root: &Path, kind: BuildToolKind) -> Result<String> {
    let path = manifest_path(root, kind)
        .ok_or_else(|| anyhow!("no {kind} manifest in {}", root.display()))?;
    fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
}

/// Program and arguments for a build/test invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    pub program: PathBuf,
    pub args: Vec<&'static str>,
}

/// Build/test command for `kind`, preferring the Gradle wrapper when checked in.
pub fn build_command(root: &Path, kind: BuildToolKind) -> Result<BuildCommand> {
    match kind {
        BuildToolKind::Maven => Ok(BuildCommand {
            program: PathBuf::from("mvn"),
            args: vec!["clean", "verify"],
        }),
        BuildToolKind::Gradle => {
            let wrapper = root.join("gradlew");
            let program = if wrapper.is_file() {
                wrapper
            } else {
                PathBuf::from("gradle")
            };
            Ok(BuildCommand {
                program,
                args: vec!["clean", "build"],
            })
        }
        BuildToolKind::Unknown => Err(anyhow!("unsupported build tool: {kind}")),
    }
}

/// [`BuildSystem`] that shells out to Maven or Gradle.
#[derive(Debug, Clone)]
pub struct CommandBuildSystem {
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandBuildSystem {
    pub fn new(cfg: &BuildConfig) -> Self {
        Self {
            timeout: cfg.timeout(),
            output_limit_bytes: cfg.output_limit_bytes,
        }
    }
}

impl BuildSystem for CommandBuildSystem {
    fn detect_kind(&self, root: &Path) -> Result<BuildToolKind> {
        detect_build_tool(root)
    }

    #[instrument(skip_all, fields(kind = %kind))]
    fn build_and_test(&self, root: &Path, kind: BuildToolKind) -> Result<BuildResult> {
        let command = build_command(root, kind)?;
        info!(program = %command.program.display(), "running build");

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args).current_dir(root);
        let output = match run_with_timeout(cmd, self.timeout, self.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "build runner could not be started");
                return Ok(BuildResult::failure(format!("{err:#}")));
            }
        };

        let mut stderr = output.stderr_text();
        if output.timed_out {
            stderr.push_str(&format!(
                "\nbuild timed out after {}s\n",
                self.timeout.as_secs()
            ));
        }
        let result = BuildResult {
            success: output.success(),
            stdout: output.stdout_text(),
            stderr,
            exit_code: output.status.code(),
            timed_out: output.timed_out,
        };
        info!(
            success = result.success,
            exit_code = ?result.exit_code,
            timed_out = result.timed_out,
            "build finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maven_takes_precedence_over_gradle() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("build.gradle"), "").expect("write");
        assert_eq!(
            detect_build_tool(temp.path()).expect("detect"),
            BuildToolKind::Gradle
        );
        fs::write(temp.path().join("pom.xml"), "<project/>").expect("write");
        assert_eq!(
            detect_build_tool(temp.path()).expect("detect"),
            BuildToolKind::Maven
        );
    }

    #[test]
    fn kotlin_dsl_is_gradle() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("build.gradle.kts"), "plugins {}").expect("write");
        assert_eq!(
            detect_build_tool(temp.path()).expect("detect"),
            BuildToolKind::Gradle
        );
        let manifest = read_manifest(temp.path(), BuildToolKind::Gradle).expect("read");
        assert_eq!(manifest, "plugins {}");
    }

    #[test]
    fn missing_manifest_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = detect_build_tool(temp.path()).unwrap_err();
        assert!(err.to_string().contains("could not detect build tool"));
        assert!(manifest_path(temp.path(), BuildToolKind::Maven).is_none());
    }

    #[test]
    fn gradle_prefers_wrapper() {
        let temp = tempfile::tempdir().expect("tempdir");
        let plain = build_command(temp.path(), BuildToolKind::Gradle).expect("command");
        assert_eq!(plain.program, PathBuf::from("gradle"));

        fs::write(temp.path().join("gradlew"), "#!/bin/sh\n").expect("write");
        let wrapped = build_command(temp.path(), BuildToolKind::Gradle).expect("command");
        assert_eq!(wrapped.program, temp.path().join("gradlew"));
        assert_eq!(wrapped.args, vec!["clean", "build"]);
    }

    #[test]
    fn maven_runs_clean_verify() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cmd = build_command(temp.path(), BuildToolKind::Maven).expect("command");
        assert_eq!(cmd.program, PathBuf::from("mvn"));
        assert_eq!(cmd.args, vec!["clean", "verify"]);
        assert!(build_command(temp.path(), BuildToolKind::Unknown).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn wrapper_failure_is_captured_as_failed_build() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let wrapper = temp.path().join("gradlew");
        fs::write(&wrapper, "#!/bin/sh\necho 'compile failed' >&2\nexit 1\n").expect("write");
        fs::set_permissions(&wrapper, fs::Permissions::from_mode(0o755)).expect("chmod");

        let runner = CommandBuildSystem::new(&BuildConfig::default());
        let result = runner
            .build_and_test(temp.path(), BuildToolKind::Gradle)
            .expect("build");
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(1));
        assert!(result.stderr.contains("compile failed"));
    }

    #[cfg(unix)]
    #[test]
    fn timed_out_build_is_a_failure() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let wrapper = temp.path().join("gradlew");
        fs::write(&wrapper, "#!/bin/sh\nexec sleep 5\n").expect("write");
        fs::set_permissions(&wrapper, fs::Permissions::from_mode(0o755)).expect("chmod");

        let runner = CommandBuildSystem {
            timeout: Duration::from_millis(200),
            output_limit_bytes: 1024,
        };
        let result = runner
            .build_and_test(temp.path(), BuildToolKind::Gradle)
            .expect("build");
        assert!(!result.success);
        assert!(result.timed_out);
        assert!(result.stderr.contains("timed out"));
    }
}
