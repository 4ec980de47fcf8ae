//! Scripted collaborators for driving the controller without network or tools.
//!
//! Each double records its calls in a `RefCell` so tests can assert on the
//! exact sequence the phases produced.

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Result, anyhow};

use crate::core::recipes::RecipeSet;
use crate::core::state::RunParams;
use crate::core::types::{BuildResult, BuildToolKind};
use crate::io::advisory::{Advisor, Fix, FixRequest, Strategy, StrategyRequest};
use crate::io::build::{BuildSystem, detect_build_tool};
use crate::io::config::WorkspaceConfig;
use crate::io::git::SourceControl;
use crate::io::hosting::{ChangeRequest, CodeHost};
use crate::io::rewrite::TransformEngine;
use crate::phases::{PhaseSettings, Toolkit};

pub const REPO_URL: &str = "https://github.com/acme/demo.git";
pub const PR_URL: &str = "https://github.com/acme/demo/pull/1";

/// A Maven manifest pinned to Java 11 with no Spring Boot version.
pub const MAVEN_JAVA_11: &str = r#"<project>
  <modelVersion>4.0.0</modelVersion>
  <properties>
    <maven.compiler.source>11</maven.compiler.source>
  </properties>
</project>
"#;

/// Run parameters for [`REPO_URL`] on `main`.
pub fn params(max_attempts: u32) -> RunParams {
    let mut params = RunParams::new(REPO_URL, "main");
    params.max_attempts = max_attempts;
    params
}

/// Clone writes fixture files; every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedSourceControl {
    /// `(relative path, contents)` written into the clone destination.
    pub files: Vec<(String, String)>,
    pub fail_clone: Option<String>,
    pub fail_branch: Option<String>,
    pub fail_push: Option<String>,
    pub calls: RefCell<Vec<String>>,
}

impl ScriptedSourceControl {
    pub fn with_file(path: &str, contents: &str) -> Self {
        Self {
            files: vec![(path.to_string(), contents.to_string())],
            ..Self::default()
        }
    }
}

impl SourceControl for ScriptedSourceControl {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        self.calls.borrow_mut().push(format!("clone {url}"));
        if let Some(reason) = &self.fail_clone {
            return Err(anyhow!(reason.clone()));
        }
        for (path, contents) in &self.files {
            let target = dest.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, contents)?;
        }
        Ok(())
    }

    fn create_and_checkout_branch(&self, _repo: &Path, name: &str, base: &str) -> Result<()> {
        self.calls.borrow_mut().push(format!("branch {name} from {base}"));
        match &self.fail_branch {
            Some(reason) => Err(anyhow!(reason.clone())),
            None => Ok(()),
        }
    }

    fn commit_and_push(&self, _repo: &Path, branch: &str, message: &str) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("commit {branch}: {message}"));
        match &self.fail_push {
            Some(reason) => Err(anyhow!(reason.clone())),
            None => Ok(()),
        }
    }
}

/// Records applied recipes; listed recipes fail.
#[derive(Debug, Default)]
pub struct ScriptedTransform {
    pub fail_install: Option<String>,
    pub failing: HashSet<String>,
    pub installs: Cell<u32>,
    pub applied: RefCell<Vec<String>>,
}

impl TransformEngine for ScriptedTransform {
    fn ensure_installed(&self) -> Result<()> {
        self.installs.set(self.installs.get() + 1);
        match &self.fail_install {
            Some(reason) => Err(anyhow!(reason.clone())),
            None => Ok(()),
        }
    }

    fn apply(&self, _root: &Path, recipe: &str) -> Result<()> {
        self.applied.borrow_mut().push(recipe.to_string());
        if self.failing.contains(recipe) {
            return Err(anyhow!("recipe {recipe} failed"));
        }
        Ok(())
    }
}

/// Detects from real manifest files; build results are served from a queue
/// whose last entry repeats.
#[derive(Debug)]
pub struct ScriptedBuild {
    results: RefCell<VecDeque<BuildResult>>,
    pub builds: Cell<u32>,
}

impl ScriptedBuild {
    pub fn new(results: impl IntoIterator<Item = BuildResult>) -> Self {
        Self {
            results: RefCell::new(results.into_iter().collect()),
            builds: Cell::new(0),
        }
    }

    pub fn always_failing(stderr: &str) -> Self {
        Self::new([BuildResult::failure(stderr)])
    }

    pub fn passing() -> Self {
        Self::new([passed()])
    }
}

/// A successful build result.
pub fn passed() -> BuildResult {
    BuildResult {
        success: true,
        exit_code: Some(0),
        ..BuildResult::default()
    }
}

impl BuildSystem for ScriptedBuild {
    fn detect_kind(&self, root: &Path) -> Result<BuildToolKind> {
        detect_build_tool(root)
    }

    fn build_and_test(&self, _root: &Path, _kind: BuildToolKind) -> Result<BuildResult> {
        self.builds.set(self.builds.get() + 1);
        let mut results = self.results.borrow_mut();
        let next = if results.len() > 1 {
            results.pop_front()
        } else {
            results.front().cloned()
        };
        next.ok_or_else(|| anyhow!("no scripted build result"))
    }
}

/// Returns a fixed strategy and a queue of fixes (last one repeats).
#[derive(Debug, Default)]
pub struct ScriptedAdvisor {
    pub strategy_narrative: String,
    pub strategy_recipes: Vec<String>,
    pub fail_strategy: Option<String>,
    fixes: RefCell<VecDeque<Option<String>>>,
    pub fail_fix: Option<String>,
    pub strategy_requests: RefCell<Vec<StrategyRequest>>,
    pub fix_requests: RefCell<Vec<FixRequest>>,
}

impl ScriptedAdvisor {
    pub fn with_strategy(narrative: &str, recipes: &[&str]) -> Self {
        Self {
            strategy_narrative: narrative.to_string(),
            strategy_recipes: recipes.iter().map(|r| r.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing_strategy(reason: &str) -> Self {
        Self {
            fail_strategy: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn with_fixes(self, fixes: impl IntoIterator<Item = Option<&'static str>>) -> Self {
        *self.fixes.borrow_mut() = fixes.into_iter().map(|f| f.map(str::to_string)).collect();
        self
    }
}

impl Advisor for ScriptedAdvisor {
    fn propose_strategy(&self, request: &StrategyRequest) -> Result<Strategy> {
        self.strategy_requests.borrow_mut().push(request.clone());
        if let Some(reason) = &self.fail_strategy {
            return Err(anyhow!(reason.clone()));
        }
        Ok(Strategy {
            narrative: self.strategy_narrative.clone(),
            recipes: self.strategy_recipes.iter().cloned().collect::<RecipeSet>(),
        })
    }

    fn propose_fix(&self, request: &FixRequest) -> Result<Fix> {
        self.fix_requests.borrow_mut().push(request.clone());
        if let Some(reason) = &self.fail_fix {
            return Err(anyhow!(reason.clone()));
        }
        let mut fixes = self.fixes.borrow_mut();
        let recipe = if fixes.len() > 1 {
            fixes.pop_front().flatten()
        } else {
            fixes.front().cloned().flatten()
        };
        Ok(Fix {
            analysis: format!("analysis of {} bytes of errors", request.build_errors.len()),
            recipe,
        })
    }
}

/// Records change requests and answers with [`PR_URL`] unless told to fail.
#[derive(Debug, Default)]
pub struct ScriptedHost {
    pub fail: Option<String>,
    pub requests: RefCell<Vec<ChangeRequest>>,
}

impl CodeHost for ScriptedHost {
    fn create_change_request(&self, request: &ChangeRequest) -> Result<String> {
        self.requests.borrow_mut().push(request.clone());
        match &self.fail {
            Some(reason) => Err(anyhow!(reason.clone())),
            None => Ok(PR_URL.to_string()),
        }
    }
}

/// All scripted collaborators plus a private workspace parent directory.
#[derive(Debug)]
pub struct Harness {
    pub source_control: ScriptedSourceControl,
    pub transform: ScriptedTransform,
    pub build: ScriptedBuild,
    pub advisor: ScriptedAdvisor,
    pub host: ScriptedHost,
    pub workspace_root: tempfile::TempDir,
}

impl Harness {
    /// Maven project on Java 11 whose builds return `build`.
    pub fn new(build: ScriptedBuild, advisor: ScriptedAdvisor) -> Self {
        Self {
            source_control: ScriptedSourceControl::with_file("pom.xml", MAVEN_JAVA_11),
            transform: ScriptedTransform::default(),
            build,
            advisor,
            host: ScriptedHost::default(),
            workspace_root: tempfile::tempdir().expect("workspace root"),
        }
    }

    pub fn toolkit(&self) -> Toolkit<'_> {
        Toolkit {
            source_control: &self.source_control,
            transform: &self.transform,
            build: &self.build,
            advisor: &self.advisor,
            code_host: &self.host,
        }
    }

    pub fn settings(&self) -> PhaseSettings {
        PhaseSettings {
            workspace: WorkspaceConfig {
                prefix: "upgrade_agent_".to_string(),
                parent_dir: Some(self.workspace_root.path().to_path_buf()),
            },
            ..PhaseSettings::default()
        }
    }

    /// Workspaces still present under the parent directory.
    pub fn leftover_workspaces(&self) -> Vec<PathBuf> {
        fs::read_dir(self.workspace_root.path())
            .expect("read workspace root")
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect()
    }
}

/// Serve one HTTP response on a loopback port.
///
/// Returns the base URL and a handle yielding the raw request text.
pub fn serve_once(status: u16, body: String) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let request = read_http_request(&mut stream);
        let reason = match status {
            200 => "OK",
            201 => "Created",
            _ => "Error",
        };
        let response = format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).expect("write response");
        request
    });
    (format!("http://{addr}"), handle)
}

fn read_http_request(stream: &mut impl Read) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).expect("read request");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
