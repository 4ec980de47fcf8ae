//! Code-hosting client: opens the change request for the feature branch.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::io::config::HostingConfig;

const USER_AGENT: &str = concat!("upgrader/", env!("CARGO_PKG_VERSION"));

static GITHUB_SLUG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://(?:[^@/]+@)?github\.com/|ssh://git@github\.com/|git@github\.com:)([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+?)(?:\.git)?/?$",
    )
    .expect("static regex")
});

/// Everything needed to propose merging `head` into `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest {
    pub repository_url: String,
    pub base_branch: String,
    pub head_branch: String,
    pub title: String,
    pub body: String,
}

/// Code-hosting collaborator used by finalize.
pub trait CodeHost {
    /// Create the change request and return its locator (URL).
    fn create_change_request(&self, request: &ChangeRequest) -> Result<String>;
}

/// `owner/repo` of a GitHub repository URL, HTTPS or SSH.
pub fn parse_github_slug(url: &str) -> Result<(String, String)> {
    let caps = GITHUB_SLUG_RE
        .captures(url.trim())
        .ok_or_else(|| anyhow!("not a GitHub repository url: {url}"))?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}

#[derive(Debug, Serialize)]
struct CreatePull<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    html_url: String,
}

/// [`CodeHost`] backed by the GitHub REST API.
#[derive(Debug)]
pub struct GitHubHost {
    api_base: String,
    token: String,
    http: reqwest::blocking::Client,
}

impl GitHubHost {
    pub fn new(cfg: &HostingConfig, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("build hosting HTTP client")?;
        Ok(Self {
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            token: token.into(),
            http,
        })
    }
}

impl CodeHost for GitHubHost {
    #[instrument(skip_all, fields(head = %request.head_branch, base = %request.base_branch))]
    fn create_change_request(&self, request: &ChangeRequest) -> Result<String> {
        let (owner, repo) = parse_github_slug(&request.repository_url)?;
        let url = format!("{}/repos/{owner}/{repo}/pulls", self.api_base);
        let payload = CreatePull {
            title: &request.title,
            body: &request.body,
            head: &request.head_branch,
            base: &request.base_branch,
        };
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&payload)
            .send()
            .with_context(|| format!("POST {url}"))?;
        let status = response.status();
        let body = response.text().context("read pull request response")?;
        if !status.is_success() {
            warn!(%status, "pull request creation rejected");
            return Err(anyhow!("pull request creation failed with HTTP {status}: {}", body.trim()));
        }
        let created: PullResponse =
            serde_json::from_str(&body).context("parse pull request response")?;
        info!(url = %created.html_url, "pull request created");
        Ok(created.html_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    fn host(api_base: &str) -> GitHubHost {
        let cfg = HostingConfig {
            api_base: api_base.to_string(),
            timeout_secs: 5,
            ..HostingConfig::default()
        };
        GitHubHost::new(&cfg, "ghp_test").expect("host")
    }

    fn request(url: &str) -> ChangeRequest {
        ChangeRequest {
            repository_url: url.to_string(),
            base_branch: "main".to_string(),
            head_branch: "upgrade-java-springboot-17".to_string(),
            title: "Upgrade Java from 11 to 17".to_string(),
            body: "body".to_string(),
        }
    }

    #[test]
    fn parses_https_and_ssh_slugs() {
        let expected = ("acme".to_string(), "demo".to_string());
        assert_eq!(parse_github_slug("https://github.com/acme/demo").expect("https"), expected);
        assert_eq!(parse_github_slug("https://github.com/acme/demo.git").expect("git"), expected);
        assert_eq!(parse_github_slug("git@github.com:acme/demo.git").expect("ssh"), expected);
        assert_eq!(
            parse_github_slug("ssh://git@github.com/acme/demo.git").expect("ssh url"),
            expected
        );
        assert_eq!(
            parse_github_slug("https://github.com/acme/my.repo.git").expect("dots"),
            ("acme".to_string(), "my.repo".to_string())
        );
    }

    #[test]
    fn rejects_non_github_urls() {
        assert!(parse_github_slug("https://gitlab.com/acme/demo").is_err());
        assert!(parse_github_slug("/tmp/origin.git").is_err());
        assert!(parse_github_slug("https://github.com/acme").is_err());
    }

    #[test]
    fn posts_pull_request_and_returns_html_url() {
        let (api, server) = serve_once(
            201,
            r#"{"html_url":"https://github.com/acme/demo/pull/7","number":7}"#.to_string(),
        );
        let url = host(&api)
            .create_change_request(&request("https://github.com/acme/demo.git"))
            .expect("create");
        let raw = server.join().expect("server");
        assert_eq!(url, "https://github.com/acme/demo/pull/7");
        assert!(raw.starts_with("POST /repos/acme/demo/pulls"));
        assert!(raw.contains("\"head\":\"upgrade-java-springboot-17\""));
        assert!(raw.contains("\"base\":\"main\""));
    }

    #[test]
    fn rejected_pull_request_is_an_error() {
        let (api, server) = serve_once(422, r#"{"message":"Validation Failed"}"#.to_string());
        let err = host(&api)
            .create_change_request(&request("git@github.com:acme/demo.git"))
            .unwrap_err();
        server.join().expect("server");
        assert!(err.to_string().contains("422"));
        assert!(err.to_string().contains("Validation Failed"));
    }
}
