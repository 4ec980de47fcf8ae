//! Advisory-service client: upgrade strategies and build fixes from an LLM.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::core::recipes::{RecipeSet, recipe_from_fix, recipes_from_strategy};
use crate::core::types::BuildToolKind;
use crate::io::config::AdvisoryConfig;
use crate::io::prompt::PromptEngine;

const SYSTEM_PROMPT: &str =
    "You are an expert Java and Spring Boot upgrade specialist who knows the OpenRewrite recipe catalog.";

/// Inputs for an upgrade strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyRequest {
    pub model: String,
    pub build_tool: BuildToolKind,
    pub platform_version: String,
    pub framework_version: String,
    pub target_version: Option<String>,
    /// Leading slice of the build manifest.
    pub manifest_excerpt: String,
}

/// Narrative plan plus the recipe identifiers extracted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub narrative: String,
    pub recipes: RecipeSet,
}

/// Inputs for a corrective fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixRequest {
    pub model: String,
    /// Concatenated build error text.
    pub build_errors: String,
    pub build_tool: BuildToolKind,
    pub platform_version: String,
    pub framework_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fix {
    pub analysis: String,
    pub recipe: Option<String>,
}

/// Advisory collaborator used by analysis and troubleshoot.
pub trait Advisor {
    fn propose_strategy(&self, request: &StrategyRequest) -> Result<Strategy>;
    fn propose_fix(&self, request: &FixRequest) -> Result<Fix>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extract the assistant text from a chat-completions response body.
pub fn parse_completion(body: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(body).context("parse chat completion response")?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| anyhow!("chat completion response has no content"))
}

/// [`Advisor`] backed by an OpenAI-compatible chat-completions endpoint.
#[derive(Debug)]
pub struct OpenAiAdvisor {
    url: String,
    api_key: String,
    temperature: f64,
    http: reqwest::blocking::Client,
    prompts: PromptEngine,
}

impl OpenAiAdvisor {
    pub fn new(cfg: &AdvisoryConfig, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build advisory HTTP client")?;
        Ok(Self {
            url: format!("{}/v1/chat/completions", cfg.endpoint.trim_end_matches('/')),
            api_key: api_key.into(),
            temperature: cfg.temperature,
            http,
            prompts: PromptEngine::new()?,
        })
    }

    #[instrument(skip_all, fields(model, prompt_chars = prompt.len()))]
    fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
        };
        debug!(url = %self.url, "sending chat completion");
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .context("send chat completion request")?;
        let status = response.status();
        let body = response.text().context("read chat completion body")?;
        if !status.is_success() {
            warn!(%status, "advisory service returned an error");
            return Err(anyhow!("advisory service returned HTTP {status}: {}", body.trim()));
        }
        parse_completion(&body)
    }
}

impl Advisor for OpenAiAdvisor {
    fn propose_strategy(&self, request: &StrategyRequest) -> Result<Strategy> {
        let prompt = self.prompts.render_strategy(request)?;
        let narrative = self
            .complete(&request.model, &prompt)
            .context("request upgrade strategy")?;
        let recipes = recipes_from_strategy(&narrative);
        info!(recipes = recipes.len(), "strategy received");
        Ok(Strategy { narrative, recipes })
    }

    fn propose_fix(&self, request: &FixRequest) -> Result<Fix> {
        let prompt = self.prompts.render_fix(request)?;
        let analysis = self
            .complete(&request.model, &prompt)
            .context("request build fix")?;
        let recipe = recipe_from_fix(&analysis);
        info!(recipe = ?recipe, "fix received");
        Ok(Fix { analysis, recipe })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    fn advisor(endpoint: &str) -> OpenAiAdvisor {
        let cfg = AdvisoryConfig {
            endpoint: endpoint.to_string(),
            timeout_secs: 5,
            ..AdvisoryConfig::default()
        };
        OpenAiAdvisor::new(&cfg, "sk-test").expect("advisor")
    }

    fn completion(content: &str) -> String {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
        .to_string()
    }

    fn strategy_request() -> StrategyRequest {
        StrategyRequest {
            model: "gpt-4o".to_string(),
            build_tool: BuildToolKind::Maven,
            platform_version: "11".to_string(),
            framework_version: "2.7.0".to_string(),
            target_version: Some("17".to_string()),
            manifest_excerpt: "<project/>".to_string(),
        }
    }

    #[test]
    fn parse_completion_takes_first_choice() {
        let text = parse_completion(&completion("hello")).expect("parse");
        assert_eq!(text, "hello");
    }

    #[test]
    fn parse_completion_rejects_empty_choices() {
        assert!(parse_completion(r#"{"choices":[]}"#).is_err());
        assert!(parse_completion(r#"{"choices":[{"message":{"content":"  "}}]}"#).is_err());
        assert!(parse_completion("not json").is_err());
    }

    #[test]
    fn strategy_merges_baselines_and_named_recipes() {
        let (endpoint, server) = serve_once(
            200,
            completion(
                "Move to Java 17.\nApply org.openrewrite.java.migrate.javax.AddJaxbDependencies.",
            ),
        );
        let strategy = advisor(&endpoint)
            .propose_strategy(&strategy_request())
            .expect("strategy");
        let request = server.join().expect("server");

        assert!(request.starts_with("POST /v1/chat/completions"));
        assert!(request.to_lowercase().contains("authorization: bearer sk-test"));
        assert!(request.contains("\"model\":\"gpt-4o\""));
        assert!(strategy.narrative.starts_with("Move to Java 17."));
        assert!(
            strategy
                .recipes
                .contains("org.openrewrite.java.migrate.UpgradeToJava17")
        );
        assert!(
            strategy
                .recipes
                .contains("org.openrewrite.java.migrate.javax.AddJaxbDependencies")
        );
    }

    #[test]
    fn fix_extracts_first_recipe_or_none() {
        let (endpoint, server) = serve_once(
            200,
            completion("Use org.openrewrite.java.migrate.jakarta.JavaxMigrationToJakarta to fix."),
        );
        let fix = advisor(&endpoint)
            .propose_fix(&FixRequest {
                model: "gpt-4".to_string(),
                build_errors: "[ERROR] javax.servlet missing".to_string(),
                build_tool: BuildToolKind::Maven,
                platform_version: "17".to_string(),
                framework_version: "3.0.0".to_string(),
            })
            .expect("fix");
        server.join().expect("server");
        assert_eq!(
            fix.recipe.as_deref(),
            Some("org.openrewrite.java.migrate.jakarta.JavaxMigrationToJakarta")
        );
    }

    #[test]
    fn http_error_is_reported() {
        let (endpoint, server) = serve_once(401, r#"{"error":"bad key"}"#.to_string());
        let err = advisor(&endpoint)
            .propose_strategy(&strategy_request())
            .unwrap_err();
        server.join().expect("server");
        let msg = format!("{err:#}");
        assert!(msg.contains("401"));
        assert!(msg.contains("bad key"));
    }
}
