//! Prompt rendering for the advisory service.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::io::advisory::{FixRequest, StrategyRequest};

const STRATEGY_TEMPLATE: &str = include_str!("prompts/strategy.md");
const FIX_TEMPLATE: &str = include_str!("prompts/fix.md");

/// Template engine wrapper around minijinja.
#[derive(Debug)]
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("strategy", STRATEGY_TEMPLATE)
            .context("load strategy template")?;
        env.add_template("fix", FIX_TEMPLATE)
            .context("load fix template")?;
        Ok(Self { env })
    }

    pub fn render_strategy(&self, request: &StrategyRequest) -> Result<String> {
        let template = self.env.get_template("strategy")?;
        let rendered = template.render(context! {
            build_tool => request.build_tool.as_str(),
            platform_version => request.platform_version.as_str(),
            framework_version => request.framework_version.as_str(),
            target_version => request.target_version.as_deref().unwrap_or("latest"),
            manifest_excerpt => request.manifest_excerpt.trim(),
        })?;
        Ok(rendered)
    }

    pub fn render_fix(&self, request: &FixRequest) -> Result<String> {
        let template = self.env.get_template("fix")?;
        let rendered = template.render(context! {
            build_tool => request.build_tool.as_str(),
            platform_version => request.platform_version.as_str(),
            framework_version => request.framework_version.as_str(),
            build_errors => request.build_errors.trim(),
        })?;
        Ok(rendered)
    }
}
