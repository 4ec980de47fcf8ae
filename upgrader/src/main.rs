//! Automated Java/Spring Boot upgrade agent.
//!
//! `upgrader run` drives one upgrade end to end and prints a JSON report on
//! stdout. `upgrader inspect` shows what analysis would detect in a local
//! checkout, and `upgrader init` writes the default configuration.

use std::env;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use upgrader::controller::{PhaseFailure, run_upgrade};
use upgrader::core::state::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MODEL, RunParams};
use upgrader::core::types::BuildToolKind;
use upgrader::core::versions::extract_versions;
use upgrader::exit_codes;
use upgrader::io::advisory::OpenAiAdvisor;
use upgrader::io::build::{CommandBuildSystem, detect_build_tool, manifest_path, read_manifest};
use upgrader::io::config::{DEFAULT_CONFIG_PATH, UpgraderConfig, load_config, write_config};
use upgrader::io::git::GitSourceControl;
use upgrader::io::hosting::GitHubHost;
use upgrader::io::rewrite::RewriteCli;
use upgrader::logging;
use upgrader::phases::{PhaseSettings, Toolkit};

#[derive(Parser)]
#[command(
    name = "upgrader",
    version,
    about = "Automated Java/Spring Boot upgrades with OpenRewrite"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upgrade a repository and open a pull request with the result.
    Run(RunArgs),
    /// Print the build tool and versions detected in a local checkout.
    Inspect {
        /// Checkout root.
        path: PathBuf,
    },
    /// Write the default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Repository to upgrade (HTTPS or SSH GitHub URL).
    #[arg(long)]
    repository_url: String,
    /// Branch to start from and to target with the pull request.
    #[arg(long)]
    base_branch: String,
    /// Desired Java or Spring Boot version.
    #[arg(long)]
    target_version: Option<String>,
    /// Advisory model identifier.
    #[arg(long, default_value = DEFAULT_MODEL)]
    llm_model: String,
    /// Upper bound on troubleshooting attempts.
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,
    /// Feature branch name (derived from the target when omitted).
    #[arg(long)]
    new_branch_name: Option<String>,
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[derive(Serialize)]
struct RunReport<'a> {
    pull_request_url: &'a str,
    summary_report: &'a str,
    build_succeeded: bool,
    attempts: u32,
    recipes: &'a [String],
}

#[derive(Serialize)]
struct ErrorReport<'a> {
    error: String,
    pull_request_url: &'a str,
    summary_report: &'a str,
}

#[derive(Serialize)]
struct InspectReport {
    build_tool: BuildToolKind,
    platform_version: String,
    framework_version: String,
    manifest: Option<PathBuf>,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            if let Err(print_err) = err.print() {
                eprintln!("{err}: {print_err}");
            }
            process::exit(code);
        }
    };
    logging::init();

    let code = match cli.command {
        Command::Run(args) => cmd_run(args),
        Command::Inspect { path } => report_errors(cmd_inspect(&path)),
        Command::Init { force, config } => report_errors(cmd_init(&config, force)),
    };
    process::exit(code);
}

fn report_errors(result: Result<()>) -> i32 {
    match result {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    }
}

fn cmd_run(args: RunArgs) -> i32 {
    match run_inner(args) {
        Ok(code) => code,
        Err(err) => {
            let summary = err
                .downcast_ref::<PhaseFailure>()
                .map(|failure| failure.summary.as_str())
                .unwrap_or_default();
            let report = ErrorReport {
                error: format!("{err:#}"),
                pull_request_url: "",
                summary_report: summary,
            };
            print_json(&report);
            exit_codes::INVALID
        }
    }
}

fn run_inner(args: RunArgs) -> Result<i32> {
    let params = RunParams {
        repository_url: args.repository_url,
        base_branch: args.base_branch,
        target_version: args.target_version,
        model: args.llm_model,
        max_attempts: args.max_attempts,
        feature_branch: args.new_branch_name,
    };
    params.validate()?;

    let cfg = load_config(&args.config)?;
    let api_key = required_env(&cfg.advisory.api_key_env)?;
    let token = required_env(&cfg.hosting.token_env)?;

    let source_control = GitSourceControl;
    let transform = RewriteCli::new(&cfg.rewrite)?;
    let build = CommandBuildSystem::new(&cfg.build);
    let advisor = OpenAiAdvisor::new(&cfg.advisory, api_key)?;
    let code_host = GitHubHost::new(&cfg.hosting, token)?;
    let tools = Toolkit {
        source_control: &source_control,
        transform: &transform,
        build: &build,
        advisor: &advisor,
        code_host: &code_host,
    };

    let outcome = run_upgrade(params, &tools, &PhaseSettings::from_config(&cfg))?;
    let state = &outcome.state;
    print_json(&RunReport {
        pull_request_url: &state.change_request_url,
        summary_report: &state.summary,
        build_succeeded: outcome.build_succeeded(),
        attempts: state.attempt,
        recipes: state.recipes.as_slice(),
    });
    Ok(if outcome.build_succeeded() {
        exit_codes::OK
    } else {
        exit_codes::BUILD_FAILED
    })
}

fn required_env(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(anyhow!("environment variable {name} is not set")),
    }
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let kind = detect_build_tool(path)?;
    let manifest = read_manifest(path, kind)?;
    let versions = extract_versions(kind, &manifest);
    print_json(&InspectReport {
        build_tool: kind,
        platform_version: versions.platform,
        framework_version: versions.framework,
        manifest: manifest_path(path, kind),
    });
    Ok(())
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    write_config(path, &UpgraderConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), "configuration written");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("serialize report: {err}"),
    }
}
