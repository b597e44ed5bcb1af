//! CLI command definitions.
//!
//! Each subcommand drives one tool through the orchestrator and prints
//! the JSON result to stdout; logs go to stderr.

use crate::config::CollegueConfig;
use crate::models::FileInput;
use crate::orchestrator::Orchestrator;
use crate::tools::Services;
use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::io::Read;
use std::path::PathBuf;

/// Code-analysis tool service for AI coding assistants.
#[derive(Debug, Parser)]
#[command(name = "collegue", version, about)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, env = "COLLEGUE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log filter (overrides COLLEGUE_LOG).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format: pretty or json.
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse a code file into its structural view.
    Parse(ParseArgs),
    /// Scan files or content for exposed secrets.
    SecretScan(SecretScanArgs),
    /// Validate dependencies from a manifest file.
    DependencyGuard(DependencyGuardArgs),
    /// Scan IaC files for dangerous configurations.
    IacScan(IacScanArgs),
    /// Check a file set for code inconsistencies.
    ConsistencyCheck(ConsistencyArgs),
    /// Analyze the impact of an intended change.
    Impact(ImpactArgs),
    /// Run tests against a target path.
    RunTests(RunTestsArgs),
    /// List the registered tools.
    Tools(ToolsArgs),
}

/// Arguments for `parse`.
#[derive(Debug, Args)]
pub struct ParseArgs {
    /// File to parse, or `-` for stdin.
    pub file: String,
    /// Language override.
    #[arg(long)]
    pub language: Option<String>,
}

/// Arguments for `secret-scan`.
#[derive(Debug, Args)]
pub struct SecretScanArgs {
    /// File or directory to scan, or `-` for stdin content.
    pub target: String,
    /// Minimum severity to report.
    #[arg(long, default_value = "low")]
    pub severity_threshold: String,
}

/// Arguments for `dependency-guard`.
#[derive(Debug, Args)]
pub struct DependencyGuardArgs {
    /// Manifest file (requirements.txt, pyproject.toml, package.json).
    pub manifest: PathBuf,
    /// Ecosystem language.
    #[arg(long)]
    pub language: String,
    /// Skip registry existence checks.
    #[arg(long)]
    pub no_existence: bool,
    /// Skip OSV vulnerability checks.
    #[arg(long)]
    pub no_vulnerabilities: bool,
}

/// Arguments for `iac-scan`.
#[derive(Debug, Args)]
pub struct IacScanArgs {
    /// IaC files to scan.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Policy profile: baseline or strict.
    #[arg(long, default_value = "baseline")]
    pub profile: String,
    /// Emit SARIF instead of plain JSON findings.
    #[arg(long)]
    pub sarif: bool,
}

/// Arguments for `consistency-check`.
#[derive(Debug, Args)]
pub struct ConsistencyArgs {
    /// Files to analyze.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// `fast` or `deep`.
    #[arg(long, default_value = "fast")]
    pub mode: String,
    /// Minimum confidence (0-100).
    #[arg(long, default_value_t = 60)]
    pub min_confidence: u32,
}

/// Arguments for `impact`.
#[derive(Debug, Args)]
pub struct ImpactArgs {
    /// Description of the intended change.
    pub change_intent: String,
    /// Files giving the change context.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Arguments for `run-tests`.
#[derive(Debug, Args)]
pub struct RunTestsArgs {
    /// Test target path.
    pub target: String,
    /// Language of the tests.
    #[arg(long)]
    pub language: String,
    /// Framework; auto-detected when absent.
    #[arg(long)]
    pub framework: Option<String>,
    /// Hard timeout in seconds.
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,
}

/// Arguments for `tools`.
#[derive(Debug, Args)]
pub struct ToolsArgs {
    /// Filter by category.
    #[arg(long)]
    pub category: Option<String>,
}

fn read_input(path: &str) -> anyhow::Result<String> {
    if path == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("reading stdin")?;
        Ok(content)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {path}"))
    }
}

fn read_file_inputs(paths: &[PathBuf]) -> anyhow::Result<Vec<FileInput>> {
    paths
        .iter()
        .map(|path| {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(FileInput::new(path.to_string_lossy(), content))
        })
        .collect()
}

fn print_result(result: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    if result.get("error").is_some() {
        bail!("tool execution failed");
    }
    Ok(())
}

/// Runs the CLI.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => CollegueConfig::load(path)?,
        None => CollegueConfig::from_env(),
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = Some(level.clone());
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = Some(format.clone());
    }
    crate::observability::logging::init(&config.logging);

    let services = Services::from_config(&config);
    let orchestrator = Orchestrator::with_builtin_tools(services);

    match cli.command {
        Commands::Parse(args) => {
            let content = read_input(&args.file)?;
            let view = orchestrator
                .services()
                .parser
                .parse(&content, args.language.as_deref());
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
        Commands::SecretScan(args) => {
            let result = if args.target == "-" {
                orchestrator.execute_tool(
                    "secret_scan",
                    json!({
                        "content": read_input("-")?,
                        "severity_threshold": args.severity_threshold,
                    }),
                    None,
                )
            } else {
                orchestrator.execute_tool(
                    "secret_scan",
                    json!({
                        "target": args.target,
                        "severity_threshold": args.severity_threshold,
                    }),
                    None,
                )
            };
            print_result(&result)
        }
        Commands::DependencyGuard(args) => {
            let content = std::fs::read_to_string(&args.manifest)
                .with_context(|| format!("reading {}", args.manifest.display()))?;
            let manifest_type = args
                .manifest
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            let result = orchestrator.execute_tool(
                "dependency_guard",
                json!({
                    "manifest_content": content,
                    "manifest_type": manifest_type,
                    "language": args.language,
                    "check_existence": !args.no_existence,
                    "check_vulnerabilities": !args.no_vulnerabilities,
                }),
                None,
            );
            print_result(&result)
        }
        Commands::IacScan(args) => {
            let files = read_file_inputs(&args.files)?;
            let result = orchestrator.execute_tool(
                "iac_guardrails_scan",
                json!({
                    "files": files,
                    "policy_profile": args.profile,
                    "output_format": if args.sarif { "sarif" } else { "json" },
                }),
                None,
            );
            print_result(&result)
        }
        Commands::ConsistencyCheck(args) => {
            let files = read_file_inputs(&args.files)?;
            let result = orchestrator.execute_tool(
                "repo_consistency_check",
                json!({
                    "files": files,
                    "mode": args.mode,
                    "min_confidence": args.min_confidence,
                }),
                None,
            );
            print_result(&result)
        }
        Commands::Impact(args) => {
            let files = read_file_inputs(&args.files)?;
            let result = orchestrator.execute_tool(
                "impact_analysis",
                json!({
                    "change_intent": args.change_intent,
                    "files": files,
                }),
                None,
            );
            print_result(&result)
        }
        Commands::RunTests(args) => {
            let result = orchestrator.execute_tool(
                "run_tests",
                json!({
                    "target": args.target,
                    "language": args.language,
                    "framework": args.framework,
                    "timeout": args.timeout,
                    "verbose": true,
                }),
                None,
            );
            print_result(&result)
        }
        Commands::Tools(args) => {
            let tools = orchestrator.list_tools(args.category.as_deref());
            println!("{}", serde_json::to_string_pretty(&tools)?);
            Ok(())
        }
    }
}
