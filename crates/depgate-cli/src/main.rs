//! depgate - risk-gated automated dependency updates.
//!
//! ## Commands
//!
//! - `update`: assess, apply, verify and publish one dependency update.
//!   With `--simulate-injection` it instead probes the evaluator with a
//!   crafted diff fixture and reports whether a marker string leaked
//!   into the assessment.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::Level;

use depgate_core::pipeline::injection::{self, InjectionVerdict};
use depgate_core::{telemetry, Pipeline, PipelineOptions, WorkflowOutcome};

#[derive(Parser)]
#[command(name = "depgate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Risk-gated automated dependency updates", long_about = None)]
struct Cli {
    /// Stream rendered tool output and enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and a JSON outcome
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess, apply, verify and publish one dependency update
    Update {
        /// Dependency to update (default: first update-eligible one)
        dependency: Option<String>,

        /// Pick a random update-eligible dependency instead
        #[arg(long, conflicts_with = "dependency")]
        random: bool,

        /// Base branch for the update branch and the pull request
        #[arg(long, default_value = "main")]
        base: String,

        /// Evaluator model identifier
        #[arg(long, default_value = depgate_core::config::DEFAULT_MODEL)]
        model: String,

        /// Also block on breaking-change and compatibility verdicts
        #[arg(long)]
        strict: bool,

        /// Stop before any branch/commit/PR side effect
        #[arg(long)]
        dry_run: bool,

        /// Skip the clean-worktree precondition
        #[arg(long)]
        allow_dirty: bool,

        /// Project checkout to operate on (default: current directory)
        #[arg(long, default_value = ".")]
        workdir: PathBuf,

        /// Run a crafted diff fixture through the sandboxed security
        /// evaluation instead of the full pipeline
        #[arg(long, value_name = "FIXTURE", requires = "injection_marker")]
        simulate_injection: Option<PathBuf>,

        /// Marker string the fixture tries to smuggle into the reply
        #[arg(long, value_name = "MARKER", requires = "simulate_injection")]
        injection_marker: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    telemetry::init_tracing(cli.json, level);

    let Commands::Update {
        dependency,
        random,
        base,
        model,
        strict,
        dry_run,
        allow_dirty,
        workdir,
        simulate_injection,
        injection_marker,
    } = cli.command;

    let mut opts = PipelineOptions::new(workdir);
    opts.dependency = dependency;
    opts.random = random;
    opts.base_branch = base;
    opts.model = model;
    opts.strict = strict;
    opts.dry_run = dry_run;
    opts.allow_dirty = allow_dirty;
    opts.verbose = cli.verbose;
    opts.injection_fixture = simulate_injection;
    opts.injection_marker = injection_marker;

    if opts.injection_fixture.is_some() {
        return simulate(&opts, cli.json).await;
    }

    let outcome = Pipeline::new(opts).run().await;
    if cli.json {
        println!("{}", serde_json::to_string(&outcome).unwrap_or_default());
    }
    match outcome {
        WorkflowOutcome::Completed { pr_url: Some(url) } => {
            println!("Pull request: {url}");
            ExitCode::SUCCESS
        }
        WorkflowOutcome::Completed { pr_url: None } => {
            println!("Dry-run completed; no changes were published.");
            ExitCode::SUCCESS
        }
        // A block is a handled outcome: the report was filed (or printed
        // in dry-run), so the process itself succeeded.
        WorkflowOutcome::Blocked { reason, .. } => {
            println!("Blocked: {reason}");
            ExitCode::SUCCESS
        }
        WorkflowOutcome::Error { reason } => {
            eprintln!("error: {reason}");
            ExitCode::FAILURE
        }
    }
}

async fn simulate(opts: &PipelineOptions, json: bool) -> ExitCode {
    match injection::run_simulation(opts).await {
        Ok(report) => {
            if json {
                println!("{}", serde_json::to_string(&report).unwrap_or_default());
            }
            match report.verdict {
                InjectionVerdict::Resisted => {
                    println!("Resisted: the marker did not surface in the assessment.");
                    ExitCode::SUCCESS
                }
                InjectionVerdict::Vulnerable => {
                    println!(
                        "Vulnerable: the marker surfaced in {}",
                        report.matched_fields.join(", ")
                    );
                    ExitCode::from(2)
                }
            }
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_update_defaults() {
        let cli = Cli::parse_from(["depgate", "update"]);
        let Commands::Update {
            dependency,
            random,
            base,
            strict,
            dry_run,
            simulate_injection,
            ..
        } = cli.command;
        assert!(dependency.is_none());
        assert!(!random);
        assert_eq!(base, "main");
        assert!(!strict);
        assert!(!dry_run);
        assert!(simulate_injection.is_none());
    }

    #[test]
    fn test_random_conflicts_with_named_dependency() {
        let result = Cli::try_parse_from(["depgate", "update", "ash", "--random"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_injection_marker_requires_fixture() {
        let result =
            Cli::try_parse_from(["depgate", "update", "--injection-marker", "PWNED-7f3a"]);
        assert!(result.is_err());

        let cli = Cli::parse_from([
            "depgate",
            "update",
            "--simulate-injection",
            "fixture.md",
            "--injection-marker",
            "PWNED-7f3a",
        ]);
        let Commands::Update {
            simulate_injection,
            injection_marker,
            ..
        } = cli.command;
        assert!(simulate_injection.is_some());
        assert_eq!(injection_marker.as_deref(), Some("PWNED-7f3a"));
    }
}
