//! ZDT - Zero-Downtime migration Testing CLI
//!
//! The `zdt` command deploys successive versions of a service against one
//! shared backing store and verifies every old/new pair stays compatible.
//!
//! ## Commands
//!
//! - `run`: Deploy a version sequence and check each transition
//! - `prepare`: Create the docker network and backing store only
//! - `health`: Poll a running instance until it reports healthy

mod plan;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};

use zdt_core::{
    wait_ready, write_run_report_json, DeploymentOrchestrator, HttpAssetClient, HttpConnector,
    ProbeSuite, ReadinessPolicy, RunReport, RuntimeDeployer, VersionSpec,
};
use zdt_runtime::{is_docker_available, DockerDeployer};

use crate::plan::RunPlan;

#[derive(Parser)]
#[command(name = "zdt")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Zero-downtime migration compatibility harness", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy each version in order, verifying every transition
    Run(RunArgs),

    /// Create the shared network and backing store, then exit
    Prepare,

    /// Wait for an instance to report healthy
    Health {
        /// Instance address (host:port)
        #[arg(short, long)]
        address: String,

        /// Maximum number of health checks
        #[arg(long, default_value_t = zdt_core::readiness::DEFAULT_MAX_ATTEMPTS)]
        attempts: u32,

        /// Seconds to wait after each failed check
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Run plan file (JSON)
    #[arg(short, long, env = "ZDT_PLAN")]
    plan: Option<PathBuf>,

    /// Version to deploy as TAG:PORT (repeatable, replaces the plan's sequence)
    #[arg(long = "version", value_name = "TAG:PORT")]
    versions: Vec<VersionSpec>,

    /// Override the readiness attempt budget
    #[arg(long)]
    attempts: Option<u32>,

    /// Override the pause between readiness attempts
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Write the run report (JSON) to this path
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Assume the network and backing store already exist
    #[arg(long)]
    skip_prepare: bool,

    /// Stop the last promoted version once the run succeeds
    #[arg(long)]
    teardown: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    zdt_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Prepare => cmd_prepare().await,
        Commands::Health {
            address,
            attempts,
            interval_secs,
        } => cmd_health(&address, attempts, interval_secs).await,
    }
}

/// Build the effective plan from the optional file and the flags.
fn resolve_plan(args: &RunArgs) -> Result<RunPlan> {
    let base = match &args.plan {
        Some(path) => RunPlan::load(path)?,
        None => RunPlan::default(),
    };
    let plan = base.with_overrides(args.versions.clone(), args.attempts, args.interval_secs);
    if plan.versions.is_empty() {
        bail!("No versions to deploy: pass --plan FILE or at least one --version TAG:PORT");
    }
    Ok(plan)
}

/// Deploy the version sequence
async fn cmd_run(args: RunArgs) -> Result<()> {
    let plan = resolve_plan(&args)?;
    let connector = HttpConnector::new().context("Failed to build HTTP client")?;
    let mut orchestrator =
        DeploymentOrchestrator::new(DockerDeployer::from_env(), connector, ProbeSuite::standard())
            .with_readiness(plan.readiness);

    if !args.skip_prepare {
        orchestrator
            .prepare()
            .await
            .context("Failed to prepare network and backing store")?;
    }

    info!(
        versions = plan.versions.len(),
        probes = orchestrator.suite().len(),
        "starting migration run"
    );

    let report = match orchestrator.run(&plan.versions).await {
        Ok(report) => report,
        Err(failure) => {
            if let Some(live) = orchestrator.current() {
                eprintln!("Version still serving: {} ({})", live.tag(), live.address());
            }
            return Err(failure).context("Migration run failed");
        }
    };

    print_report(&report);

    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }

    if args.teardown {
        if let Some(tag) = orchestrator
            .shutdown()
            .await
            .context("Failed to stop the promoted version")?
        {
            println!("Stopped {}", tag);
        }
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Migration run succeeded");
    for stage in &report.stages {
        let retired = stage.retired.as_deref().unwrap_or("-");
        println!(
            "  [{}] {} at {}: ready after {} attempt(s), {} probe(s), retired {}",
            stage.index,
            stage.tag,
            stage.address,
            stage.readiness_attempts,
            stage.probes.len(),
            retired
        );
    }
    println!("Serving: {}", report.final_tag);
}

fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    write_run_report_json(path, report)
        .with_context(|| format!("Failed to write run report to {}", path.display()))?;
    println!("Report written to {}", path.display());
    Ok(())
}

/// Create the shared network and backing store
async fn cmd_prepare() -> Result<()> {
    if !is_docker_available().await {
        bail!("docker is not available: install it or start the daemon");
    }

    let deployer = DockerDeployer::from_env();
    deployer
        .prepare()
        .await
        .context("Failed to prepare network and backing store")?;

    let config = deployer.config();
    println!("Network: {}", config.network);
    println!(
        "Backing store: {} ({})",
        config.store_container, config.store_image
    );
    Ok(())
}

/// Poll an instance's health endpoint
async fn cmd_health(address: &str, attempts: u32, interval_secs: u64) -> Result<()> {
    let client = HttpAssetClient::new(address).context("Failed to build HTTP client")?;
    let policy = ReadinessPolicy::new(attempts, Duration::from_secs(interval_secs));

    let attempt = wait_ready(&client, &policy)
        .await
        .with_context(|| format!("{} is not healthy", address))?;

    println!("{} healthy after {} attempt(s)", address, attempt);
    Ok(())
}
