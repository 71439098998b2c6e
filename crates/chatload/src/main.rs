//! # chatload CLI
//!
//! Command-line interface for load testing the chat job API.
//!
//! ## Usage
//!
//! ```bash
//! # Reference run: 20 virtual users for 5 seconds
//! chatload --target http://localhost:3000
//!
//! # Heavier run with thresholds from a config file and a JSON summary
//! chatload --config chatload.toml --vus 100 --duration 60 --output results.json
//!
//! # Show the configuration after file, environment and flag overrides
//! chatload --vus 5 show-config
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatload::{HarnessConfig, HttpJobApi, LoadTestRunner, RunGate, VirtualUserScenario};

#[derive(Parser)]
#[command(name = "chatload")]
#[command(version)]
#[command(about = "Load and correctness harness for the chat job API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "CHATLOAD_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the load test (default)
    Run,

    /// Print the effective configuration as TOML
    ShowConfig,
}

/// Flags layered on top of file and environment configuration
#[derive(Args)]
struct Overrides {
    /// Target base URL
    #[arg(short, long, global = true)]
    target: Option<String>,

    /// Concurrent virtual users
    #[arg(long, global = true)]
    vus: Option<usize>,

    /// Test duration in seconds
    #[arg(short, long, global = true)]
    duration: Option<u64>,

    /// Iterations per virtual user
    #[arg(short, long, global = true)]
    iterations: Option<u64>,

    /// Sleep before each status poll, in milliseconds
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    /// Status polls per job before giving up
    #[arg(long, global = true)]
    max_polls: Option<u32>,

    /// Chat message to submit
    #[arg(short, long, global = true)]
    message: Option<String>,

    /// Existing chat id to continue
    #[arg(long, global = true)]
    chat_id: Option<String>,

    /// Bearer token for the API
    #[arg(long, global = true, env = "CHATLOAD_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    /// Output run summary to JSON file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Output Prometheus text metrics to file
    #[arg(long, global = true)]
    metrics_out: Option<PathBuf>,
}

impl Overrides {
    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(target) = &self.target {
            config.target.base_url = target.clone();
        }
        if let Some(vus) = self.vus {
            config.run.vus = vus;
        }
        if let Some(duration) = self.duration {
            config.run.duration_secs = duration;
        }
        if let Some(iterations) = self.iterations {
            config.run.iterations = Some(iterations);
        }
        if let Some(interval) = self.poll_interval_ms {
            config.scenario.poll_interval_ms = interval;
        }
        if let Some(max_polls) = self.max_polls {
            config.scenario.max_poll_attempts = max_polls;
        }
        if let Some(message) = &self.message {
            config.scenario.message = message.clone();
        }
        if let Some(chat_id) = &self.chat_id {
            config.scenario.chat_id = chat_id.clone();
        }
        if let Some(token) = &self.auth_token {
            config.target.auth_token = Some(token.clone());
        }
    }
}

fn init_logging(level: &str, json: bool, verbose: bool) {
    let default_level = if verbose { "debug" } else { level };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer().with_target(false)))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = HarnessConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.overrides.apply(&mut config);
    config.validate()?;

    if let Some(Commands::ShowConfig) = cli.command {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    init_logging(&config.logging.level, config.logging.json, cli.verbose);
    info!(
        "chatload v{}: {} VUs for {}s against {}",
        env!("CARGO_PKG_VERSION"),
        config.run.vus,
        config.run.duration_secs,
        config.target.base_url
    );

    let api = Arc::new(HttpJobApi::new(&config.target)?);
    let scenario = VirtualUserScenario::new(api, &config.scenario);
    let runner = LoadTestRunner::from_config(&config.run, &config.scenario, scenario);
    let gate = Arc::new(RunGate::from_config(&config.run, Instant::now()));

    let metrics = runner.run(gate).await?;
    let summary = metrics.summary();
    summary.print_report();

    let thresholds = summary.check_thresholds(&config.thresholds);
    thresholds.print_report();

    if let Some(output_path) = &cli.overrides.output {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("writing summary to {}", output_path.display()))?;
        info!("Results saved to {}", output_path.display());
    }

    if let Some(metrics_path) = &cli.overrides.metrics_out {
        std::fs::write(metrics_path, metrics.encode_prometheus()?)
            .with_context(|| format!("writing metrics to {}", metrics_path.display()))?;
        info!("Metrics saved to {}", metrics_path.display());
    }

    // Exit with appropriate code
    if !thresholds.passes {
        std::process::exit(1);
    }
    Ok(())
}
