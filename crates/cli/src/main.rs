use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use commands::Commands;
use engine_config::{Severity, load_config, validate_config, validate_document};
use engine_runtime::{RunOptions, run_pipeline_loop};
use storage::StoreRegistry;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;

mod commands;
mod error;
mod output;

#[derive(Parser)]
#[command(
    name = "conveyor",
    version,
    about = "Copies objects between stores through a transform chain"
)]
struct Cli {
    #[arg(long, global = true, help = "Enable debug logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let registry = StoreRegistry::with_defaults();

    match cli.command {
        Commands::Run {
            config,
            parallelism,
            op_timeout,
            progress,
        } => {
            let config = load_config(Path::new(&config))?;

            let report = validate_config(&config, &registry);
            for finding in &report.findings {
                match finding.severity {
                    Severity::Error => tracing::error!(code = %finding.code, "{}", finding.message),
                    Severity::Warning => tracing::warn!(code = %finding.code, "{}", finding.message),
                    Severity::Info => info!(code = %finding.code, "{}", finding.message),
                }
            }
            if !report.passed() {
                return Err(CliError::ValidationFailed);
            }

            let options = RunOptions {
                parallelism,
                op_timeout: Duration::from_secs(op_timeout),
                progress: progress.then(|| {
                    Arc::new(|worker: usize, processed: usize, total: usize| {
                        println!("worker {worker}: {processed}/{total} objects done");
                    }) as engine_runtime::ProgressFn
                }),
                ..RunOptions::default()
            };

            let summary = run_pipeline_loop(&registry, config, options).await?;
            output::emit(&summary, None)?;
        }
        Commands::Validate { config, output } => {
            let raw = std::fs::read_to_string(&config)?;
            let report = validate_document(&raw, &registry);
            output::emit(&report, output.as_deref())?;
            if !report.passed() {
                return Err(CliError::ValidationFailed);
            }
        }
        Commands::Hash { config } => {
            let config = load_config(Path::new(&config))?;
            println!("{}", config.hash());
        }
    }
    Ok(())
}
