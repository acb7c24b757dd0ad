use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sitedrop_deploy::{Config, JsonlSink, Pipeline, PipelineError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;

/// sitedrop - publish static sites from ZIP uploads
#[derive(Parser, Debug)]
#[command(name = "sitedrop")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a ZIP archive and publish it
    Upload(cli::upload::Upload),

    /// Make a preview the live site
    Promote(cli::promote::Promote),

    /// Show today's rate-limit counters for a subject
    Usage(cli::usage::Usage),

    /// Validate and scan an archive without publishing it
    Check(cli::check::Check),
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "configuration loaded");

    let outcome = match cli.command {
        Commands::Upload(cmd) => cmd.run(&pipeline(config)),
        Commands::Promote(cmd) => cmd.run(&pipeline(config)),
        Commands::Usage(cmd) => cmd.run(&pipeline(config)),
        Commands::Check(cmd) => cmd.run(&config),
    };

    match outcome {
        Ok(code) => Ok(code),
        Err(err) => match err.downcast_ref::<PipelineError>() {
            Some(rejected) => {
                cli::print_json(&cli::ErrorBody::from(rejected))?;
                Ok(if rejected.is_fatal() {
                    ExitCode::from(3)
                } else {
                    ExitCode::FAILURE
                })
            }
            None => Err(err),
        },
    }
}

fn pipeline(config: Config) -> Pipeline {
    let pipeline = Pipeline::new(config);
    let sink = JsonlSink::new(pipeline.layout().deployments_log());
    pipeline.with_sink(Arc::new(sink))
}
