//! Edgeward target controller.

use clap::{Parser, Subcommand, ValueEnum};
use edgeward_config::ControllerConfig;
use edgeward_controller::runner;
use edgeward_core::Target;
use kube::{Client, CustomResourceExt};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "edgeward-controller")]
#[command(about = "Reconciles Edgeward Target resources", long_about = None)]
struct Cli {
    /// Path to a KDL configuration file
    #[arg(long, env = "EDGEWARD_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch and reconcile Targets (default)
    Run,
    /// Print the Target CustomResourceDefinition as JSON
    Crd,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Crd => {
            println!("{}", serde_json::to_string_pretty(&Target::crd())?);
        }
        Commands::Run => {
            init_tracing(cli.log_format);
            let config = ControllerConfig::load(cli.config.as_deref())?;
            run(config).await?;
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(config: ControllerConfig) -> anyhow::Result<()> {
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = cancel_tx.send(true);
    });

    runner::run(client, config, cancel_rx).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, cancelling in-flight calls"),
        _ = terminate => info!("Received terminate signal, cancelling in-flight calls"),
    }
}
