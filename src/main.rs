//! Main entry point for the bili-space-downloader CLI

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use bili_space_downloader::cli::{self, Cli, Commands};
use bili_space_downloader::shutdown::{self, ShutdownFlag};

/// Initialize tracing with optional JSON formatting.
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bili_space_downloader=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    // Ctrl+C stops new work from being claimed; in-flight downloads finish
    // and the run still reports.
    let shutdown = ShutdownFlag::shared();
    shutdown::install_global(shutdown.clone());
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl+C received - finishing in-flight work");
                shutdown.trigger();
            }
        }
    });

    match &cli.command {
        Commands::Run(args) => args.execute(&cli.config, true).await?,
        Commands::Scan(args) => args.execute(&cli.config, false).await?,
        Commands::Validate => cli::execute_validate(&cli.config)?,
        Commands::GenerateConfig { force } => cli::execute_generate_config(&cli.config, *force)?,
    }

    Ok(())
}
