//! Binary entry point for the volwatch service.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use volwatch::{
    config::AppConfig,
    http_client::create_retryable_http_client,
    persistence::sqlite::SqliteStateRepository,
    providers::binance::BinanceDataSource,
    supervisor::Supervisor,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the main monitoring supervisor.
    Run {
        /// Path to the configuration directory.
        #[arg(long)]
        config_dir: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config_dir } => run_supervisor(config_dir.as_deref()).await?,
    }

    Ok(())
}

async fn run_supervisor(config_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!("Loading application configuration...");
    let config = AppConfig::new(config_dir)?;
    tracing::debug!(
        database_url = %config.database_url,
        symbols = ?config.symbols,
        "Configuration loaded."
    );

    tracing::debug!("Initializing state repository...");
    let repo = Arc::new(SqliteStateRepository::new(&config.database_url).await?);
    repo.run_migrations().await?;
    tracing::info!("Database migrations completed.");

    let http_client = Arc::new(create_retryable_http_client(
        &config.http_retry_config,
        reqwest::Client::new(),
    ));
    tracing::info!(retry_policy = ?config.http_retry_config, "HTTP client initialized with retry policy.");

    let data_source =
        BinanceDataSource::new(config.binance_api_url.clone(), Arc::clone(&http_client));

    let supervisor = Supervisor::builder()
        .config(config)
        .state(repo)
        .data_source(Arc::new(data_source))
        .http_client(http_client)
        .build()?;

    tracing::info!("Supervisor initialized, starting monitoring...");

    supervisor.run().await?;

    Ok(())
}
