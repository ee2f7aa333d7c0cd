//! GBM Risk - Monte Carlo risk analytics from live market microstructure
//!
//! Parameters are estimated from per-second aggregates and recent order
//! flow; when market data is unavailable a fixed fallback triple is used
//! and reported as such.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use gbm_risk::cli::commands;
use gbm_risk::config::Config;

/// GBM Risk - Monte Carlo risk analytics service
#[derive(Parser)]
#[command(name = "gbm-risk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Emit logs as JSON
    #[arg(long, env = "GBM_RISK_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve,

    /// Compute one risk report and print it as JSON
    Report {
        /// Ticker symbol
        #[arg(short, long, default_value = "SPY")]
        ticker: String,

        /// Number of sample paths to include (default from config)
        #[arg(short, long)]
        sample_size: Option<usize>,
    },

    /// Acquire GBM parameters without simulating
    Params {
        /// Ticker symbol
        #[arg(short, long, default_value = "SPY")]
        ticker: String,
    },

    /// Show current configuration (secrets masked)
    Config,

    /// Check market data provider reachability
    Health,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        "gbm_risk=info"
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into()),
    );

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.log_json);

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Serve => commands::serve(&config).await,
        Commands::Report {
            ticker,
            sample_size,
        } => commands::report(&config, &ticker, sample_size).await,
        Commands::Params { ticker } => commands::params(&config, &ticker).await,
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
