//! Chainwatch Observer CLI
//!
//! Entry point for the observer binary. Provides subcommands for:
//! - `run` - Start the observation engine
//! - `backfill` - Scan a historical block range through the live pipeline
//! - `version` - Show version information

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use tracing::info;

use chainwatch_observer::config::Settings;
use chainwatch_observer::types::parse_address;
use chainwatch_observer::{BackfillRequest, ObservationEngine};

/// Chainwatch blockchain observation engine
#[derive(Parser, Debug)]
#[command(name = "chainwatch-observer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Environment name (selects config/{environment}.toml)
    #[arg(short, long, env = "OBSERVER_ENV", default_value = "development")]
    environment: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the observation engine
    Run {
        /// Addresses to watch for transactions (0x-prefixed hex)
        #[arg(long)]
        watch: Vec<String>,
    },

    /// Backfill a historical block range
    Backfill {
        /// Starting block number
        #[arg(long)]
        from: u64,

        /// Ending block number (defaults to the current head)
        #[arg(long)]
        to: Option<u64>,

        /// Restrict to transactions involving this address
        #[arg(long)]
        address: Option<String>,
    },

    /// Show version information
    Version,
}

fn init_tracing(settings: &Settings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(settings.logging.level.clone()));

    if settings.logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Environment files are optional; ignore a missing .env.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if matches!(cli.command, Commands::Version) {
        println!("chainwatch-observer {}", chainwatch_observer::VERSION);
        return Ok(());
    }

    let settings =
        Settings::load(&cli.environment).wrap_err("failed to load configuration")?;
    init_tracing(&settings);

    info!(
        version = chainwatch_observer::VERSION,
        environment = %cli.environment,
        "Starting Chainwatch Observer"
    );

    match cli.command {
        Commands::Run { watch } => run(settings, watch).await,
        Commands::Backfill { from, to, address } => backfill(settings, from, to, address).await,
        Commands::Version => Ok(()),
    }
}

/// Start the engine and stream published events to the log until ctrl-c.
async fn run(settings: Settings, watch: Vec<String>) -> eyre::Result<()> {
    let engine = ObservationEngine::start(settings)
        .await
        .wrap_err("engine startup failed")?;

    for raw in &watch {
        let address = parse_address(raw).map_err(|e| eyre::eyre!(e.to_string()))?;
        engine.add_address_to_monitor(address).await?;
    }

    engine.start_event_monitoring().await?;
    if !watch.is_empty() {
        engine.start_transaction_monitoring().await?;
    }

    let mut subscription = engine.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            maybe_event = subscription.events.recv() => {
                match maybe_event {
                    Some(event) => info!(?event, "engine event"),
                    None => break,
                }
            }
        }
    }

    engine.disconnect().await;
    Ok(())
}

/// Run one historical scan and report the range.
async fn backfill(
    settings: Settings,
    from: u64,
    to: Option<u64>,
    address: Option<String>,
) -> eyre::Result<()> {
    let engine = ObservationEngine::start(settings)
        .await
        .wrap_err("engine startup failed")?;
    engine.start_event_monitoring().await?;

    let address = address
        .map(|raw| parse_address(&raw).map_err(|e| eyre::eyre!(e.to_string())))
        .transpose()?;
    if let Some(address) = address {
        engine.add_address_to_monitor(address).await?;
        engine.start_transaction_monitoring().await?;
    }

    let (from, to) = engine
        .backfill_transactions(BackfillRequest {
            from_block: from,
            to_block: to,
            address,
        })
        .await
        .wrap_err("backfill failed")?;

    let stats = engine.monitoring_stats().await?;
    info!(
        from,
        to,
        confirmed = stats.confirmed_transactions,
        pending = stats.pending_transactions,
        "Backfill finished"
    );

    engine.disconnect().await;
    Ok(())
}
