use anyhow::Result;
use clap::{Parser, Subcommand};
use claimsync::AppState;
use claimsync::shared::config::AppConfig;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "claimsync")]
#[command(about = "Offline sync agent for the claims client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// SQLite database URL
    #[arg(long, env = "CLAIMSYNC_DATABASE_URL")]
    database_url: Option<String>,

    /// Base URL of the claims API
    #[arg(long, env = "CLAIMSYNC_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep draining in the background until Ctrl+C (default)
    Run,
    /// Run a single drain pass over both queues and exit
    Drain,
    /// Print pending work as JSON and exit
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.json_logs)?;

    let mut config = AppConfig::from_env();
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }
    if let Some(base_url) = cli.api_base_url {
        config.remote.base_url = base_url;
    }

    info!("Starting claimsync v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::new(config).await?;
    state.start().await?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&state).await?,
        Commands::Drain => drain_once(&state).await,
        Commands::Status => print_status(&state).await?,
    }

    state.shutdown().await;
    Ok(())
}

async fn run(state: &AppState) -> Result<()> {
    let cancel = CancellationToken::new();
    let probe = state.probe().spawn(cancel.child_token());
    let scheduler = state.scheduler().spawn(cancel.child_token());

    info!("Sync agent is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down sync agent...");

    cancel.cancel();
    for (name, handle) in [("probe", probe), ("scheduler", scheduler)] {
        if let Err(err) = handle.await {
            warn!("{} task ended abnormally: {}", name, err);
        }
    }
    Ok(())
}

async fn drain_once(state: &AppState) {
    let online = state.probe().check_once().await;
    if !online {
        warn!("API unreachable; nothing drained");
        return;
    }
    state.scheduler().drain_all().await;
    info!(
        pending_operations = state.retry_queue.pending_count(None),
        unsynced = state.record_store.unsynced_count().await,
        "drain pass finished"
    );
}

async fn print_status(state: &AppState) -> Result<()> {
    let status = json!({
        "records": state.record_store.status().await,
        "pendingOperations": state.retry_queue.pending_operations(),
        "pendingChanges": state.record_store.pending_changes().await,
        "metrics": state.metrics.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = if json {
        fmt::layer().json().with_current_span(false).boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
