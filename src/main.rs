//! Harvest keeper: entry point.
//!
//! Loads configuration, initialises structured logging, checks the engine
//! contract, then runs the harvest loop until Ctrl+C. Configuration and
//! preflight failures exit non-zero before the first tick.

use alloy::primitives::utils::format_ether;
use anyhow::Result;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use harvest_keeper::chain::engine::EngineClient;
use harvest_keeper::chain::HarvestTarget;
use harvest_keeper::config::KeeperConfig;
use harvest_keeper::engine::PipelineSettings;
use harvest_keeper::scheduler::Scheduler;
use harvest_keeper::status;

const BANNER: &str = r#"
═══════════════════════════════════════════════
  Harvest Keeper v0.1.0
═══════════════════════════════════════════════
"#;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Fatal error");
            eprintln!("Fatal error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    println!("{BANNER}");

    let cfg = KeeperConfig::load(None)?;
    let client = EngineClient::new(&cfg)?;

    info!(
        keeper = %client.operator_address(),
        engine = %cfg.engine_address,
        interval_secs = cfg.interval.as_secs(),
        min_profit_usd = %cfg.min_profit_usd,
        min_gas_balance = %format_ether(cfg.min_gas_balance),
        rpc = %cfg.rpc_url,
        "Keeper configuration"
    );

    let target: Arc<dyn HarvestTarget> = Arc::new(client);
    let settings = PipelineSettings::from(&cfg);
    let (_engine, handle) = Scheduler::start(target, &settings, cfg.interval).await?;

    if let Some(port) = cfg.status_port {
        if let Err(e) = status::spawn_status_server(handle.snapshots(), port).await {
            warn!(error = %format!("{e:#}"), "Status server disabled");
        }
    }

    info!("Press Ctrl+C to stop.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C; stopping");
    }
    info!("Shutdown signal received.");

    let state = handle.stop().await?;
    info!(
        harvests = state.harvest_count(),
        total_harvested = %format_ether(state.total_bounty_earned()),
        "Keeper shut down cleanly."
    );
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("harvest_keeper=info"));

    let json_logging = std::env::var("KEEPER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
