//! LENDBOT: chat-driven watchlist and lending-rate assistant
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the store from disk, and serves chat commands until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use lendbot::chat::{CommitPolicy, SessionRouter};
use lendbot::config::{self, AppConfig};
use lendbot::exchange::ftx::{FtxClient, FtxCredentials};
use lendbot::exchange::lending::LendingLoop;
use lendbot::exchange::LendingControl;
use lendbot::storage::PersistedStore;
use lendbot::transport::{self, telegram::TelegramTransport};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    info!(
        store = %cfg.store.path,
        exchange = %cfg.exchange.base_url,
        await_writes = cfg.store.await_writes,
        "LENDBOT starting up"
    );

    // -- Startup requirements --------------------------------------------

    let token = cfg.bot_token()?;
    let store = PersistedStore::load(&cfg.store.path)?;

    // -- Initialise components -------------------------------------------

    let credentials = match (
        AppConfig::resolve_secret(cfg.exchange.api_key_env.as_deref()),
        AppConfig::resolve_secret(cfg.exchange.api_secret_env.as_deref()),
    ) {
        (Some(api_key), Some(api_secret)) => Some(FtxCredentials {
            api_key,
            api_secret,
            subaccount: cfg
                .exchange
                .subaccount_env
                .as_deref()
                .and_then(|env| std::env::var(env).ok())
                .filter(|s| !s.is_empty()),
        }),
        _ => {
            warn!("No exchange API credentials configured: /balance and lending will fail");
            None
        }
    };

    let exchange = Arc::new(FtxClient::new(&cfg.exchange.base_url, credentials)?);

    let lending = Arc::new(LendingLoop::new(
        exchange.clone(),
        Duration::from_secs(cfg.lending.interval_secs),
        cfg.lending.min_rate,
    ));

    let policy = if cfg.store.await_writes {
        CommitPolicy::Awaited
    } else {
        CommitPolicy::Background
    };

    let mut router = SessionRouter::new(store.clone(), exchange, lending.clone())
        .with_commit_policy(policy)
        .with_top_limit(cfg.lending.top_limit);

    let mut telegram =
        TelegramTransport::new(&cfg.bot.api_base, token, cfg.bot.poll_timeout_secs)?;

    // -- Serve -----------------------------------------------------------

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
    };

    info!("Entering main loop. Press Ctrl+C to stop.");
    transport::serve(&mut telegram, &mut router, shutdown).await?;

    // -- Shutdown --------------------------------------------------------

    lending.stop();
    store.commit().wait().await?;
    info!("LENDBOT shut down cleanly.");

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lendbot=info"));

    let json_logging = std::env::var("LENDBOT_LOG_JSON").is_ok();

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
