use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, FeedMode, TickSource};
use market::BinanceFeed;
use paper::PaperFeed;
use strategy::{SchedulerConfig, SignalSink, StrategyFileConfig, StrategyRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid environment configuration")?;

    // ── Logging ──────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cfg.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    info!(feed = %cfg.feed_mode, tick_interval = ?cfg.tick_interval, "SignalBot starting");

    // ── Strategy file ─────────────────────────────────────────────────────────
    let strategy_file = match StrategyFileConfig::load(&cfg.strategy_config_path) {
        Ok(file) => file,
        Err(e) => {
            warn!(error = %e, "No strategies loaded, starting empty");
            StrategyFileConfig::default()
        }
    };

    // ── Tick source (selected by FEED_MODE) ───────────────────────────────────
    let feed: Arc<dyn TickSource> = match cfg.feed_mode {
        FeedMode::Binance => {
            let instruments = strategy_file.instruments();
            info!(?instruments, "Binance feed selected");
            Arc::new(BinanceFeed::spawn(instruments))
        }
        FeedMode::Paper => {
            info!(
                start_price = cfg.paper_start_price,
                volatility = cfg.paper_volatility,
                "Paper feed selected"
            );
            Arc::new(PaperFeed::new(cfg.paper_start_price, cfg.paper_volatility))
        }
    };

    // ── Registry ──────────────────────────────────────────────────────────────
    let registry = StrategyRegistry::new(
        feed,
        SchedulerConfig::from(&cfg),
        SignalSink::new(cfg.signal_buffer),
    );

    // ── Signal consumer ───────────────────────────────────────────────────────
    let mut signals = registry.subscribe();
    tokio::spawn(async move {
        loop {
            match signals.recv().await {
                Ok(signal) => info!(
                    strategy = %signal.strategy_id,
                    instrument = %signal.instrument,
                    side = %signal.side,
                    price = signal.price,
                    amount = signal.amount,
                    at = %signal.generated_at,
                    "Trade signal"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Signal consumer lagged, signals dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // ── Register and activate ────────────────────────────────────────────────
    for entry in &strategy_file.strategies {
        if let Err(e) = registry.register(entry.id.clone(), entry.config()).await {
            error!(id = %entry.id, error = %e, "Skipping strategy");
            continue;
        }
        if entry.activate {
            if let Err(e) = registry.activate(&entry.id).await {
                error!(id = %entry.id, error = %e, "Activation failed");
            }
        }
    }

    info!(
        registered = registry.len().await,
        active = registry.active_tasks().await,
        "Strategies loaded. Waiting for shutdown signal."
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    registry.shutdown().await;
    info!("Exiting");
    Ok(())
}
