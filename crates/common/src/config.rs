use std::str::FromStr;
use std::time::Duration;

use crate::{ConfigError, FeedMode};

/// All configuration loaded from environment variables at startup.
/// Every variable is optional; unparseable values are rejected.
#[derive(Debug, Clone)]
pub struct Config {
    // Tick source
    pub feed_mode: FeedMode,
    pub paper_start_price: f64,
    pub paper_volatility: f64,

    // Scheduler
    pub tick_interval: Duration,
    pub stop_timeout: Duration,

    // Signal sink
    pub signal_buffer: usize,

    // Logging
    pub json_logs: bool,

    // Strategy config file path
    pub strategy_config_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let feed_mode = match lookup("FEED_MODE")
            .unwrap_or_else(|| "paper".to_string())
            .to_lowercase()
            .as_str()
        {
            "paper" => FeedMode::Paper,
            "binance" => FeedMode::Binance,
            other => {
                return Err(ConfigError::Env {
                    key: "FEED_MODE".into(),
                    reason: format!("must be 'paper' or 'binance', got '{other}'"),
                })
            }
        };

        let json_logs = lookup("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let tick_interval_ms: u64 = parse_or(&lookup, "TICK_INTERVAL_MS", 1_000)?;
        if tick_interval_ms == 0 {
            return Err(ConfigError::Env {
                key: "TICK_INTERVAL_MS".into(),
                reason: "must be greater than zero".into(),
            });
        }

        let signal_buffer: usize = parse_or(&lookup, "SIGNAL_BUFFER", 1_024)?;
        if signal_buffer == 0 {
            return Err(ConfigError::Env {
                key: "SIGNAL_BUFFER".into(),
                reason: "must be greater than zero".into(),
            });
        }

        let paper_start_price: f64 = parse_or(&lookup, "PAPER_START_PRICE", 45_000.0)?;
        if !(paper_start_price.is_finite() && paper_start_price > 0.0) {
            return Err(ConfigError::Env {
                key: "PAPER_START_PRICE".into(),
                reason: format!("must be a positive number, got {paper_start_price}"),
            });
        }

        let paper_volatility: f64 = parse_or(&lookup, "PAPER_VOLATILITY", 100.0)?;
        if !(paper_volatility.is_finite() && paper_volatility >= 0.0) {
            return Err(ConfigError::Env {
                key: "PAPER_VOLATILITY".into(),
                reason: format!("must not be negative, got {paper_volatility}"),
            });
        }

        Ok(Config {
            feed_mode,
            paper_start_price,
            paper_volatility,
            tick_interval: Duration::from_millis(tick_interval_ms),
            stop_timeout: Duration::from_millis(parse_or(&lookup, "STOP_TIMEOUT_MS", 5_000)?),
            signal_buffer,
            json_logs,
            strategy_config_path: lookup("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategies.toml".to_string()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Env {
            key: key.to_string(),
            reason: format!("cannot parse '{raw}': {e}"),
        }),
    }
}
