use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Strategy not found: {0}")]
    NotFound(String),

    #[error("Strategy already registered: {0}")]
    Duplicate(String),

    #[error("Tick source error: {0}")]
    Feed(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rejections raised before a strategy or process setting is accepted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("strategy id must not be empty")]
    EmptyId,

    #[error("instrument must not be empty")]
    EmptyInstrument,

    #[error("amount must be a positive number, got {0}")]
    InvalidAmount(f64),

    #[error("{name} must be at least {min}, got {value}")]
    PeriodTooShort {
        name: &'static str,
        value: usize,
        min: usize,
    },

    #[error("RSI thresholds must satisfy 0 <= oversold < overbought <= 100, got oversold={oversold} overbought={overbought}")]
    ThresholdOrder { oversold: f64, overbought: f64 },

    #[error("MACD fast period ({fast}) must be less than slow period ({slow})")]
    PeriodOrder { fast: usize, slow: usize },

    #[error("MACD threshold must be a non-negative number, got {0}")]
    InvalidThreshold(f64),

    #[error("Bollinger multiplier must be a non-negative number, got {0}")]
    InvalidMultiplier(f64),

    #[error("Bollinger percentage_b must lie in (0, 0.5), got {0}")]
    PercentageBOutOfRange(f64),

    #[error("environment variable '{key}': {reason}")]
    Env { key: String, reason: String },

    #[error("strategy file '{path}': {reason}")]
    File { path: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
