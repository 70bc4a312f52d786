use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped price observation for an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub instrument: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    pub fn new(instrument: impl Into<String>, price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            instrument: instrument.into(),
            price,
            timestamp,
        }
    }
}

/// Direction of a trade recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalSide {
    Buy,
    Sell,
}

impl std::fmt::Display for SignalSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalSide::Buy => write!(f, "BUY"),
            SignalSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Signal emitted by an evaluation cycle. Produced at most once per cycle
/// per strategy and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub strategy_id: String,
    pub instrument: String,
    pub side: SignalSide,
    /// Price of the tick that triggered the signal.
    pub price: f64,
    /// Configured order amount of the emitting strategy.
    pub amount: f64,
    pub generated_at: DateTime<Utc>,
}

/// Indicator family a strategy evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Rsi,
    Macd,
    Bollinger,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Rsi => write!(f, "RSI"),
            StrategyKind::Macd => write!(f, "MACD"),
            StrategyKind::Bollinger => write!(f, "BOLLINGER"),
        }
    }
}

/// Lifecycle state of a registered strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StrategyState {
    #[default]
    Registered,
    Active,
    Inactive,
    Closed,
}

impl std::fmt::Display for StrategyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyState::Registered => write!(f, "registered"),
            StrategyState::Active => write!(f, "active"),
            StrategyState::Inactive => write!(f, "inactive"),
            StrategyState::Closed => write!(f, "closed"),
        }
    }
}

/// Where ticks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    Paper,
    Binance,
}

impl std::fmt::Display for FeedMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedMode::Paper => write!(f, "paper"),
            FeedMode::Binance => write!(f, "binance"),
        }
    }
}
