use serde::{Deserialize, Serialize};

use common::{ConfigError, StrategyKind};

use crate::params::StrategyParams;

/// Immutable configuration of one strategy. Replacing it means removing the
/// strategy and registering it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Human-readable name shown in logs.
    pub name: String,
    /// Instrument whose ticks drive the strategy, e.g. "BTCUSDT".
    pub instrument: String,
    /// Order amount carried on every emitted signal.
    pub amount: f64,
    /// Indicator-specific parameters.
    pub params: StrategyParams,
}

impl StrategyConfig {
    pub fn new(instrument: impl Into<String>, amount: f64, params: StrategyParams) -> Self {
        let instrument = instrument.into();
        Self {
            name: format!("{} {}", instrument, params.kind()),
            instrument,
            amount,
            params,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn kind(&self) -> StrategyKind {
        self.params.kind()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instrument.trim().is_empty() {
            return Err(ConfigError::EmptyInstrument);
        }
        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(ConfigError::InvalidAmount(self.amount));
        }
        self.params.validate()
    }
}

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// id = "btc-rsi"
/// name = "BTC RSI 14"
/// instrument = "BTCUSDT"
/// amount = 0.001
/// activate = true
///
/// [strategy.indicator]
/// kind = "rsi"
/// period = 14
/// oversold = 30.0
/// overbought = 70.0
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy", default)]
    pub strategies: Vec<StrategyEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyEntry {
    /// Registry identifier; must be unique in the file.
    pub id: String,
    /// Defaults to `"<instrument> <KIND>"`.
    #[serde(default)]
    pub name: Option<String>,
    pub instrument: String,
    pub amount: f64,
    /// Activate right after registration.
    #[serde(default = "default_activate")]
    pub activate: bool,
    pub indicator: StrategyParams,
}

fn default_activate() -> bool {
    true
}

impl StrategyEntry {
    pub fn config(&self) -> StrategyConfig {
        let config = StrategyConfig::new(self.instrument.clone(), self.amount, self.indicator);
        match &self.name {
            Some(name) => config.with_name(name.clone()),
            None => config,
        }
    }
}

impl StrategyFileConfig {
    /// Load from a TOML file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Self::parse(&content).map_err(|reason| ConfigError::File {
            path: path.to_string(),
            reason,
        })
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Distinct instruments in file order.
    pub fn instruments(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.strategies
            .iter()
            .filter(|s| seen.insert(s.instrument.clone()))
            .map(|s| s.instrument.clone())
            .collect()
    }
}
