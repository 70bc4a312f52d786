use serde::{Deserialize, Serialize};

use common::{ConfigError, StrategyKind};

/// RSI parameters. Signals BUY below `oversold`, SELL above `overbought`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiParams {
    pub period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

/// MACD parameters. `threshold` bounds the histogram band a crossing must leave.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
    #[serde(default)]
    pub threshold: f64,
}

/// Bollinger Band parameters. `percentage_b` is the %B distance from either band
/// that triggers a signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerParams {
    pub period: usize,
    pub multiplier: f64,
    pub percentage_b: f64,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self { period: 14, oversold: 30.0, overbought: 70.0 }
    }
}

impl Default for MacdParams {
    fn default() -> Self {
        Self { fast: 12, slow: 26, signal: 9, threshold: 0.0 }
    }
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self { period: 20, multiplier: 2.0, percentage_b: 0.05 }
    }
}

/// Kind-specific indicator configuration. The variant is the strategy kind.
///
/// Decoded from the `[strategy.indicator]` table of the strategy file:
/// ```toml
/// [strategy.indicator]
/// kind = "macd"
/// fast = 12
/// slow = 26
/// signal = 9
/// threshold = 0.0
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StrategyParams {
    Rsi(RsiParams),
    Macd(MacdParams),
    Bollinger(BollingerParams),
}

impl StrategyParams {
    pub fn kind(&self) -> StrategyKind {
        match self {
            StrategyParams::Rsi(_) => StrategyKind::Rsi,
            StrategyParams::Macd(_) => StrategyKind::Macd,
            StrategyParams::Bollinger(_) => StrategyKind::Bollinger,
        }
    }

    /// Number of samples needed before the indicator is defined. Also the
    /// capacity of the strategy's price window.
    pub fn window_len(&self) -> usize {
        match self {
            StrategyParams::Rsi(p) => p.period,
            StrategyParams::Macd(p) => (p.slow + p.signal).saturating_sub(1),
            StrategyParams::Bollinger(p) => p.period,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            StrategyParams::Rsi(p) => {
                min_period("period", p.period, 2)?;
                let ordered = p.oversold >= 0.0 && p.oversold < p.overbought && p.overbought <= 100.0;
                // NaN fails every comparison above
                if !ordered {
                    return Err(ConfigError::ThresholdOrder {
                        oversold: p.oversold,
                        overbought: p.overbought,
                    });
                }
            }
            StrategyParams::Macd(p) => {
                min_period("fast", p.fast, 1)?;
                min_period("signal", p.signal, 1)?;
                if p.fast >= p.slow {
                    return Err(ConfigError::PeriodOrder { fast: p.fast, slow: p.slow });
                }
                if !(p.threshold.is_finite() && p.threshold >= 0.0) {
                    return Err(ConfigError::InvalidThreshold(p.threshold));
                }
            }
            StrategyParams::Bollinger(p) => {
                min_period("period", p.period, 2)?;
                if !(p.multiplier.is_finite() && p.multiplier >= 0.0) {
                    return Err(ConfigError::InvalidMultiplier(p.multiplier));
                }
                if !(p.percentage_b > 0.0 && p.percentage_b < 0.5) {
                    return Err(ConfigError::PercentageBOutOfRange(p.percentage_b));
                }
            }
        }
        Ok(())
    }
}

fn min_period(name: &'static str, value: usize, min: usize) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::PeriodTooShort { name, value, min });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(StrategyParams::Rsi(RsiParams::default()).validate().is_ok());
        assert!(StrategyParams::Macd(MacdParams::default()).validate().is_ok());
        assert!(StrategyParams::Bollinger(BollingerParams::default()).validate().is_ok());
    }

    #[test]
    fn rsi_rejects_inverted_thresholds() {
        let params = StrategyParams::Rsi(RsiParams { period: 14, oversold: 80.0, overbought: 30.0 });
        assert_eq!(
            params.validate(),
            Err(ConfigError::ThresholdOrder { oversold: 80.0, overbought: 30.0 })
        );
    }

    #[test]
    fn rsi_rejects_thresholds_outside_0_100() {
        let params = StrategyParams::Rsi(RsiParams { period: 14, oversold: -1.0, overbought: 70.0 });
        assert!(params.validate().is_err());
        let params = StrategyParams::Rsi(RsiParams { period: 14, oversold: 30.0, overbought: 101.0 });
        assert!(params.validate().is_err());
    }

    #[test]
    fn rsi_rejects_short_period() {
        let params = StrategyParams::Rsi(RsiParams { period: 1, ..RsiParams::default() });
        assert!(matches!(params.validate(), Err(ConfigError::PeriodTooShort { name: "period", .. })));
    }

    #[test]
    fn macd_requires_fast_below_slow() {
        let params = StrategyParams::Macd(MacdParams { fast: 26, slow: 12, ..MacdParams::default() });
        assert_eq!(params.validate(), Err(ConfigError::PeriodOrder { fast: 26, slow: 12 }));
        let params = StrategyParams::Macd(MacdParams { fast: 12, slow: 12, ..MacdParams::default() });
        assert!(params.validate().is_err());
    }

    #[test]
    fn macd_rejects_negative_threshold() {
        let params = StrategyParams::Macd(MacdParams { threshold: -0.5, ..MacdParams::default() });
        assert_eq!(params.validate(), Err(ConfigError::InvalidThreshold(-0.5)));
    }

    #[test]
    fn bollinger_percentage_b_bounds_are_exclusive() {
        for bad in [0.0, 0.5, 0.7, -0.1] {
            let params = StrategyParams::Bollinger(BollingerParams {
                percentage_b: bad,
                ..BollingerParams::default()
            });
            assert!(params.validate().is_err(), "percentage_b={bad} should be rejected");
        }
    }

    #[test]
    fn window_len_covers_signal_line() {
        assert_eq!(StrategyParams::Macd(MacdParams::default()).window_len(), 34);
        assert_eq!(StrategyParams::Rsi(RsiParams::default()).window_len(), 14);
        assert_eq!(StrategyParams::Bollinger(BollingerParams::default()).window_len(), 20);
    }

    #[test]
    fn decodes_internally_tagged_toml() {
        let params: StrategyParams = toml::from_str(
            r#"
            kind = "bollinger"
            period = 20
            multiplier = 2
            percentage_b = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(params.kind(), StrategyKind::Bollinger);
        assert_eq!(
            params,
            StrategyParams::Bollinger(BollingerParams { period: 20, multiplier: 2.0, percentage_b: 0.1 })
        );
    }
}
