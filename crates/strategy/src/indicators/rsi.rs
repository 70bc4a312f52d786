use common::SignalSide;

use crate::params::RsiParams;

/// RSI (Relative Strength Index) over the last `period` closes.
///
/// Uses simple (Cutler) averages of the `period - 1` price changes in the
/// window: average gain and average loss are both divided by the number of
/// changes. Returns 100 when there are no losses.
/// Returns `None` if there are fewer than `period` values.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period < 2 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let changes = (period - 1) as f64;

    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), change| {
            if change > 0.0 {
                (g + change, l)
            } else {
                (g, l - change)
            }
        });

    let avg_gain = gains / changes;
    let avg_loss = losses / changes;

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// BUY below `oversold`, SELL above `overbought`, nothing in between.
pub fn evaluate(params: &RsiParams, closes: &[f64]) -> Option<SignalSide> {
    let value = rsi(closes, params.period)?;
    if value < params.oversold {
        Some(SignalSide::Buy)
    } else if value > params.overbought {
        Some(SignalSide::Sell)
    } else {
        None
    }
}
