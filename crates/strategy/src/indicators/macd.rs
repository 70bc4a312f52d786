use common::SignalSide;

use super::average::ema_series;
use crate::params::MacdParams;

/// Histogram magnitude, relative to price, that is treated as rounding noise.
/// A crossing must clear `max(threshold, NOISE_TOLERANCE * price)`.
pub const NOISE_TOLERANCE: f64 = 1e-9;

/// MACD values at the newest sample.
///
/// MACD line = EMA(fast) − EMA(slow), signal line = EMA(macd line, signal),
/// histogram = MACD line − signal line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Ema {
    value: f64,
    k: f64,
}

impl Ema {
    fn new(value: f64, period: usize) -> Self {
        Self { value, k: 2.0 / (period as f64 + 1.0) }
    }

    fn update(&mut self, x: f64) -> f64 {
        self.value += self.k * (x - self.value);
        self.value
    }
}

/// Running MACD carried from one cycle to the next, so the EMAs smooth over
/// the strategy's whole history instead of one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdState {
    fast: Ema,
    slow: Ema,
    signal: Ema,
    value: MacdValue,
}

impl MacdState {
    /// Replay `closes` (oldest first) through SMA-seeded EMAs.
    /// Needs at least `slow + signal - 1` prices.
    pub fn seed(params: &MacdParams, closes: &[f64]) -> Option<Self> {
        if params.fast == 0 || params.signal == 0 || params.fast >= params.slow {
            return None;
        }
        if closes.len() < params.slow + params.signal - 1 {
            return None;
        }

        let fast = ema_series(closes, params.fast);
        let slow = ema_series(closes, params.slow);

        // fast starts at index fast-1, slow at slow-1; align on slow
        let offset = params.slow - params.fast;
        let macd_line: Vec<f64> = slow
            .iter()
            .enumerate()
            .map(|(i, s)| fast[i + offset] - s)
            .collect();

        let signal_line = ema_series(&macd_line, params.signal);
        let macd = *macd_line.last()?;
        let signal = *signal_line.last()?;

        Some(Self {
            fast: Ema::new(*fast.last()?, params.fast),
            slow: Ema::new(*slow.last()?, params.slow),
            signal: Ema::new(signal, params.signal),
            value: MacdValue {
                macd,
                signal,
                histogram: macd - signal,
            },
        })
    }

    pub fn value(&self) -> MacdValue {
        self.value
    }

    /// Advance every EMA by one price.
    pub fn update(&mut self, price: f64) -> MacdValue {
        let macd = self.fast.update(price) - self.slow.update(price);
        let signal = self.signal.update(macd);
        self.value = MacdValue {
            macd,
            signal,
            histogram: macd - signal,
        };
        self.value
    }
}

/// Compute MACD from a slice of close prices (oldest first).
/// Needs at least `slow + signal - 1` prices.
pub fn compute(params: &MacdParams, closes: &[f64]) -> Option<MacdValue> {
    MacdState::seed(params, closes).map(|state| state.value())
}

/// Detect a threshold crossing of the histogram between two cycles.
///
/// BUY when it rises from `<= threshold` to `> threshold`, SELL when it
/// falls from `>= -threshold` to `< -threshold`.
pub fn crossing(previous: f64, current: f64, threshold: f64) -> Option<SignalSide> {
    if previous <= threshold && current > threshold {
        Some(SignalSide::Buy)
    } else if previous >= -threshold && current < -threshold {
        Some(SignalSide::Sell)
    } else {
        None
    }
}

/// Evaluate one cycle. The first evaluated cycle seeds `state` from the
/// window and never signals; later cycles advance it by the newest close and
/// compare the histogram with the previous cycle's.
pub fn evaluate(
    params: &MacdParams,
    closes: &[f64],
    state: &mut Option<MacdState>,
) -> Option<SignalSide> {
    let price = *closes.last()?;
    if let Some(current) = state.as_mut() {
        let previous = current.value().histogram;
        let value = current.update(price);
        let threshold = params.threshold.max(NOISE_TOLERANCE * price.abs());
        return crossing(previous, value.histogram, threshold);
    }
    *state = MacdState::seed(params, closes);
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(fast: usize, slow: usize, signal: usize) -> MacdParams {
        MacdParams { fast, slow, signal, threshold: 0.0 }
    }

    fn trending_up(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64 * 0.5).collect()
    }

    #[test]
    fn macd_returns_none_with_insufficient_data() {
        let prices = vec![100.0; 33]; // need >= 34
        assert!(compute(&MacdParams::default(), &prices).is_none());
    }

    #[test]
    fn macd_returns_some_with_exact_data() {
        let prices: Vec<f64> = (0..34).map(|i| 100.0 + i as f64).collect();
        assert!(compute(&MacdParams::default(), &prices).is_some());
    }

    #[test]
    fn flat_series_is_all_zero() {
        let value = compute(&MacdParams::default(), &[100.0; 34]).unwrap();
        assert_eq!(value, MacdValue { macd: 0.0, signal: 0.0, histogram: 0.0 });
    }

    #[test]
    fn uptrend_has_positive_macd_line() {
        let value = compute(&params(3, 6, 3), &trending_up(40)).unwrap();
        assert!(value.macd > 0.0, "macd = {}", value.macd);
    }

    #[test]
    fn linear_trend_macd_matches_ema_lag() {
        // On a linear series an SMA-seeded EMA lags by slope * (period - 1) / 2
        let value = compute(&params(3, 6, 3), &trending_up(40)).unwrap();
        let expected = 0.5 * (6.0 - 3.0) / 2.0;
        assert!((value.macd - expected).abs() < 1e-9, "macd = {}", value.macd);
        assert!(value.histogram.abs() < 1e-9);
    }

    #[test]
    fn breakout_after_flat_turns_histogram_positive() {
        let mut prices = vec![100.0; 30];
        prices.extend((1..=4).map(|i| 100.0 + i as f64));
        let value = compute(&MacdParams::default(), &prices).unwrap();
        assert!(value.macd > 0.0);
        assert!(value.histogram > 0.0);
    }

    #[test]
    fn crossing_respects_threshold_band() {
        assert_eq!(crossing(0.0, 0.1, 0.0), Some(SignalSide::Buy));
        assert_eq!(crossing(0.1, 0.2, 0.0), None);
        assert_eq!(crossing(0.0, -0.1, 0.0), Some(SignalSide::Sell));
        assert_eq!(crossing(0.4, 0.6, 0.5), Some(SignalSide::Buy));
        assert_eq!(crossing(0.4, 0.5, 0.5), None);
        assert_eq!(crossing(-0.4, -0.6, 0.5), Some(SignalSide::Sell));
        assert_eq!(crossing(-0.6, -0.7, 0.5), None);
    }

    fn seeded_flat() -> Option<MacdState> {
        MacdState::seed(&MacdParams::default(), &[100.0; 34])
    }

    #[test]
    fn first_evaluation_only_seeds_state() {
        let mut state = None;
        let mut prices = vec![100.0; 33];
        prices.push(110.0);
        assert_eq!(evaluate(&MacdParams::default(), &prices, &mut state), None);
        assert!(state.unwrap().value().histogram > 0.0);
    }

    #[test]
    fn evaluate_detects_bullish_crossing() {
        let mut state = seeded_flat();
        let mut prices = vec![100.0; 33];
        prices.push(101.0);
        assert_eq!(
            evaluate(&MacdParams::default(), &prices, &mut state),
            Some(SignalSide::Buy)
        );
    }

    #[test]
    fn evaluate_detects_bearish_crossing() {
        let mut state = seeded_flat();
        let mut prices = vec![100.0; 33];
        prices.push(99.0);
        assert_eq!(
            evaluate(&MacdParams::default(), &prices, &mut state),
            Some(SignalSide::Sell)
        );
    }

    #[test]
    fn running_state_matches_full_history() {
        let params = MacdParams::default();
        let history: Vec<f64> = (0..200)
            .map(|i| 45_000.0 + 300.0 * (i as f64 / 7.0).sin() + i as f64)
            .collect();

        let mut state = MacdState::seed(&params, &history[..34]).unwrap();
        for &price in &history[34..] {
            state.update(price);
        }

        let full = compute(&params, &history).unwrap();
        let last_window = compute(&params, &history[history.len() - 34..]).unwrap();
        assert!((state.value().signal - full.signal).abs() < 1e-6);
        assert!((state.value().histogram - full.histogram).abs() < 1e-6);
        assert!((state.value().signal - last_window.signal).abs() > 1e-3);
    }

    fn rolling_signals(prices: &[f64]) -> Vec<(usize, SignalSide)> {
        let params = MacdParams::default();
        let mut state = None;
        let mut out = Vec::new();
        for i in 33..prices.len() {
            if let Some(side) = evaluate(&params, &prices[i - 33..=i], &mut state) {
                out.push((i, side));
            }
        }
        out
    }

    #[test]
    fn steady_ramp_does_not_flip_on_rounding_noise() {
        let ramp: Vec<f64> = (0..300).map(|i| 45_000.0 + 0.37 * i as f64).collect();
        let signals = rolling_signals(&ramp);
        assert!(signals.is_empty(), "{signals:?}");

        let small: Vec<f64> = (0..300).map(|i| 0.13 + 0.0001 * i as f64).collect();
        let signals = rolling_signals(&small);
        assert!(signals.is_empty(), "{signals:?}");
    }

    #[test]
    fn ramp_after_flat_buys_once() {
        let mut prices = vec![45_000.0; 40];
        prices.extend((1..300).map(|i| 45_000.0 + 0.37 * i as f64));
        assert_eq!(rolling_signals(&prices), vec![(40, SignalSide::Buy)]);
    }
}
