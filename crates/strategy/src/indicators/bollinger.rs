//! Bollinger Bands indicator
//!
//! Middle = SMA(period), Upper/Lower = Middle ± multiplier · σ
//! (population standard deviation over the same window).

use common::SignalSide;

use super::average::{sma, std_dev};
use crate::params::BollingerParams;

/// Band width, relative to the middle band, below which the bands count as
/// collapsed.
const COLLAPSED_WIDTH: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl Bands {
    /// Position of `price` within the bands: 0 at the lower band, 1 at the
    /// upper band. Undefined when the bands have collapsed to rounding noise.
    pub fn percent_b(&self, price: f64) -> Option<f64> {
        let width = self.upper - self.lower;
        if width <= COLLAPSED_WIDTH * self.middle.abs() {
            return None;
        }
        Some((price - self.lower) / width)
    }
}

pub fn bands(closes: &[f64], period: usize, multiplier: f64) -> Option<Bands> {
    let middle = sma(closes, period)?;
    let sd = std_dev(closes, period)?;
    Some(Bands {
        upper: middle + multiplier * sd,
        middle,
        lower: middle - multiplier * sd,
    })
}

/// BUY when %B drops below `percentage_b`, SELL when it rises above
/// `1 - percentage_b`.
pub fn evaluate(params: &BollingerParams, closes: &[f64]) -> Option<SignalSide> {
    let bands = bands(closes, params.period, params.multiplier)?;
    let last = *closes.last()?;
    let pb = bands.percent_b(last)?;
    if pb < params.percentage_b {
        Some(SignalSide::Buy)
    } else if pb > 1.0 - params.percentage_b {
        Some(SignalSide::Sell)
    } else {
        None
    }
}
