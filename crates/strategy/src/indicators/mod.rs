pub mod average;
pub mod bollinger;
pub mod macd;
pub mod rsi;

use common::SignalSide;

use crate::params::StrategyParams;

/// Per-strategy values carried from one evaluation cycle to the next.
/// Only MACD uses it: its running EMAs and last histogram.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorMemory {
    pub macd: Option<macd::MacdState>,
}

/// Run the indicator selected by `params` over `closes` (oldest first) and
/// decide whether the latest value warrants a signal.
///
/// Given the same closes, params and memory the result is always the same;
/// `memory` is the only thing written.
pub fn evaluate(
    params: &StrategyParams,
    closes: &[f64],
    memory: &mut IndicatorMemory,
) -> Option<SignalSide> {
    match params {
        StrategyParams::Rsi(p) => rsi::evaluate(p, closes),
        StrategyParams::Macd(p) => macd::evaluate(p, closes, &mut memory.macd),
        StrategyParams::Bollinger(p) => bollinger::evaluate(p, closes),
    }
}
