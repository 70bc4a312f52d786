use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use common::{Tick, TradeSignal};

use crate::config::StrategyConfig;
use crate::indicators::{self, IndicatorMemory};
use crate::window::PriceWindow;

/// Counters shared between an evaluation task and registry snapshots.
#[derive(Debug, Default)]
pub struct EvaluationStats {
    cycles: AtomicU64,
    evaluations: AtomicU64,
    signals: AtomicU64,
    failures: AtomicU64,
    /// Millis since epoch of the last completed cycle, 0 = never.
    last_run_ms: AtomicI64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvaluationStatsSnapshot {
    pub cycles: u64,
    pub evaluations: u64,
    pub signals: u64,
    pub failures: u64,
    pub last_run: Option<DateTime<Utc>>,
}

impl EvaluationStats {
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_cycle(&self, outcome: &CycleOutcome) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if let CycleOutcome::Evaluated(signal) = outcome {
            self.evaluations.fetch_add(1, Ordering::Relaxed);
            if signal.is_some() {
                self.signals.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.last_run_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EvaluationStatsSnapshot {
        let last_run_ms = self.last_run_ms.load(Ordering::Relaxed);
        EvaluationStatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            evaluations: self.evaluations.load(Ordering::Relaxed),
            signals: self.signals.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            last_run: (last_run_ms != 0)
                .then(|| Utc.timestamp_millis_opt(last_run_ms).single())
                .flatten(),
        }
    }
}

/// What one cycle did with its tick.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Tick was not newer than the last sample; window untouched.
    Stale,
    /// Window still filling; indicator not evaluated.
    Warming { have: usize, need: usize },
    /// Indicator evaluated, possibly producing a signal.
    Evaluated(Option<TradeSignal>),
}

/// Mutable evaluation state of one strategy: its price window and the
/// indicator memory between cycles.
///
/// Owned by exactly one evaluation task while the strategy is active and
/// handed back to the registry when the task stops.
#[derive(Debug)]
pub struct StrategyRuntime {
    id: String,
    config: StrategyConfig,
    window: PriceWindow,
    memory: IndicatorMemory,
    stats: Arc<EvaluationStats>,
}

impl StrategyRuntime {
    pub fn new(id: impl Into<String>, config: StrategyConfig, stats: Arc<EvaluationStats>) -> Self {
        let window = PriceWindow::new(config.params.window_len());
        Self {
            id: id.into(),
            config,
            window,
            memory: IndicatorMemory::default(),
            stats,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn instrument(&self) -> &str {
        &self.config.instrument
    }

    pub fn window(&self) -> &PriceWindow {
        &self.window
    }

    pub fn stats(&self) -> &Arc<EvaluationStats> {
        &self.stats
    }

    /// Append `tick` to the window and evaluate the indicator once the
    /// window holds enough samples.
    pub fn on_tick(&mut self, tick: &Tick) -> CycleOutcome {
        let outcome = self.step(tick);
        self.stats.record_cycle(&outcome);
        outcome
    }

    fn step(&mut self, tick: &Tick) -> CycleOutcome {
        if !self.window.push(tick.price, tick.timestamp) {
            return CycleOutcome::Stale;
        }

        let need = self.config.params.window_len();
        if self.window.len() < need {
            return CycleOutcome::Warming {
                have: self.window.len(),
                need,
            };
        }

        let closes = self.window.prices();
        let signal = indicators::evaluate(&self.config.params, &closes, &mut self.memory).map(
            |side| TradeSignal {
                strategy_id: self.id.clone(),
                instrument: self.config.instrument.clone(),
                side,
                price: tick.price,
                amount: self.config.amount,
                generated_at: Utc::now(),
            },
        );
        CycleOutcome::Evaluated(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{BollingerParams, MacdParams, RsiParams, StrategyParams};
    use common::SignalSide;

    fn tick(i: i64, price: f64) -> Tick {
        Tick::new("BTCUSDT", price, Utc.timestamp_opt(1_700_000_000 + i, 0).unwrap())
    }

    fn runtime(params: StrategyParams) -> StrategyRuntime {
        let config = StrategyConfig::new("BTCUSDT", 0.5, params);
        StrategyRuntime::new("test", config, Arc::new(EvaluationStats::default()))
    }

    fn signals(outcomes: &[CycleOutcome]) -> Vec<(usize, SignalSide)> {
        outcomes
            .iter()
            .enumerate()
            .filter_map(|(i, o)| match o {
                CycleOutcome::Evaluated(Some(s)) => Some((i, s.side)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn rsi_14_rising_ticks_emit_sell_on_the_14th() {
        let mut rt = runtime(StrategyParams::Rsi(RsiParams::default()));
        let outcomes: Vec<_> = (0..14).map(|i| rt.on_tick(&tick(i, 100.0 + i as f64))).collect();

        assert!(matches!(outcomes[0], CycleOutcome::Warming { have: 1, need: 14 }));
        assert!(outcomes[..13]
            .iter()
            .all(|o| matches!(o, CycleOutcome::Warming { .. })));
        assert_eq!(signals(&outcomes), vec![(13, SignalSide::Sell)]);

        if let CycleOutcome::Evaluated(Some(signal)) = &outcomes[13] {
            assert_eq!(signal.strategy_id, "test");
            assert_eq!(signal.price, 113.0);
            assert_eq!(signal.amount, 0.5);
        }
    }

    #[test]
    fn macd_breakout_emits_exactly_one_buy_at_the_crossing() {
        let mut rt = runtime(StrategyParams::Macd(MacdParams::default()));
        let mut outcomes = Vec::new();
        for i in 0..34 {
            outcomes.push(rt.on_tick(&tick(i, 100.0)));
        }
        for step in 1..=8 {
            let i = 33 + step;
            outcomes.push(rt.on_tick(&tick(i, 100.0 + step as f64)));
        }

        assert!(matches!(outcomes[33], CycleOutcome::Evaluated(None)));
        assert_eq!(signals(&outcomes), vec![(34, SignalSide::Buy)]);
    }

    #[test]
    fn macd_on_a_non_integer_ramp_never_sells() {
        let mut rt = runtime(StrategyParams::Macd(MacdParams::default()));
        let outcomes: Vec<_> = (0..300)
            .map(|i| rt.on_tick(&tick(i, 45_000.0 + 0.37 * i as f64)))
            .collect();

        let found = signals(&outcomes);
        assert!(found.iter().all(|(_, side)| *side == SignalSide::Buy), "{found:?}");
        assert!(found.len() <= 1, "{found:?}");
    }

    #[test]
    fn macd_flat_then_ramp_buys_once_at_the_turn() {
        let mut rt = runtime(StrategyParams::Macd(MacdParams::default()));
        let outcomes: Vec<_> = (0..300)
            .map(|i| {
                let price = if i < 40 { 45_000.0 } else { 45_000.0 + 0.37 * (i - 39) as f64 };
                rt.on_tick(&tick(i, price))
            })
            .collect();
        assert_eq!(signals(&outcomes), vec![(40, SignalSide::Buy)]);
    }

    #[test]
    fn stale_tick_leaves_window_untouched() {
        let mut rt = runtime(StrategyParams::Rsi(RsiParams::default()));
        rt.on_tick(&tick(5, 100.0));
        assert_eq!(rt.on_tick(&tick(5, 101.0)), CycleOutcome::Stale);
        assert_eq!(rt.on_tick(&tick(4, 101.0)), CycleOutcome::Stale);
        assert_eq!(rt.window().prices(), vec![100.0]);
    }

    #[test]
    fn window_capacity_follows_indicator() {
        let rt = runtime(StrategyParams::Bollinger(BollingerParams::default()));
        assert_eq!(rt.window().capacity(), 20);
        let rt = runtime(StrategyParams::Macd(MacdParams::default()));
        assert_eq!(rt.window().capacity(), 34);
    }

    #[test]
    fn stats_count_cycles_evaluations_and_signals() {
        let mut rt = runtime(StrategyParams::Rsi(RsiParams { period: 3, ..RsiParams::default() }));
        for i in 0..5 {
            rt.on_tick(&tick(i, 100.0 + i as f64));
        }
        rt.stats().record_failure();

        let snap = rt.stats().snapshot();
        assert_eq!(snap.cycles, 5);
        assert_eq!(snap.evaluations, 3);
        assert_eq!(snap.signals, 3);
        assert_eq!(snap.failures, 1);
        assert!(snap.last_run.is_some());
    }

    #[test]
    fn fresh_stats_have_no_last_run() {
        let stats = EvaluationStats::default();
        assert_eq!(stats.snapshot().last_run, None);
    }
}
