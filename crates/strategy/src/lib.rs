pub mod config;
pub mod indicators;
pub mod params;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod sink;
pub mod window;

pub use config::{StrategyConfig, StrategyEntry, StrategyFileConfig};
pub use params::{BollingerParams, MacdParams, RsiParams, StrategyParams};
pub use registry::{StrategyRegistry, StrategySnapshot};
pub use runtime::{CycleOutcome, EvaluationStats, EvaluationStatsSnapshot, StrategyRuntime};
pub use scheduler::{EvaluationScheduler, SchedulerConfig};
pub use sink::SignalSink;
pub use window::{PriceWindow, Sample};
