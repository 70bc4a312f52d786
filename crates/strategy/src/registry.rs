use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use common::{
    ConfigError, Error, Result, StrategyKind, StrategyState, TickSource, TradeSignal,
};

use crate::config::StrategyConfig;
use crate::params::StrategyParams;
use crate::runtime::{EvaluationStats, EvaluationStatsSnapshot, StrategyRuntime};
use crate::scheduler::{EvaluationScheduler, SchedulerConfig};
use crate::sink::SignalSink;

/// Read-only copy of a registered strategy. Never exposes the price window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategySnapshot {
    pub id: String,
    pub name: String,
    pub kind: StrategyKind,
    pub instrument: String,
    pub amount: f64,
    pub params: StrategyParams,
    pub state: StrategyState,
    pub stats: EvaluationStatsSnapshot,
}

struct Strategy {
    config: StrategyConfig,
    state: StrategyState,
    /// `None` while an evaluation task owns it.
    runtime: Option<StrategyRuntime>,
    stats: Arc<EvaluationStats>,
}

impl Strategy {
    fn snapshot(&self, id: &str) -> StrategySnapshot {
        StrategySnapshot {
            id: id.to_string(),
            name: self.config.name.clone(),
            kind: self.config.kind(),
            instrument: self.config.instrument.clone(),
            amount: self.config.amount,
            params: self.config.params,
            state: self.state,
            stats: self.stats.snapshot(),
        }
    }
}

/// Owns every registered strategy and all lifecycle transitions.
///
/// Lifecycle operations take the write lock for their whole duration,
/// including the wait for a stopping task; snapshot queries take the read
/// lock. Evaluation tasks never touch the lock.
pub struct StrategyRegistry {
    strategies: RwLock<HashMap<String, Strategy>>,
    scheduler: EvaluationScheduler,
}

impl StrategyRegistry {
    pub fn new(feed: Arc<dyn TickSource>, config: SchedulerConfig, sink: SignalSink) -> Self {
        Self {
            strategies: RwLock::new(HashMap::new()),
            scheduler: EvaluationScheduler::new(feed, sink, config),
        }
    }

    /// Validate and store a new strategy in `Registered` state with an empty window.
    pub async fn register(&self, id: impl Into<String>, config: StrategyConfig) -> Result<()> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ConfigError::EmptyId.into());
        }
        config.validate()?;

        let mut strategies = self.strategies.write().await;
        if strategies.contains_key(&id) {
            return Err(Error::Duplicate(id));
        }

        let stats = Arc::new(EvaluationStats::default());
        let runtime = StrategyRuntime::new(id.clone(), config.clone(), stats.clone());
        info!(
            %id,
            name = %config.name,
            kind = %config.kind(),
            instrument = %config.instrument,
            "Registered strategy"
        );
        strategies.insert(
            id,
            Strategy {
                config,
                state: StrategyState::Registered,
                runtime: Some(runtime),
                stats,
            },
        );
        Ok(())
    }

    /// Start evaluating `id`. Activating an already active strategy is a no-op.
    pub async fn activate(&self, id: &str) -> Result<()> {
        let mut strategies = self.strategies.write().await;
        let strategy = strategies
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        if strategy.state == StrategyState::Active && self.scheduler.is_running(id).await {
            debug!(id, "Strategy already active");
            return Ok(());
        }

        let runtime = strategy.runtime.take().unwrap_or_else(|| {
            StrategyRuntime::new(id, strategy.config.clone(), strategy.stats.clone())
        });
        if let Err(runtime) = self.scheduler.spawn(runtime).await {
            strategy.runtime = Some(runtime);
        }
        strategy.state = StrategyState::Active;
        info!(id, "Strategy activated");
        Ok(())
    }

    /// Stop evaluating `id`, keeping its configuration and window.
    /// Returns once the evaluation task has exited, so no signal for `id`
    /// is published after this returns.
    pub async fn deactivate(&self, id: &str) -> Result<()> {
        let mut strategies = self.strategies.write().await;
        let strategy = strategies
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        self.stop_task(id, strategy).await;
        strategy.state = StrategyState::Inactive;
        info!(id, "Strategy deactivated");
        Ok(())
    }

    /// Deactivate `id` and drop it. The id can be registered again afterwards.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let mut strategies = self.strategies.write().await;
        let mut strategy = strategies
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        self.stop_task(id, &mut strategy).await;
        strategy.state = StrategyState::Closed;
        info!(id, state = %strategy.state, "Strategy removed");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<StrategySnapshot> {
        self.strategies
            .read()
            .await
            .get(id)
            .map(|s| s.snapshot(id))
    }

    /// Snapshots of every registered strategy, sorted by id.
    pub async fn list(&self) -> Vec<StrategySnapshot> {
        let strategies = self.strategies.read().await;
        let mut out: Vec<_> = strategies.iter().map(|(id, s)| s.snapshot(id)).collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub async fn len(&self) -> usize {
        self.strategies.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.strategies.read().await.is_empty()
    }

    /// Number of live evaluation tasks.
    pub async fn active_tasks(&self) -> usize {
        self.scheduler.active_tasks().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TradeSignal> {
        self.scheduler.sink().subscribe()
    }

    pub fn sink(&self) -> &SignalSink {
        self.scheduler.sink()
    }

    /// Deactivate every active strategy, waiting for each task to exit.
    pub async fn shutdown(&self) {
        let mut strategies = self.strategies.write().await;
        let mut stopped = 0usize;
        for (id, strategy) in strategies.iter_mut() {
            if strategy.state == StrategyState::Active {
                self.stop_task(id, strategy).await;
                strategy.state = StrategyState::Inactive;
                stopped += 1;
            }
        }
        info!(stopped, "Strategy registry shut down");
    }

    async fn stop_task(&self, id: &str, strategy: &mut Strategy) {
        match self.scheduler.cancel(id).await {
            Some(runtime) => strategy.runtime = Some(runtime),
            None if strategy.state == StrategyState::Active => {
                warn!(id, "Evaluation state lost, window restarts empty on next activation");
            }
            None => {}
        }
    }
}
