use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use common::TickSource;

use crate::runtime::{CycleOutcome, StrategyRuntime};
use crate::sink::SignalSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Pause between the end of one cycle and the start of the next.
    pub tick_interval: Duration,
    /// How long `cancel` waits for a task to confirm it stopped before
    /// aborting it.
    pub stop_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&common::Config> for SchedulerConfig {
    fn from(cfg: &common::Config) -> Self {
        Self {
            tick_interval: cfg.tick_interval,
            stop_timeout: cfg.stop_timeout,
        }
    }
}

struct EvaluationTask {
    cancel: CancellationToken,
    handle: JoinHandle<StrategyRuntime>,
}

/// Runs one periodic evaluation task per active strategy.
///
/// A task owns its strategy's `StrategyRuntime` for as long as it runs and
/// returns it through its `JoinHandle` when cancelled, so no window is ever
/// touched by two tasks.
pub struct EvaluationScheduler {
    feed: Arc<dyn TickSource>,
    sink: SignalSink,
    config: SchedulerConfig,
    tasks: Mutex<HashMap<String, EvaluationTask>>,
}

impl EvaluationScheduler {
    pub fn new(feed: Arc<dyn TickSource>, sink: SignalSink, config: SchedulerConfig) -> Self {
        Self {
            feed,
            sink,
            config,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn sink(&self) -> &SignalSink {
        &self.sink
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    pub async fn is_running(&self, id: &str) -> bool {
        self.tasks
            .lock()
            .await
            .get(id)
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }

    /// Number of tasks that have not exited.
    pub async fn active_tasks(&self) -> usize {
        self.tasks
            .lock()
            .await
            .values()
            .filter(|t| !t.handle.is_finished())
            .count()
    }

    /// Start evaluating `runtime`. If a live task already exists for its id
    /// nothing is spawned and the runtime is handed back.
    pub async fn spawn(&self, runtime: StrategyRuntime) -> Result<(), StrategyRuntime> {
        let mut tasks = self.tasks.lock().await;
        if let Some(existing) = tasks.get(runtime.id()) {
            if !existing.handle.is_finished() {
                return Err(runtime);
            }
            warn!(id = %runtime.id(), "Replacing evaluation task that exited on its own");
        }

        let id = runtime.id().to_string();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_evaluation(
            runtime,
            self.feed.clone(),
            self.sink.clone(),
            self.config.tick_interval,
            cancel.clone(),
        ));
        tasks.insert(id, EvaluationTask { cancel, handle });
        Ok(())
    }

    /// Stop the task for `id` and wait until it has exited.
    ///
    /// Returns the runtime the task owned, or `None` when there was no task,
    /// it panicked, or it had to be aborted after `stop_timeout`.
    pub async fn cancel(&self, id: &str) -> Option<StrategyRuntime> {
        let task = self.tasks.lock().await.remove(id)?;
        task.cancel.cancel();

        let mut handle = task.handle;
        match tokio::time::timeout(self.config.stop_timeout, &mut handle).await {
            Ok(Ok(runtime)) => Some(runtime),
            Ok(Err(e)) => {
                error!(id, error = %e, "Evaluation task ended abnormally");
                None
            }
            Err(_) => {
                warn!(id, timeout = ?self.config.stop_timeout, "Evaluation task did not stop in time, aborting");
                handle.abort();
                let _ = handle.await;
                None
            }
        }
    }
}

impl Drop for EvaluationScheduler {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().values() {
            task.cancel.cancel();
        }
    }
}

/// The per-strategy loop: pull a tick, update the window, evaluate, publish,
/// then sleep for the tick interval. Both suspension points race the
/// cancellation token. A panic in the tick source or the evaluation costs one
/// cycle, never the task.
async fn run_evaluation(
    mut runtime: StrategyRuntime,
    feed: Arc<dyn TickSource>,
    sink: SignalSink,
    interval: Duration,
    cancel: CancellationToken,
) -> StrategyRuntime {
    let id = runtime.id().to_string();
    let instrument = runtime.instrument().to_string();
    info!(%id, %instrument, "Evaluation task started");

    loop {
        let pulled = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            pulled = AssertUnwindSafe(feed.next_tick(&instrument)).catch_unwind() => pulled,
        };

        match pulled {
            Ok(Ok(tick)) => {
                match panic::catch_unwind(AssertUnwindSafe(|| runtime.on_tick(&tick))) {
                    Ok(CycleOutcome::Evaluated(Some(signal))) => {
                        info!(
                            %id,
                            %instrument,
                            side = %signal.side,
                            price = signal.price,
                            amount = signal.amount,
                            "Signal generated"
                        );
                        sink.publish(signal);
                    }
                    Ok(CycleOutcome::Evaluated(None)) => {}
                    Ok(CycleOutcome::Warming { have, need }) => {
                        debug!(%id, have, need, "Window filling, evaluation skipped");
                    }
                    Ok(CycleOutcome::Stale) => {
                        debug!(%id, timestamp = %tick.timestamp, "Stale tick discarded");
                    }
                    Err(payload) => {
                        error!(%id, panic = %panic_message(&*payload), "Evaluation cycle panicked");
                        runtime.stats().record_failure();
                    }
                }
            }
            Ok(Err(e)) => {
                warn!(%id, %instrument, error = %e, "Tick unavailable, cycle skipped");
                runtime.stats().record_failure();
            }
            Err(payload) => {
                error!(%id, %instrument, panic = %panic_message(&*payload), "Tick source panicked");
                runtime.stats().record_failure();
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!(%id, "Evaluation task stopped");
    runtime
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
