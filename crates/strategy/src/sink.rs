use tokio::sync::broadcast;
use tracing::debug;

use common::TradeSignal;

/// Fan-out point for trade signals.
///
/// Publishing never waits on subscribers: a subscriber that falls more than
/// the channel capacity behind loses the oldest signals and is told how many
/// through `RecvError::Lagged`.
#[derive(Clone)]
pub struct SignalSink {
    tx: broadcast::Sender<TradeSignal>,
}

impl SignalSink {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, signal: TradeSignal) {
        if let Err(broadcast::error::SendError(signal)) = self.tx.send(signal) {
            debug!(id = %signal.strategy_id, side = %signal.side, "No signal subscribers, dropped");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TradeSignal> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SignalSink {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::SignalSide;

    fn signal(n: u32) -> TradeSignal {
        TradeSignal {
            strategy_id: format!("s{n}"),
            instrument: "BTCUSDT".into(),
            side: SignalSide::Buy,
            price: 100.0,
            amount: 1.0,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn publish_without_subscribers_does_not_fail() {
        let sink = SignalSink::new(4);
        sink.publish(signal(1));
        assert_eq!(sink.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn every_subscriber_receives_each_signal() {
        let sink = SignalSink::new(4);
        let mut a = sink.subscribe();
        let mut b = sink.subscribe();
        sink.publish(signal(1));
        assert_eq!(a.recv().await.unwrap().strategy_id, "s1");
        assert_eq!(b.recv().await.unwrap().strategy_id, "s1");
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let sink = SignalSink::new(2);
        let mut rx = sink.subscribe();
        for n in 0..5 {
            sink.publish(signal(n));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(rx.recv().await.unwrap().strategy_id, "s3");
    }
}
