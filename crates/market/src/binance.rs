use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use common::{Error, Result, Tick, TickSource};

const STREAM_BASE: &str = "wss://stream.binance.com:9443/ws";
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(30);

type TickSender = Arc<watch::Sender<Option<Tick>>>;

/// Live tick source backed by one Binance mini-ticker stream per instrument.
///
/// Each stream task publishes into a `watch` channel; `next_tick` waits for
/// the next value published after the call.
pub struct BinanceFeed {
    channels: HashMap<String, TickSender>,
    max_wait: Duration,
    shutdown: CancellationToken,
}

impl BinanceFeed {
    /// Spawn a stream task for each instrument. Must be called inside a
    /// tokio runtime.
    pub fn spawn<I, S>(instruments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let shutdown = CancellationToken::new();
        let mut channels = HashMap::new();

        for instrument in instruments {
            let instrument = instrument.into().to_uppercase();
            if channels.contains_key(&instrument) {
                continue;
            }
            let (tx, _) = watch::channel(None);
            let tx = Arc::new(tx);
            let stream = BinanceStream::new(instrument.clone(), tx.clone(), shutdown.child_token());
            tokio::spawn(stream.run());
            channels.insert(instrument, tx);
        }

        info!(instruments = channels.len(), "Binance feed started");
        Self {
            channels,
            max_wait: DEFAULT_MAX_WAIT,
            shutdown,
        }
    }

    /// How long `next_tick` waits for a fresh tick before failing the cycle.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Most recent tick received for `instrument`, if any.
    pub fn latest(&self, instrument: &str) -> Option<Tick> {
        self.channels
            .get(&instrument.to_uppercase())
            .and_then(|tx| tx.borrow().clone())
    }
}

impl Drop for BinanceFeed {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl TickSource for BinanceFeed {
    async fn next_tick(&self, instrument: &str) -> Result<Tick> {
        let tx = self
            .channels
            .get(&instrument.to_uppercase())
            .ok_or_else(|| Error::Feed(format!("no stream for {instrument}")))?;

        let mut rx = tx.subscribe();
        match tokio::time::timeout(self.max_wait, rx.changed()).await {
            Ok(Ok(())) => rx
                .borrow_and_update()
                .clone()
                .ok_or_else(|| Error::Feed(format!("empty tick for {instrument}"))),
            Ok(Err(_)) => Err(Error::Feed(format!("stream for {instrument} closed"))),
            Err(_) => Err(Error::Feed(format!(
                "no tick for {instrument} within {:?}",
                self.max_wait
            ))),
        }
    }
}

/// Binance mini-ticker WebSocket stream for a single instrument.
///
/// Reconnects with exponential backoff until its shutdown token fires.
pub struct BinanceStream {
    instrument: String,
    tx: TickSender,
    shutdown: CancellationToken,
}

impl BinanceStream {
    pub fn new(instrument: impl Into<String>, tx: TickSender, shutdown: CancellationToken) -> Self {
        Self {
            instrument: instrument.into(),
            tx,
            shutdown,
        }
    }

    /// Run the stream loop until shutdown. Call this inside a `tokio::spawn`.
    pub async fn run(self) {
        let mut backoff = Duration::from_secs(1);
        const MAX_BACKOFF: Duration = Duration::from_secs(60);

        loop {
            info!(instrument = %self.instrument, "Connecting to Binance WebSocket stream");
            let delay = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = self.connect_once() => match result {
                    Ok(()) => {
                        info!(instrument = %self.instrument, "WebSocket stream closed cleanly");
                        backoff = Duration::from_secs(1);
                        backoff
                    }
                    Err(e) => {
                        warn!(instrument = %self.instrument, error = %e, backoff = ?backoff, "WebSocket error, reconnecting");
                        let delay = backoff;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        delay
                    }
                },
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(instrument = %self.instrument, "Binance stream stopped");
    }

    async fn connect_once(&self) -> Result<()> {
        let url = stream_url(&self.instrument)?;
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;

        let (_, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| Error::WebSocket(e.to_string()))?;

            if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                match parse_mini_ticker(&self.instrument, &text) {
                    Ok(Some(tick)) => {
                        self.tx.send_replace(Some(tick));
                    }
                    Ok(None) => debug!(instrument = %self.instrument, "Skipping non-ticker message"),
                    Err(e) => warn!(instrument = %self.instrument, error = %e, "Failed to parse ticker event"),
                }
            }
        }

        Ok(())
    }
}

fn stream_url(instrument: &str) -> Result<Url> {
    let url = format!("{STREAM_BASE}/{}@miniTicker", instrument.to_lowercase());
    Url::parse(&url).map_err(|e| Error::WebSocket(e.to_string()))
}

// ─── Binance mini-ticker JSON parsing ────────────────────────────────────────

#[derive(Deserialize)]
struct MiniTicker {
    #[serde(rename = "E")]
    event_time_ms: i64,
    #[serde(rename = "c")]
    close: String,
}

fn parse_mini_ticker(instrument: &str, text: &str) -> Result<Option<Tick>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if value.get("e").and_then(|v| v.as_str()) != Some("24hrMiniTicker") {
        return Ok(None);
    }

    let ticker: MiniTicker = serde_json::from_value(value)?;
    let price: f64 = ticker
        .close
        .parse()
        .map_err(|_| Error::Feed(format!("bad close price {:?}", ticker.close)))?;
    if !price.is_finite() || price <= 0.0 {
        return Err(Error::Feed(format!("non-positive close price {price}")));
    }

    let timestamp = Utc
        .timestamp_millis_opt(ticker.event_time_ms)
        .single()
        .unwrap_or_else(Utc::now);

    Ok(Some(Tick::new(instrument, price, timestamp)))
}
