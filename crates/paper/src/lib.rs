use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::{debug, info};

use common::{Result, Tick, TickSource};

/// Prices never walk below this.
pub const MIN_PRICE: f64 = 0.01;

struct Walk {
    price: f64,
    last_ts: DateTime<Utc>,
}

struct State {
    walks: HashMap<String, Walk>,
    rng: StdRng,
}

/// Simulated tick source for paper runs.
///
/// Every instrument follows its own random walk starting at `start_price`;
/// each `next_tick` moves it by a uniform step within ±`volatility / 2`.
/// No exchange is ever contacted.
pub struct PaperFeed {
    start_price: f64,
    volatility: f64,
    state: Mutex<State>,
}

impl PaperFeed {
    pub fn new(start_price: f64, volatility: f64) -> Self {
        Self::with_rng(start_price, volatility, StdRng::from_entropy())
    }

    /// Deterministic walk for tests and replays.
    pub fn with_seed(start_price: f64, volatility: f64, seed: u64) -> Self {
        Self::with_rng(start_price, volatility, StdRng::seed_from_u64(seed))
    }

    fn with_rng(start_price: f64, volatility: f64, rng: StdRng) -> Self {
        let start_price = start_price.max(MIN_PRICE);
        let volatility = volatility.abs();
        info!(start_price, volatility, "PaperFeed initialized");
        Self {
            start_price,
            volatility,
            state: Mutex::new(State {
                walks: HashMap::new(),
                rng,
            }),
        }
    }

    /// Move `instrument`'s walk to `price`; the next tick steps from there.
    pub async fn set_price(&self, instrument: &str, price: f64) {
        let price = price.max(MIN_PRICE);
        let mut state = self.state.lock().await;
        state
            .walks
            .entry(instrument.to_string())
            .and_modify(|w| w.price = price)
            .or_insert(Walk {
                price,
                last_ts: DateTime::<Utc>::MIN_UTC,
            });
    }

    /// Current walk price for `instrument`, if it has been ticked or seeded.
    pub async fn price(&self, instrument: &str) -> Option<f64> {
        self.state.lock().await.walks.get(instrument).map(|w| w.price)
    }
}

#[async_trait]
impl TickSource for PaperFeed {
    async fn next_tick(&self, instrument: &str) -> Result<Tick> {
        let half = self.volatility / 2.0;
        let mut state = self.state.lock().await;
        let step = state.rng.gen_range(-half..=half);

        let start_price = self.start_price;
        let walk = state
            .walks
            .entry(instrument.to_string())
            .or_insert_with(|| Walk {
                price: start_price,
                last_ts: DateTime::<Utc>::MIN_UTC,
            });

        walk.price = (walk.price + step).max(MIN_PRICE);

        // Two calls within the same clock tick still get ordered timestamps
        let now = Utc::now();
        walk.last_ts = if now > walk.last_ts {
            now
        } else {
            walk.last_ts + Duration::microseconds(1)
        };

        debug!(instrument, price = walk.price, step, "Paper tick");
        Ok(Tick::new(instrument, walk.price, walk.last_ts))
    }
}
