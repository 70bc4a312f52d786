use async_trait::async_trait;

use crate::{Result, Tick};

/// Abstraction over the market-data source.
///
/// `BinanceFeed` implements this against the live exchange stream.
/// `PaperFeed` implements this with a simulated random walk.
///
/// Each evaluation task calls `next_tick` once per cycle for its strategy's
/// instrument. Implementations may block until a new tick is available and
/// must keep timestamps monotonic per instrument.
#[async_trait]
pub trait TickSource: Send + Sync {
    /// Latest tick for `instrument`.
    async fn next_tick(&self, instrument: &str) -> Result<Tick>;
}
