//! Currency conversion abstractions

use anyhow::Result;
use async_trait::async_trait;

/// Source of exchange rates. `get_rate(from, to)` returns how many units of
/// `to` one unit of `from` buys.
#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64>;
}
