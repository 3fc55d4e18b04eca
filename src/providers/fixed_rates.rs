use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use crate::core::currency::CurrencyRateProvider;

/// Rates from a static `"FROM/TO"` table. A missing pair is answered from
/// its inverse when that is present.
pub struct FixedRateProvider {
    rates: HashMap<String, f64>,
}

impl FixedRateProvider {
    pub fn new(rates: HashMap<String, f64>) -> Self {
        let rates = rates
            .into_iter()
            .map(|(pair, rate)| (pair.to_uppercase(), rate))
            .collect();
        FixedRateProvider { rates }
    }
}

#[async_trait]
impl CurrencyRateProvider for FixedRateProvider {
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
        let (from, to) = (from.to_uppercase(), to.to_uppercase());
        if let Some(rate) = self.rates.get(&format!("{from}/{to}")) {
            return Ok(*rate);
        }
        if let Some(inverse) = self.rates.get(&format!("{to}/{from}")).filter(|r| **r > 0.0) {
            debug!("Using inverse of {}/{} for {}/{}", to, from, from, to);
            return Ok(1.0 / inverse);
        }
        Err(anyhow!("No fixed rate configured for {}/{}", from, to))
    }
}
