use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::currency::CurrencyRateProvider;
use crate::providers::util::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_MS, with_retry};

/// Reads spot rates from Yahoo's chart endpoint for `{FROM}{TO}=X` symbols.
pub struct YahooCurrencyProvider {
    base_url: String,
}

impl YahooCurrencyProvider {
    pub fn new(base_url: &str) -> Self {
        YahooCurrencyProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct YahooCurrencyResponse {
    chart: CurrencyChartResult,
}

#[derive(Debug, Deserialize)]
struct CurrencyChartResult {
    result: Vec<CurrencyChartItem>,
}

#[derive(Debug, Deserialize)]
struct CurrencyChartItem {
    meta: CurrencyChartMeta,
}

#[derive(Debug, Deserialize)]
struct CurrencyChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: f64,
}

#[async_trait]
impl CurrencyRateProvider for YahooCurrencyProvider {
    #[instrument(name = "YahooRateFetch", skip(self))]
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
        let symbol = format!("{from}{to}=X");
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        debug!("Requesting currency rate from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("marginal/0.1")
            .build()?;

        let response = with_retry(
            &symbol,
            || async { client.get(&url).send().await },
            DEFAULT_RETRIES,
            DEFAULT_RETRY_DELAY_MS,
        )
        .await
        .map_err(|e| anyhow!("Request error: {} for currency pair: {}", e, symbol))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for currency pair: {}",
                response.status(),
                symbol
            ));
        }

        let text = response.text().await?;

        let data: YahooCurrencyResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

        let item = data
            .chart
            .result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No rate data found for currency pair: {}", symbol))?;

        Ok(item.meta.regular_market_price)
    }
}
