use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::currency::CurrencyRateProvider;
use crate::providers::util::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_MS, with_retry};

/// Conversion rate service answering `GET {base}/rate?from=X&to=Y` with
/// `{"rate": n}`.
pub struct RateServiceProvider {
    base_url: String,
}

impl RateServiceProvider {
    pub fn new(base_url: &str) -> Self {
        RateServiceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RateResponse {
    rate: f64,
}

#[async_trait]
impl CurrencyRateProvider for RateServiceProvider {
    #[instrument(name = "RateServiceFetch", skip(self))]
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
        let url = format!("{}/rate", self.base_url);
        let pair = format!("{from}-{to}");
        debug!("Requesting {} from {}", pair, url);

        let client = reqwest::Client::builder()
            .user_agent("marginal/0.1")
            .build()?;
        let response = with_retry(
            &pair,
            || async {
                client
                    .get(&url)
                    .query(&[("from", from), ("to", to)])
                    .send()
                    .await
            },
            DEFAULT_RETRIES,
            DEFAULT_RETRY_DELAY_MS,
        )
        .await
        .with_context(|| format!("Failed to request rate for {pair}"))?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {} for rate {}", response.status(), pair));
        }

        let body = response
            .json::<RateResponse>()
            .await
            .with_context(|| format!("Failed to parse rate response for {pair}"))?;
        Ok(body.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate"))
            .and(query_param("from", "EUR"))
            .and(query_param("to", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"rate": 1.08}"#))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = RateServiceProvider::new(&format!("{}/", mock_server.uri()));
        let rate = provider.get_rate("EUR", "USD").await.unwrap();
        assert_eq!(rate, 1.08);
    }

    #[tokio::test]
    async fn test_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let provider = RateServiceProvider::new(&mock_server.uri());
        let err = provider.get_rate("XYZ", "USD").await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP error: 404 Not Found for rate XYZ-USD");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value": 2}"#))
            .mount(&mock_server)
            .await;

        let provider = RateServiceProvider::new(&mock_server.uri());
        let err = provider.get_rate("EUR", "USD").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to parse rate response for EUR-USD");
    }

    #[tokio::test]
    async fn test_currency_codes_are_url_encoded() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate"))
            .and(query_param("from", "A&B"))
            .and(query_param("to", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"rate": 2.5}"#))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = RateServiceProvider::new(&mock_server.uri());
        let rate = provider.get_rate("A&B", "USD").await.unwrap();
        assert_eq!(rate, 2.5);
    }
}
