pub mod fixed_rates;
pub mod rate_service;
pub mod snapshot_file;
pub mod util;
pub mod yahoo_finance;

use crate::core::config::ProvidersConfig;
use crate::core::currency::CurrencyRateProvider;
use std::sync::Arc;

/// Picks the configured rate source: rate service, then fixed table, then Yahoo.
pub fn rate_provider_from_config(providers: &ProvidersConfig) -> Arc<dyn CurrencyRateProvider> {
    if let Some(service) = &providers.rate_service {
        return Arc::new(rate_service::RateServiceProvider::new(&service.base_url));
    }
    if let Some(fixed) = &providers.fixed {
        return Arc::new(fixed_rates::FixedRateProvider::new(fixed.rates.clone()));
    }
    let base_url = providers
        .yahoo
        .as_ref()
        .map_or("https://query1.finance.yahoo.com", |p| &p.base_url);
    Arc::new(yahoo_finance::YahooCurrencyProvider::new(base_url))
}
