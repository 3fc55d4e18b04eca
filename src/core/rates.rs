//! Per-report exchange rate cache.
//!
//! Every currency is converted through a single hub, the report's display
//! currency: `rate(from, to) = rate_to_target(from) / rate_to_target(to)`.
//! Lookups are synchronous and fail soft, returning 1.0 when a hub rate has
//! not arrived yet. Fetching is a separate async step that fills the cache,
//! so a report can be recomputed cheaply every time a rate lands.

use crate::core::currency::CurrencyRateProvider;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Synchronous rate lookup used by the normalizer.
pub trait RateLookup {
    /// Multiplier converting an amount in `from` into `to`.
    fn rate(&self, from: &str, to: &str) -> f64;
}

impl<F> RateLookup for F
where
    F: Fn(&str, &str) -> f64,
{
    fn rate(&self, from: &str, to: &str) -> f64 {
        self(from, to)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RateOutcome {
    Available(f64),
    Unavailable(String),
}

/// `(source currency, hub currency)`
type RateKey = (String, String);

struct BookState {
    target: String,
    cells: HashMap<RateKey, Arc<OnceCell<RateOutcome>>>,
    observed: BTreeSet<String>,
}

/// Whether every rate a computation used was actually available.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateStatus {
    pub target: String,
    /// Currencies whose hub rate has not been fetched yet.
    pub pending: Vec<String>,
    /// Currencies whose hub rate fetch failed.
    pub unavailable: Vec<String>,
}

impl RateStatus {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty() && self.unavailable.is_empty()
    }
}

pub struct RateBook {
    provider: Arc<dyn CurrencyRateProvider>,
    state: Mutex<BookState>,
    closed: AtomicBool,
}

impl RateBook {
    pub fn new(target: &str, provider: Arc<dyn CurrencyRateProvider>) -> Self {
        Self {
            provider,
            state: Mutex::new(BookState {
                target: target.to_string(),
                cells: HashMap::new(),
                observed: BTreeSet::new(),
            }),
            closed: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, BookState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn target(&self) -> String {
        self.state().target.clone()
    }

    /// Switches the hub currency. Cached rates belong to the old hub and are dropped.
    pub fn retarget(&self, target: &str) {
        let mut state = self.state();
        if state.target == target {
            return;
        }
        debug!(from = %state.target, to = %target, "Retargeting rate book");
        state.target = target.to_string();
        state.cells.clear();
        state.observed.clear();
    }

    /// Stops issuing new fetches. Rates already cached stay readable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Cached rate from `code` into the hub currency, if it has arrived.
    pub fn rate_to_target(&self, code: &str) -> Option<f64> {
        let state = self.state();
        Self::cached(&state, code)
    }

    fn cached(state: &BookState, code: &str) -> Option<f64> {
        if code == state.target {
            return Some(1.0);
        }
        let key = (code.to_string(), state.target.clone());
        match state.cells.get(&key).and_then(|cell| cell.get()) {
            Some(RateOutcome::Available(rate)) => Some(*rate),
            _ => None,
        }
    }

    /// Fetches the hub rate of every distinct currency in `currencies`
    /// concurrently. Already cached or in-flight currencies are not fetched
    /// again. `on_rate` is called as each currency settles.
    pub async fn warm<I, S>(&self, currencies: I, on_rate: &(dyn Fn(&str) + Sync))
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let distinct: BTreeSet<String> = currencies
            .into_iter()
            .map(|c| c.as_ref().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        let fetches = distinct.iter().map(|code| async move {
            self.fetch(code).await;
            on_rate(code.as_str());
        });
        join_all(fetches).await;
    }

    async fn fetch(&self, code: &str) {
        let (cell, target) = {
            let mut state = self.state();
            if code == state.target {
                return;
            }
            let target = state.target.clone();
            let key = (code.to_string(), target.clone());
            if let Some(cell) = state.cells.get(&key) {
                if cell.initialized() {
                    debug!("Rate cache HIT for {}-{}", code, target);
                    return;
                }
            }
            if self.is_closed() {
                debug!("Rate book closed, skipping fetch for {}-{}", code, target);
                return;
            }
            let cell = Arc::clone(state.cells.entry(key).or_default());
            (cell, target)
        };

        cell.get_or_init(|| async {
            debug!("Rate cache MISS for {}-{}, fetching", code, target);
            match self.provider.get_rate(code, &target).await {
                Ok(rate) if rate.is_finite() && rate > 0.0 => RateOutcome::Available(rate),
                Ok(rate) => {
                    warn!("Rejected non-positive rate {} for {}-{}", rate, code, target);
                    RateOutcome::Unavailable(format!("invalid rate {rate}"))
                }
                Err(e) => {
                    warn!("Rate unavailable for {}-{}: {}", code, target, e);
                    RateOutcome::Unavailable(e.to_string())
                }
            }
        })
        .await;
    }

    /// Availability of every currency a lookup has touched so far.
    pub fn status(&self) -> RateStatus {
        let state = self.state();
        let mut status = RateStatus {
            target: state.target.clone(),
            ..Default::default()
        };
        for code in state.observed.iter().filter(|c| **c != state.target) {
            let key = (code.clone(), state.target.clone());
            match state.cells.get(&key).and_then(|cell| cell.get()) {
                Some(RateOutcome::Available(_)) => {}
                Some(RateOutcome::Unavailable(_)) => status.unavailable.push(code.clone()),
                None => status.pending.push(code.clone()),
            }
        }
        status
    }
}

impl RateLookup for RateBook {
    fn rate(&self, from: &str, to: &str) -> f64 {
        if from == to {
            return 1.0;
        }
        let mut state = self.state();
        state.observed.insert(from.to_string());
        state.observed.insert(to.to_string());

        match (Self::cached(&state, from), Self::cached(&state, to)) {
            (Some(from_rate), Some(to_rate)) if to_rate > 0.0 => from_rate / to_rate,
            _ => {
                debug!("Rate {}-{} pending, treating amounts as comparable", from, to);
                1.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct MockCurrencyProvider {
        rates: HashMap<String, f64>,
        call_count: AtomicUsize,
    }

    impl MockCurrencyProvider {
        fn new(rates: &[(&str, &str, f64)]) -> Self {
            MockCurrencyProvider {
                rates: rates
                    .iter()
                    .map(|(from, to, rate)| (format!("{from}:{to}"), *rate))
                    .collect(),
                call_count: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CurrencyRateProvider for MockCurrencyProvider {
        async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.rates
                .get(&format!("{from}:{to}"))
                .cloned()
                .ok_or_else(|| anyhow!("Rate not found for {} to {}", from, to))
        }
    }

    fn book(rates: &[(&str, &str, f64)]) -> (RateBook, Arc<MockCurrencyProvider>) {
        let provider = Arc::new(MockCurrencyProvider::new(rates));
        (RateBook::new("USD", provider.clone()), provider)
    }

    #[tokio::test]
    async fn test_identity_rate_never_looks_up() {
        let (book, provider) = book(&[]);
        assert_eq!(book.rate("INR", "INR"), 1.0);
        assert_eq!(book.rate("USD", "USD"), 1.0);
        assert!(book.status().is_complete());
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_rate_fails_soft_and_reports_pending() {
        let (book, _) = book(&[]);
        assert_eq!(book.rate("INR", "USD"), 1.0);

        let status = book.status();
        assert!(!status.is_complete());
        assert_eq!(status.pending, vec!["INR".to_string()]);
        assert!(status.unavailable.is_empty());
    }

    #[tokio::test]
    async fn test_cross_rate_through_hub() {
        let (book, _) = book(&[("INR", "USD", 0.012), ("EUR", "USD", 1.1)]);
        book.warm(["INR", "EUR", "USD"], &|_| ()).await;

        assert_eq!(book.rate("INR", "USD"), 0.012);
        assert!((book.rate("EUR", "INR") - 1.1 / 0.012).abs() < 1e-9);
        assert!(book.status().is_complete());
    }

    #[tokio::test]
    async fn test_concurrent_warm_is_coalesced() {
        let (book, provider) = book(&[("INR", "USD", 0.012)]);
        futures::join!(
            book.warm(["INR"], &|_| ()),
            book.warm(["INR", "INR"], &|_| ())
        );
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 1);

        book.warm(["INR"], &|_| ()).await;
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_cached_as_unavailable() {
        let (book, provider) = book(&[]);
        book.warm(["GBP"], &|_| ()).await;
        book.warm(["GBP"], &|_| ()).await;
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 1);

        assert_eq!(book.rate("GBP", "USD"), 1.0);
        assert_eq!(book.status().unavailable, vec!["GBP".to_string()]);
    }

    #[tokio::test]
    async fn test_retarget_invalidates_cache() {
        let (book, provider) = book(&[("INR", "USD", 0.012), ("INR", "EUR", 0.011)]);
        book.warm(["INR"], &|_| ()).await;
        assert_eq!(book.rate_to_target("INR"), Some(0.012));

        book.retarget("EUR");
        assert_eq!(book.rate_to_target("INR"), None);
        book.warm(["INR"], &|_| ()).await;
        assert_eq!(book.rate_to_target("INR"), Some(0.011));
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_closed_book_stops_fetching() {
        let (book, provider) = book(&[("INR", "USD", 0.012)]);
        book.close();
        book.warm(["INR"], &|_| ()).await;
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 0);
        assert_eq!(book.rate("INR", "USD"), 1.0);
    }

    #[tokio::test]
    async fn test_on_rate_called_per_currency() {
        let (book, _) = book(&[("INR", "USD", 0.012)]);
        let settled = AtomicUsize::new(0);
        book.warm(["INR", "GBP", "INR"], &|_| {
            settled.fetch_add(1, Ordering::SeqCst);
        })
        .await;
        assert_eq!(settled.load(Ordering::SeqCst), 2);
    }
}
