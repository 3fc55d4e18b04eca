//! Profitability engine and its supporting types

pub mod budget;
pub mod config;
pub mod currency;
pub mod health;
pub mod insights;
pub mod log;
pub mod model;
pub mod money;
pub mod normalize;
pub mod pnl;
pub mod rates;
pub mod report;
pub mod signals;
pub mod snapshot;

// Re-export main types for cleaner imports
pub use currency::CurrencyRateProvider;
pub use rates::{RateBook, RateLookup, RateStatus};
pub use report::ProfitabilityReport;
pub use snapshot::{EntityReader, ProjectSnapshot};
