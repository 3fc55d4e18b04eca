//! Currency-tagged amounts

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// An amount together with the ISO code it is denominated in.
///
/// Every cost figure the engine carries is a `Money`, so an amount can never
/// lose track of its currency between normalization and presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: f64, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.to_string(),
        }
    }

    pub fn zero(currency: &str) -> Self {
        Self::new(0.0, currency)
    }

    /// Returns a new amount in `currency`, multiplying by `rate`.
    pub fn convert(&self, rate: f64, currency: &str) -> Money {
        Money::new(self.amount * rate, currency)
    }

    /// Adds `amount` which must already be expressed in this currency.
    pub fn add_amount(&mut self, amount: f64) {
        self.amount += amount;
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}

/// Returns `numerator / denominator`, or `None` when the denominator is not
/// positive or the result is not finite.
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 {
        let value = numerator / denominator;
        value.is_finite().then_some(value)
    } else {
        None
    }
}

/// Replaces NaN and infinities with zero.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
