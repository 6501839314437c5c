//! Promotions
//!
//! A promotion is a validated promo code turned into a concrete discount rule. At most one is
//! active on a cart at a time.

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::percent_of_minor;

/// An active discount rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    /// Code the customer entered
    pub code: String,

    /// Discount rate as supplied; values above 1 are percentages
    rate: Decimal,

    /// Minimum subtotal (minor units) before the discount activates
    pub min_order_amount: i64,

    /// Cap on the discount (minor units)
    pub max_discount: Option<i64>,

    /// Human readable description
    pub description: String,
}

impl Promotion {
    /// Create a promotion with no minimum order and no cap.
    pub fn new(code: impl Into<String>, rate: Decimal) -> Self {
        Self {
            code: code.into(),
            rate,
            min_order_amount: 0,
            max_discount: None,
            description: String::new(),
        }
    }

    /// Set the minimum order amount, in minor units.
    #[must_use]
    pub fn with_min_order_amount(mut self, min_order_amount: i64) -> Self {
        self.min_order_amount = min_order_amount;
        self
    }

    /// Set the discount cap, in minor units.
    #[must_use]
    pub fn with_max_discount(mut self, max_discount: Option<i64>) -> Self {
        self.max_discount = max_discount;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns the rate exactly as it was supplied.
    pub fn raw_rate(&self) -> Decimal {
        self.rate
    }

    /// Returns the rate normalised to a fraction.
    ///
    /// A stored rate greater than 1 is a percentage (`20` means 20%). Negative rates are inert.
    pub fn rate(&self) -> Percentage {
        let fraction = if self.rate > Decimal::ONE {
            self.rate / Decimal::ONE_HUNDRED
        } else {
            self.rate
        };

        Percentage::from(fraction.max(Decimal::ZERO))
    }

    /// Whether the subtotal meets the minimum order amount.
    pub fn is_eligible(&self, subtotal: i64) -> bool {
        subtotal >= self.min_order_amount
    }

    /// Discount, in minor units, this promotion grants on `subtotal`.
    ///
    /// Zero below the minimum order amount; otherwise `subtotal × rate` clamped to the cap and
    /// never more than the subtotal itself.
    pub fn discount_on(&self, subtotal: i64) -> i64 {
        if subtotal <= 0 || !self.is_eligible(subtotal) {
            return 0;
        }

        let raw = percent_of_minor(self.rate(), subtotal).unwrap_or(subtotal);
        let capped = self.max_discount.map_or(raw, |max| raw.min(max));

        capped.clamp(0, subtotal)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn twenty_percent() -> Promotion {
        Promotion::new("HEALTH20", Decimal::from(20))
            .with_min_order_amount(10_000)
            .with_max_discount(Some(5_000))
    }

    #[test]
    fn percentage_rates_are_normalised() {
        let percent = Promotion::new("A", Decimal::from(20)).rate();
        let fraction = Promotion::new("B", Decimal::new(2, 1)).rate();

        assert_eq!(percent * Decimal::ONE, Decimal::new(2, 1));
        assert_eq!(fraction * Decimal::ONE, Decimal::new(2, 1));
    }

    #[test]
    fn discount_is_clamped_to_cap() {
        assert_eq!(twenty_percent().discount_on(100_000), 5_000);
    }

    #[test]
    fn discount_below_cap_is_exact() {
        assert_eq!(twenty_percent().discount_on(12_000), 2_400);
    }

    #[test]
    fn minimum_order_gates_discount() {
        let promotion = twenty_percent();

        assert!(!promotion.is_eligible(5_000));
        assert_eq!(promotion.discount_on(5_000), 0);
    }

    #[test]
    fn negative_rate_grants_nothing() {
        assert_eq!(Promotion::new("X", Decimal::from(-5)).discount_on(10_000), 0);
    }

    #[test]
    fn discount_never_exceeds_subtotal() {
        let promotion = Promotion::new("FREE", Decimal::from(150));

        assert_eq!(promotion.discount_on(4_000), 4_000);
    }
}
