//! Pricing Rules
//!
//! Pure totals computation. Totals are always derived from the full item list; nothing here keeps
//! an accumulator, so bulk mutations can never leave totals drifting from the items.

use rustc_hash::FxHashSet;
use rusty_money::{Money, iso::Currency};

use crate::{items::LineItem, money::whole_units, promotions::Promotion};

/// Subtotal, in whole major units, at or above which delivery is free.
pub const FREE_DELIVERY_THRESHOLD: i64 = 200;

/// Delivery fee, in whole major units, for placeholder offers.
pub const DEFAULT_DELIVERY_FEE: i64 = 15;

/// Derived cart totals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartTotals {
    /// Sum of all line quantities
    pub total_items: u32,

    /// Sum of `price × quantity`
    pub subtotal: Money<'static, Currency>,

    /// One fee per distinct vendor, or zero above the free-delivery threshold
    pub delivery_fee: Money<'static, Currency>,

    /// Promotion discount
    pub discount: Money<'static, Currency>,

    /// `subtotal + delivery_fee - discount`
    pub total: Money<'static, Currency>,

    /// Savings against original prices, informational only
    pub savings: Money<'static, Currency>,
}

impl CartTotals {
    /// Totals of an empty cart.
    pub fn zero(currency: &'static Currency) -> Self {
        let zero = Money::from_minor(0, currency);

        Self {
            total_items: 0,
            subtotal: zero,
            delivery_fee: zero,
            discount: zero,
            total: zero,
            savings: zero,
        }
    }
}

/// Sum of `price × quantity` over all items, in minor units.
pub fn subtotal(items: &[LineItem]) -> i64 {
    items
        .iter()
        .fold(0_i64, |acc, item| acc.saturating_add(item.line_total()))
}

/// Delivery fee in minor units for the given items and subtotal.
///
/// Each distinct vendor contributes the fee of the first line seen for it. The whole fee is
/// waived once the subtotal reaches [`FREE_DELIVERY_THRESHOLD`].
pub fn delivery_fee(items: &[LineItem], subtotal: i64, currency: &Currency) -> i64 {
    if subtotal >= whole_units(FREE_DELIVERY_THRESHOLD, currency) {
        return 0;
    }

    let mut seen = FxHashSet::default();

    items
        .iter()
        .filter(|item| seen.insert(item.pharmacy_id()))
        .fold(0_i64, |acc, item| acc.saturating_add(item.delivery_fee))
}

/// Compute all totals for the given items and optional promotion.
pub fn compute_totals(
    items: &[LineItem],
    promotion: Option<&Promotion>,
    currency: &'static Currency,
) -> CartTotals {
    let total_items = items
        .iter()
        .fold(0_u32, |acc, item| acc.saturating_add(item.quantity()));

    let subtotal = subtotal(items);
    let delivery_fee = delivery_fee(items, subtotal, currency);
    let discount = promotion.map_or(0, |promotion| promotion.discount_on(subtotal));
    let total = subtotal.saturating_add(delivery_fee).saturating_sub(discount);

    let savings = items
        .iter()
        .fold(0_i64, |acc, item| acc.saturating_add(item.line_savings()));

    CartTotals {
        total_items,
        subtotal: Money::from_minor(subtotal, currency),
        delivery_fee: Money::from_minor(delivery_fee, currency),
        discount: Money::from_minor(discount, currency),
        total: Money::from_minor(total, currency),
        savings: Money::from_minor(savings, currency),
    }
}
