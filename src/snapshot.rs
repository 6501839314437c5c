//! Cart Snapshot
//!
//! The single JSON document a guest cart is persisted as. It carries totals for readers that
//! want them, but loading always recomputes totals from the items.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    cart::{Cart, CartCommand},
    items::LineItem,
    money::{AmountError, currency},
    promotions::Promotion,
};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors raised while reading a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The document is not valid snapshot JSON.
    #[error("invalid snapshot document: {0}")]
    Json(#[from] serde_json::Error),

    /// The document was written by an incompatible version.
    #[error("unsupported snapshot version {found}, expected {SNAPSHOT_VERSION}")]
    Version {
        /// Version found in the document
        found: u32,
    },

    /// The snapshot currency is unknown.
    #[error(transparent)]
    Currency(#[from] AmountError),

    /// The snapshot was taken in a different currency than the cart uses.
    #[error("snapshot currency {found} does not match cart currency {expected}")]
    CurrencyMismatch {
        /// Snapshot currency
        found: String,
        /// Cart currency
        expected: &'static str,
    },
}

/// Totals as persisted, in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTotals {
    /// Sum of quantities
    pub total_items: u32,
    /// Subtotal
    pub subtotal: i64,
    /// Delivery fee
    pub delivery_fee: i64,
    /// Discount
    pub discount: i64,
    /// Grand total
    pub total: i64,
}

/// Serialized cart state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    /// Format version
    pub version: u32,

    /// When the snapshot was taken
    pub saved_at: Timestamp,

    /// ISO currency code
    pub currency: String,

    /// Line items
    pub items: Vec<LineItem>,

    /// Totals at the time of saving
    pub totals: SnapshotTotals,

    /// Active promotion
    pub promotion: Option<Promotion>,

    /// Prescription ids represented in the items
    #[serde(default)]
    pub prescription_ids: Vec<String>,
}

impl CartSnapshot {
    /// Capture the persistent parts of a cart.
    pub fn capture(cart: &Cart) -> Self {
        let totals = cart.totals();

        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Timestamp::now(),
            currency: cart.currency().iso_alpha_code.to_string(),
            items: cart.items().to_vec(),
            totals: SnapshotTotals {
                total_items: totals.total_items,
                subtotal: totals.subtotal.to_minor_units(),
                delivery_fee: totals.delivery_fee.to_minor_units(),
                discount: totals.discount.to_minor_units(),
                total: totals.total.to_minor_units(),
            },
            promotion: cart.promotion().cloned(),
            prescription_ids: cart
                .prescription_groups()
                .prescription_ids()
                .map(str::to_string)
                .collect(),
        }
    }

    /// Rebuild a cart from this snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown versions or currencies.
    pub fn into_cart(self) -> Result<Cart, SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                found: self.version,
            });
        }

        let mut cart = Cart::new(currency(&self.currency)?);

        cart.dispatch(CartCommand::LoadCart(self.items));

        if let Some(promotion) = self.promotion {
            cart.dispatch(CartCommand::ApplyPromotion(promotion));
        }

        Ok(cart)
    }

    /// Rebuild a cart, requiring it to be priced in `expected`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown versions, unknown currencies or a currency mismatch.
    pub fn into_cart_in(
        self,
        expected: &'static rusty_money::iso::Currency,
    ) -> Result<Cart, SnapshotError> {
        if self.currency != expected.iso_alpha_code {
            return Err(SnapshotError::CurrencyMismatch {
                found: self.currency,
                expected: expected.iso_alpha_code,
            });
        }

        self.into_cart()
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid snapshot.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }
}
