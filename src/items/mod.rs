//! Items
//!
//! A line item is one vendor-specific purchasable entry in the cart. Price, vendor and display
//! fields are snapshotted from the catalog at add-time so the cart stays renderable after the
//! catalog changes; they only move again through an explicit price refresh.

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod factory;

/// Quantity cap used when a vendor does not report available stock.
pub const DEFAULT_QUANTITY_CAP: u32 = 99;

/// Composite line item identity: one product sold by one pharmacy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemKey {
    product_id: String,
    pharmacy_id: String,
}

impl LineItemKey {
    /// Create a key from its product and pharmacy segments.
    pub fn new(product_id: impl Into<String>, pharmacy_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            pharmacy_id: pharmacy_id.into(),
        }
    }

    /// Returns the product segment.
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    /// Returns the pharmacy segment.
    pub fn pharmacy_id(&self) -> &str {
        &self.pharmacy_id
    }
}

impl Display for LineItemKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.product_id, self.pharmacy_id)
    }
}

/// Error returned when parsing a malformed `product:pharmacy` key.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed line item key: {0}")]
pub struct ParseKeyError(String);

impl FromStr for LineItemKey {
    type Err = ParseKeyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.split_once(':') {
            Some((product, pharmacy)) if !product.is_empty() && !pharmacy.is_empty() => {
                Ok(Self::new(product, pharmacy))
            }
            _ => Err(ParseKeyError(value.to_string())),
        }
    }
}

/// A cart line item.
///
/// Quantity is kept private: the cart is the only writer and guarantees it stays within
/// `1..=max_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    key: LineItemKey,
    quantity: u32,

    /// Upper bound on quantity, taken from the vendor's available stock
    pub max_quantity: u32,

    /// Unit price in minor units, snapshotted at add-time
    pub price: i64,

    /// Pre-discount unit price in minor units
    pub original_price: Option<i64>,

    /// Pharmacy display name
    pub pharmacy_name: String,

    /// Vendor delivery fee in minor units
    pub delivery_fee: i64,

    /// Vendor delivery estimate
    pub estimated_delivery: Option<String>,

    /// Whether the product requires an approved prescription
    pub requires_prescription: bool,

    /// Prescription this item was added from, if any
    pub prescription_id: Option<String>,

    /// Units contributed by the prescription; the rest were added by the customer
    #[serde(default)]
    prescription_quantity: u32,

    /// Product name
    pub name: String,

    /// Product image URL
    pub image: Option<String>,

    /// Product category
    pub category: Option<String>,

    /// Product dosage
    pub dosage: Option<String>,

    /// Product manufacturer
    pub manufacturer: Option<String>,
}

impl LineItem {
    /// Create a bare line item with the given key, unit price and quantity.
    ///
    /// Quantity is clamped into `1..=DEFAULT_QUANTITY_CAP`. Callers building from catalog data
    /// should prefer [`factory::create_line_item`].
    pub fn new(key: LineItemKey, name: impl Into<String>, price: i64, quantity: u32) -> Self {
        Self {
            key,
            quantity: quantity.clamp(1, DEFAULT_QUANTITY_CAP),
            max_quantity: DEFAULT_QUANTITY_CAP,
            price,
            original_price: None,
            pharmacy_name: String::new(),
            delivery_fee: 0,
            estimated_delivery: None,
            requires_prescription: false,
            prescription_id: None,
            prescription_quantity: 0,
            name: name.into(),
            image: None,
            category: None,
            dosage: None,
            manufacturer: None,
        }
    }

    /// Returns the composite key.
    pub fn key(&self) -> &LineItemKey {
        &self.key
    }

    /// Returns the product identifier.
    pub fn product_id(&self) -> &str {
        self.key.product_id()
    }

    /// Returns the pharmacy identifier.
    pub fn pharmacy_id(&self) -> &str {
        self.key.pharmacy_id()
    }

    /// Returns the quantity.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Returns `price × quantity` in minor units.
    pub fn line_total(&self) -> i64 {
        self.price.saturating_mul(i64::from(self.quantity))
    }

    /// Returns the savings against the original price, in minor units.
    pub fn line_savings(&self) -> i64 {
        self.original_price
            .filter(|original| *original > self.price)
            .map_or(0, |original| {
                (original - self.price).saturating_mul(i64::from(self.quantity))
            })
    }

    /// Returns the prescription tag, if any.
    pub fn prescription_id(&self) -> Option<&str> {
        self.prescription_id.as_deref()
    }

    /// Returns how many units the prescription tag accounts for.
    pub fn prescription_quantity(&self) -> u32 {
        self.prescription_quantity
    }

    /// Tag the item with `prescription_id`, attributing `units` of its quantity to it.
    pub(crate) fn tag_prescription(&mut self, prescription_id: &str, units: u32) {
        self.prescription_id = Some(prescription_id.to_string());
        self.prescription_quantity = units.min(self.quantity);
        self.requires_prescription = true;
    }

    /// Drop the prescription's units and tag, keeping what the customer added.
    ///
    /// Returns `None` when no customer units remain.
    pub(crate) fn without_prescription(mut self) -> Option<Self> {
        let own = self.quantity.saturating_sub(self.prescription_quantity);

        if own == 0 {
            return None;
        }

        self.quantity = own;
        self.prescription_id = None;
        self.prescription_quantity = 0;

        Some(self)
    }

    /// Clamp a requested quantity against this item's cap.
    pub fn clamp_quantity(&self, requested: u64) -> u32 {
        let cap = self.max_quantity.max(1);

        u32::try_from(requested).map_or(cap, |requested| requested.min(cap))
    }

    /// Set the quantity, clamped into `1..=max_quantity`.
    pub(crate) fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity.clamp(1, self.max_quantity.max(1));
        self.prescription_quantity = self.prescription_quantity.min(self.quantity);
    }

    /// Override the quantity cap, re-clamping the current quantity.
    #[must_use]
    pub fn with_max_quantity(mut self, max_quantity: u32) -> Self {
        self.max_quantity = max_quantity.max(1);
        self.set_quantity(self.quantity);
        self
    }

    /// Set the quantity, clamped into `1..=max_quantity`.
    #[must_use]
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.set_quantity(quantity);
        self
    }

    /// Set the vendor delivery fee.
    #[must_use]
    pub fn with_delivery_fee(mut self, delivery_fee: i64) -> Self {
        self.delivery_fee = delivery_fee;
        self
    }

    /// Set the pharmacy display name.
    #[must_use]
    pub fn with_pharmacy_name(mut self, pharmacy_name: impl Into<String>) -> Self {
        self.pharmacy_name = pharmacy_name.into();
        self
    }

    /// Set the original (pre-discount) price.
    #[must_use]
    pub fn with_original_price(mut self, original_price: Option<i64>) -> Self {
        self.original_price = original_price;
        self
    }

    /// Mark the item as requiring a prescription.
    #[must_use]
    pub fn with_requires_prescription(mut self, requires_prescription: bool) -> Self {
        self.requires_prescription = requires_prescription;
        self
    }
}
