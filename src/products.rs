//! Products
//!
//! Catalog products and the per-vendor offers they are sold under. These are read-only inputs
//! owned by the catalog; the cart copies what it needs out of them at add-time.

/// A vendor's price and availability record for a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    /// Pharmacy (vendor) identifier
    pub pharmacy_id: String,

    /// Pharmacy display name
    pub pharmacy_name: String,

    /// Unit price in minor units
    pub price: i64,

    /// Pre-discount unit price in minor units
    pub original_price: Option<i64>,

    /// Units the vendor can sell; `None` when unknown
    pub available_quantity: Option<u32>,

    /// Delivery fee charged once per vendor, in minor units
    pub delivery_fee: i64,

    /// Human readable delivery estimate
    pub estimated_delivery: Option<String>,

    /// Whether the vendor currently has stock
    pub in_stock: bool,
}

/// Catalog product
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Product {
    /// Product identifier; products without one cannot be added to a cart
    pub id: Option<String>,

    /// Product name
    pub name: String,

    /// Image URL
    pub image: Option<String>,

    /// Catalog category
    pub category: Option<String>,

    /// Dosage, e.g. `500mg`
    pub dosage: Option<String>,

    /// Manufacturer name
    pub manufacturer: Option<String>,

    /// Whether dispensing requires an approved prescription
    pub requires_prescription: bool,

    /// Lowest price across vendors, in minor units
    pub lowest_price: Option<i64>,

    /// Highest price across vendors, in minor units
    pub highest_price: Option<i64>,

    /// Vendor offers, in catalog order
    pub offers: Vec<Offer>,
}

impl Product {
    /// Returns the product identifier if it is present and not blank.
    pub fn identity(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    /// Find the offer sold by the given pharmacy.
    pub fn offer(&self, pharmacy_id: &str) -> Option<&Offer> {
        self.offers
            .iter()
            .find(|offer| offer.pharmacy_id == pharmacy_id)
    }

    /// Returns the first offer in catalog order.
    pub fn default_offer(&self) -> Option<&Offer> {
        self.offers.first()
    }
}
