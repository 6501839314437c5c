//! Item Factory
//!
//! Builds line items from a catalog product plus the vendor offer the customer picked.

use thiserror::Error;

use crate::{
    items::{DEFAULT_QUANTITY_CAP, LineItem, LineItemKey},
    products::{Offer, Product},
};

/// Pharmacy id used for the placeholder offer of a product with no vendor offers.
pub const PLACEHOLDER_PHARMACY_ID: &str = "marketplace";

/// Errors raised while building a line item.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ItemFactoryError {
    /// The product carries no usable identifier.
    #[error("product has no identity")]
    InvalidProduct,

    /// The request or the vendor's stock left nothing to add.
    #[error("no quantity available for {0}")]
    NothingToAdd(LineItemKey),
}

/// Resolve the offer a line item will be built from.
///
/// An explicit offer wins, then the product's first offer. A product with no offers gets a
/// placeholder offer synthesized from its aggregate price fields, so any addable product can be
/// represented in the cart.
pub fn resolve_offer(product: &Product, offer: Option<&Offer>, default_delivery_fee: i64) -> Offer {
    if let Some(offer) = offer.or_else(|| product.default_offer()) {
        return offer.clone();
    }

    let price = product
        .lowest_price
        .or(product.highest_price)
        .unwrap_or_default();

    Offer {
        pharmacy_id: PLACEHOLDER_PHARMACY_ID.to_string(),
        pharmacy_name: String::from("Marketplace"),
        price,
        original_price: product.highest_price.filter(|highest| *highest > price),
        available_quantity: None,
        delivery_fee: default_delivery_fee,
        estimated_delivery: None,
        in_stock: true,
    }
}

/// Build the key a product/offer pair resolves to, without building the item.
///
/// # Errors
///
/// Returns [`ItemFactoryError::InvalidProduct`] when the product has no identity.
pub fn resolve_key(
    product: &Product,
    offer: Option<&Offer>,
    default_delivery_fee: i64,
) -> Result<LineItemKey, ItemFactoryError> {
    let product_id = product.identity().ok_or(ItemFactoryError::InvalidProduct)?;
    let offer = resolve_offer(product, offer, default_delivery_fee);

    Ok(LineItemKey::new(product_id, offer.pharmacy_id))
}

/// Create a line item for `quantity` units of `product` from `offer`.
///
/// The quantity is clamped to the offer's available quantity ([`DEFAULT_QUANTITY_CAP`] when the
/// vendor does not report one).
///
/// # Errors
///
/// - [`ItemFactoryError::InvalidProduct`]: the product has no identity.
/// - [`ItemFactoryError::NothingToAdd`]: the clamped quantity is zero.
pub fn create_line_item(
    product: &Product,
    offer: Option<&Offer>,
    quantity: u32,
    default_delivery_fee: i64,
) -> Result<LineItem, ItemFactoryError> {
    let product_id = product.identity().ok_or(ItemFactoryError::InvalidProduct)?;
    let offer = resolve_offer(product, offer, default_delivery_fee);
    let key = LineItemKey::new(product_id, offer.pharmacy_id.as_str());

    let max_quantity = offer.available_quantity.unwrap_or(DEFAULT_QUANTITY_CAP);
    let quantity = quantity.min(max_quantity);

    if quantity == 0 {
        return Err(ItemFactoryError::NothingToAdd(key));
    }

    Ok(LineItem {
        key,
        quantity,
        max_quantity,
        price: offer.price,
        original_price: offer.original_price,
        pharmacy_name: offer.pharmacy_name,
        delivery_fee: offer.delivery_fee,
        estimated_delivery: offer.estimated_delivery,
        requires_prescription: product.requires_prescription,
        prescription_id: None,
        prescription_quantity: 0,
        name: product.name.clone(),
        image: product.image.clone(),
        category: product.category.clone(),
        dosage: product.dosage.clone(),
        manufacturer: product.manufacturer.clone(),
    })
}
