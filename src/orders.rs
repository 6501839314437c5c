//! Order Assembler
//!
//! Flattens the cart into an order draft. The client-computed totals travel with the order; the
//! order service is not expected to recompute them from the lines.

use thiserror::Error;

use crate::cart::Cart;

/// Errors raised while assembling an order.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderAssemblyError {
    /// There is nothing to order.
    #[error("cart is empty")]
    EmptyCart,

    /// The delivery address is blank.
    #[error("delivery address is required")]
    MissingAddress,
}

/// One order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    /// Product identifier
    pub product_id: String,

    /// Pharmacy (vendor) identifier
    pub pharmacy_id: String,

    /// Units ordered
    pub quantity: u32,

    /// Unit price in minor units
    pub price: i64,

    /// Prescription the line was added from
    pub prescription_id: Option<String>,

    /// Whether the product requires a prescription
    pub requires_prescription: bool,
}

/// An order ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    /// Order lines in cart order
    pub lines: Vec<OrderLine>,

    /// Where to deliver
    pub delivery_address: String,

    /// Whether wallet credits should be used
    pub use_credits: bool,

    /// Active promotion code, if any
    pub promo_code: Option<String>,

    /// Subtotal in minor units
    pub subtotal: i64,

    /// Discount in minor units
    pub discount: i64,

    /// Delivery fee in minor units
    pub delivery_fee: i64,

    /// Grand total in minor units
    pub total: i64,
}

/// Assemble an order draft from the current cart.
///
/// # Errors
///
/// - [`OrderAssemblyError::EmptyCart`]: the cart holds no items.
/// - [`OrderAssemblyError::MissingAddress`]: the delivery address is blank.
pub fn assemble_order(
    cart: &Cart,
    delivery_address: &str,
    use_credits: bool,
) -> Result<OrderDraft, OrderAssemblyError> {
    if cart.is_empty() {
        return Err(OrderAssemblyError::EmptyCart);
    }

    let delivery_address = delivery_address.trim();

    if delivery_address.is_empty() {
        return Err(OrderAssemblyError::MissingAddress);
    }

    let lines = cart
        .items()
        .iter()
        .map(|item| OrderLine {
            product_id: item.product_id().to_string(),
            pharmacy_id: item.pharmacy_id().to_string(),
            quantity: item.quantity(),
            price: item.price,
            prescription_id: item.prescription_id.clone(),
            requires_prescription: item.requires_prescription,
        })
        .collect();

    let totals = cart.totals();

    Ok(OrderDraft {
        lines,
        delivery_address: delivery_address.to_string(),
        use_credits,
        promo_code: cart.promotion().map(|promotion| promotion.code.clone()),
        subtotal: totals.subtotal.to_minor_units(),
        discount: totals.discount.to_minor_units(),
        delivery_fee: totals.delivery_fee.to_minor_units(),
        total: totals.total.to_minor_units(),
    })
}
