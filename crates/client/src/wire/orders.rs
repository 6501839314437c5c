//! Order submission schemas.

use medcart::{
    money::major_units,
    orders::{OrderDraft, OrderLine},
};
use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use serde::{Deserialize, Serialize};

use crate::wire::{WireError, required};

/// One line of `POST /orders/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[expect(missing_docs, reason = "field names mirror the remote schema")]
pub struct OrderLineRequest {
    pub product_id: String,
    pub pharmacy_id: String,
    pub quantity: u32,
    pub price: Decimal,
    pub prescription_id: Option<String>,
    pub requires_prescription: bool,
}

/// Body of `POST /orders/`.
///
/// Totals are computed client-side and travel with the order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[expect(missing_docs, reason = "field names mirror the remote schema")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
    pub delivery_address: String,
    pub use_credits: bool,
    pub promo_code: Option<String>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
}

impl CreateOrderRequest {
    /// Convert an order draft into its wire form.
    pub fn from_draft(draft: OrderDraft, currency: &Currency) -> Self {
        let line = |line: OrderLine| OrderLineRequest {
            product_id: line.product_id,
            pharmacy_id: line.pharmacy_id,
            quantity: line.quantity,
            price: major_units(line.price, currency),
            prescription_id: line.prescription_id,
            requires_prescription: line.requires_prescription,
        };

        Self {
            items: draft.lines.into_iter().map(line).collect(),
            delivery_address: draft.delivery_address,
            use_credits: draft.use_credits,
            promo_code: draft.promo_code,
            subtotal: major_units(draft.subtotal, currency),
            discount: major_units(draft.discount, currency),
            delivery_fee: major_units(draft.delivery_fee, currency),
            total: major_units(draft.total, currency),
        }
    }
}

/// Order as acknowledged by the order service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    /// Order identifier
    #[serde(alias = "_id")]
    pub id: Option<String>,

    /// Order number shown to the customer
    #[serde(default)]
    pub order_number: Option<String>,

    /// Initial order status
    #[serde(default)]
    pub status: Option<String>,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    /// Order identifier
    pub id: String,

    /// Order number, falling back to the id
    pub order_number: String,

    /// Initial status
    pub status: String,
}

impl TryFrom<OrderResponse> for PlacedOrder {
    type Error = WireError;

    fn try_from(response: OrderResponse) -> Result<Self, Self::Error> {
        let id = required(response.id, "order id")?;

        Ok(Self {
            order_number: response.order_number.unwrap_or_else(|| id.clone()),
            status: response.status.unwrap_or_else(|| "pending".to_string()),
            id,
        })
    }
}
