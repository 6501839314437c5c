//! Remote cart schemas.

use medcart::{
    items::{DEFAULT_QUANTITY_CAP, LineItem, LineItemKey},
    money::{major_units, minor_units},
};
use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use serde::{Deserialize, Serialize};

use crate::wire::{WireError, required};

/// Server cart as returned by `GET /cart`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCart {
    /// Server-side line items
    #[serde(default)]
    pub items: Vec<ServerCartItem>,
}

/// Product reference nested in a server line.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[expect(missing_docs, reason = "field names mirror the remote schema")]
pub struct ProductRef {
    #[serde(alias = "_id")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub dosage: Option<String>,
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub requires_prescription: bool,
}

/// Pharmacy reference nested in a server line.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
#[expect(missing_docs, reason = "field names mirror the remote schema")]
pub struct PharmacyRef {
    #[serde(alias = "_id")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub delivery_fee: Option<Decimal>,
}

/// One server-side line item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCartItem {
    /// Product reference
    pub product: ProductRef,

    /// Pharmacy reference
    #[serde(default)]
    pub pharmacy: PharmacyRef,

    /// Units in the server cart
    pub quantity: i64,

    /// Unit price in major units
    pub price: Decimal,

    /// Pre-discount unit price in major units
    #[serde(default)]
    pub original_price: Option<Decimal>,

    /// Vendor stock cap
    #[serde(default)]
    pub max_quantity: Option<u32>,
}

impl ServerCart {
    /// Validate the server lines into line items.
    ///
    /// Fields the server does not echo (delivery fee, caps, display data) are carried over from
    /// the matching local line when there is one.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure; a partially valid cart is never returned.
    pub fn into_line_items(
        self,
        currency: &Currency,
        local: &[LineItem],
        default_delivery_fee: i64,
    ) -> Result<Vec<LineItem>, WireError> {
        self.items
            .into_iter()
            .map(|item| item.into_line_item(currency, local, default_delivery_fee))
            .collect()
    }
}

impl ServerCartItem {
    /// Validate one server line into a line item.
    ///
    /// # Errors
    ///
    /// Returns an error for blank identifiers, non-positive quantities or invalid amounts.
    pub fn into_line_item(
        self,
        currency: &Currency,
        local: &[LineItem],
        default_delivery_fee: i64,
    ) -> Result<LineItem, WireError> {
        let product_id = required(self.product.id, "product id")?;
        let pharmacy_id = required(self.pharmacy.id, "pharmacy id")?;

        let quantity = u32::try_from(self.quantity)
            .ok()
            .filter(|quantity| *quantity > 0)
            .ok_or_else(|| WireError::Quantity {
                product_id: product_id.clone(),
                quantity: self.quantity,
            })?;

        let price = minor_units(self.price, currency)
            .map_err(|source| WireError::Amount { field: "price", source })?;

        let original_price = self
            .original_price
            .map(|original| minor_units(original, currency))
            .transpose()
            .map_err(|source| WireError::Amount {
                field: "originalPrice",
                source,
            })?;

        let server_fee = self
            .pharmacy
            .delivery_fee
            .map(|fee| minor_units(fee, currency))
            .transpose()
            .map_err(|source| WireError::Amount {
                field: "pharmacy.deliveryFee",
                source,
            })?;

        let key = LineItemKey::new(product_id, pharmacy_id);
        let prior = local.iter().find(|item| item.key() == &key);

        let max_quantity = self
            .max_quantity
            .or_else(|| prior.map(|item| item.max_quantity))
            .unwrap_or(DEFAULT_QUANTITY_CAP);

        let name = self
            .product
            .name
            .or_else(|| prior.map(|item| item.name.clone()))
            .unwrap_or_else(|| key.product_id().to_string());

        let pharmacy_name = self
            .pharmacy
            .name
            .or_else(|| prior.map(|item| item.pharmacy_name.clone()))
            .unwrap_or_default();

        let delivery_fee = server_fee
            .or_else(|| prior.map(|item| item.delivery_fee))
            .unwrap_or(default_delivery_fee);

        let mut item = LineItem::new(key, name, price, quantity)
            .with_max_quantity(max_quantity.max(quantity))
            .with_quantity(quantity)
            .with_original_price(original_price)
            .with_pharmacy_name(pharmacy_name)
            .with_delivery_fee(delivery_fee)
            .with_requires_prescription(
                self.product.requires_prescription
                    || prior.is_some_and(|item| item.requires_prescription),
            );

        item.image = self.product.image.or_else(|| prior.and_then(|p| p.image.clone()));
        item.category = self
            .product
            .category
            .or_else(|| prior.and_then(|p| p.category.clone()));
        item.dosage = self.product.dosage.or_else(|| prior.and_then(|p| p.dosage.clone()));
        item.manufacturer = self
            .product
            .manufacturer
            .or_else(|| prior.and_then(|p| p.manufacturer.clone()));
        item.estimated_delivery = prior.and_then(|p| p.estimated_delivery.clone());

        Ok(item)
    }
}

/// Body of `POST /cart/add`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[expect(missing_docs, reason = "field names mirror the remote schema")]
pub struct AddItemRequest {
    pub product_id: String,
    pub pharmacy_id: String,
    pub quantity: u32,
    pub price: Decimal,
    pub product_name: String,
    pub pharmacy_name: String,
    pub image: Option<String>,
}

impl AddItemRequest {
    /// Build an add request for `quantity` units of `item`.
    pub fn new(item: &LineItem, quantity: u32, currency: &Currency) -> Self {
        Self {
            product_id: item.product_id().to_string(),
            pharmacy_id: item.pharmacy_id().to_string(),
            quantity,
            price: major_units(item.price, currency),
            product_name: item.name.clone(),
            pharmacy_name: item.pharmacy_name.clone(),
            image: item.image.clone(),
        }
    }
}

/// Body of `PUT /cart/update`.
///
/// The server keys updates by product; the pharmacy id is sent along so a server that sells the
/// same product from several pharmacies can disambiguate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[expect(missing_docs, reason = "field names mirror the remote schema")]
pub struct UpdateItemRequest {
    pub product_id: String,
    pub pharmacy_id: String,
    pub quantity: u32,
}

impl UpdateItemRequest {
    /// Build an update request for `key`.
    pub fn new(key: &LineItemKey, quantity: u32) -> Self {
        Self {
            product_id: key.product_id().to_string(),
            pharmacy_id: key.pharmacy_id().to_string(),
            quantity,
        }
    }
}

/// Body of `DELETE /cart/remove`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[expect(missing_docs, reason = "field names mirror the remote schema")]
pub struct RemoveItemRequest {
    pub product_id: String,
    pub pharmacy_id: String,
}

impl From<&LineItemKey> for RemoveItemRequest {
    fn from(key: &LineItemKey) -> Self {
        Self {
            product_id: key.product_id().to_string(),
            pharmacy_id: key.pharmacy_id().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::EGP;
    use serde_json::json;
    use testresult::TestResult;

    use crate::wire::Envelope;

    use super::*;

    fn server_cart(value: serde_json::Value) -> TestResult<ServerCart> {
        let envelope: Envelope<ServerCart> = serde_json::from_value(value)?;

        Ok(envelope.into_result()?)
    }

    #[test]
    fn parses_nested_references_into_line_items() -> TestResult {
        let cart = server_cart(json!({
            "success": true,
            "data": {
                "items": [{
                    "product": { "_id": "p1", "name": "Panadol", "requiresPrescription": false },
                    "pharmacy": { "_id": "ph1", "name": "Nile", "deliveryFee": 15 },
                    "quantity": 2,
                    "price": 25.5,
                    "originalPrice": 30
                }]
            }
        }))?;

        let items = cart.into_line_items(EGP, &[], 1_500)?;
        let item = items.first().ok_or("missing item")?;

        assert_eq!(item.key(), &LineItemKey::new("p1", "ph1"));
        assert_eq!(item.quantity(), 2);
        assert_eq!(item.price, 2_550);
        assert_eq!(item.original_price, Some(3_000));
        assert_eq!(item.delivery_fee, 1_500);
        assert_eq!(item.pharmacy_name, "Nile");

        Ok(())
    }

    #[test]
    fn missing_fields_fall_back_to_the_local_line() -> TestResult {
        let local = LineItem::new(LineItemKey::new("p1", "ph1"), "Panadol", 2_000, 1)
            .with_max_quantity(5)
            .with_delivery_fee(2_000)
            .with_pharmacy_name("Nile");

        let cart = server_cart(json!({
            "data": { "items": [{
                "product": { "id": "p1" },
                "pharmacy": { "id": "ph1" },
                "quantity": 3,
                "price": 20
            }]}
        }))?;

        let items = cart.into_line_items(EGP, &[local], 1_500)?;
        let item = items.first().ok_or("missing item")?;

        assert_eq!(item.name, "Panadol");
        assert_eq!(item.max_quantity, 5);
        assert_eq!(item.delivery_fee, 2_000);
        assert_eq!(item.pharmacy_name, "Nile");

        Ok(())
    }

    #[test]
    fn malformed_lines_fail_loudly() -> TestResult {
        let no_pharmacy = server_cart(json!({
            "data": { "items": [{ "product": { "id": "p1" }, "quantity": 1, "price": 10 }]}
        }))?;

        assert_eq!(
            no_pharmacy.into_line_items(EGP, &[], 0),
            Err(WireError::Missing("pharmacy id"))
        );

        let zero = server_cart(json!({
            "data": { "items": [{
                "product": { "id": "p1" }, "pharmacy": { "id": "a" }, "quantity": 0, "price": 10
            }]}
        }))?;

        assert!(matches!(
            zero.into_line_items(EGP, &[], 0),
            Err(WireError::Quantity { quantity: 0, .. })
        ));

        let negative = server_cart(json!({
            "data": { "items": [{
                "product": { "id": "p1" }, "pharmacy": { "id": "a" }, "quantity": 1, "price": -10
            }]}
        }))?;

        assert!(matches!(
            negative.into_line_items(EGP, &[], 0),
            Err(WireError::Amount { field: "price", .. })
        ));

        Ok(())
    }

    #[test]
    fn missing_price_is_a_parse_error() {
        let parsed = serde_json::from_value::<Envelope<ServerCart>>(json!({
            "data": { "items": [{ "product": { "id": "p1" }, "quantity": 1 }]}
        }));

        assert!(parsed.is_err(), "a line without a price must not parse");
    }

    #[test]
    fn requests_serialize_in_camel_case() -> TestResult {
        let item = LineItem::new(LineItemKey::new("p1", "ph1"), "Panadol", 2_550, 1)
            .with_pharmacy_name("Nile");

        let add = serde_json::to_value(AddItemRequest::new(&item, 2, EGP))?;

        assert_eq!(
            add,
            json!({
                "productId": "p1",
                "pharmacyId": "ph1",
                "quantity": 2,
                "price": 25.5,
                "productName": "Panadol",
                "pharmacyName": "Nile",
                "image": null
            })
        );

        let update = serde_json::to_value(UpdateItemRequest::new(item.key(), 4))?;

        assert_eq!(update, json!({ "productId": "p1", "pharmacyId": "ph1", "quantity": 4 }));

        Ok(())
    }
}
