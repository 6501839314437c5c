//! Catalog
//!
//! Product catalogs loaded from YAML. Amounts are written as decimal major units and converted
//! into minor units of the catalog currency on load.

use std::{collections::BTreeMap, fs, path::Path};

use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    money::{AmountError, currency, minor_units},
    products::{Offer, Product},
};

/// Catalog loading errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// IO error reading the catalog file
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid amount or currency
    #[error("Invalid amount for {context}: {source}")]
    Amount {
        /// Field the amount was read from
        context: String,
        /// Conversion failure
        source: AmountError,
    },

    /// Unknown currency code
    #[error(transparent)]
    Currency(AmountError),

    /// Product not found
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Offer not found
    #[error("Pharmacy {pharmacy_id} does not sell {product_id}")]
    OfferNotFound {
        /// Product identifier
        product_id: String,
        /// Pharmacy identifier
        pharmacy_id: String,
    },
}

#[derive(Debug, Deserialize)]
struct CatalogFixture {
    currency: String,
    products: BTreeMap<String, ProductFixture>,
}

#[derive(Debug, Deserialize)]
struct ProductFixture {
    name: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    dosage: Option<String>,
    #[serde(default)]
    manufacturer: Option<String>,
    #[serde(default)]
    requires_prescription: bool,
    #[serde(default)]
    lowest_price: Option<Decimal>,
    #[serde(default)]
    highest_price: Option<Decimal>,
    #[serde(default)]
    offers: Vec<OfferFixture>,
}

#[derive(Debug, Deserialize)]
struct OfferFixture {
    pharmacy_id: String,
    #[serde(default)]
    pharmacy_name: Option<String>,
    price: Decimal,
    #[serde(default)]
    original_price: Option<Decimal>,
    #[serde(default)]
    available_quantity: Option<u32>,
    #[serde(default)]
    delivery_fee: Decimal,
    #[serde(default)]
    estimated_delivery: Option<String>,
    #[serde(default = "in_stock_by_default")]
    in_stock: bool,
}

fn in_stock_by_default() -> bool {
    true
}

/// A product catalog keyed by product id.
#[derive(Debug, Clone)]
pub struct Catalog {
    currency: &'static Currency,
    products: BTreeMap<String, Product>,
}

impl Catalog {
    /// Parse a catalog from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or an amount cannot be converted.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let fixture: CatalogFixture = serde_norway::from_str(yaml)?;

        let currency = currency(&fixture.currency).map_err(CatalogError::Currency)?;

        let products = fixture
            .products
            .into_iter()
            .map(|(id, product)| {
                let product = product_from_fixture(&id, product, currency)?;

                Ok((id, product))
            })
            .collect::<Result<BTreeMap<_, _>, CatalogError>>()?;

        Ok(Self { currency, products })
    }

    /// Load a catalog from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }

    /// Catalog currency.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Look up a product by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ProductNotFound`] for unknown ids.
    pub fn product(&self, id: &str) -> Result<&Product, CatalogError> {
        self.products
            .get(id)
            .ok_or_else(|| CatalogError::ProductNotFound(id.to_string()))
    }

    /// Look up a product and, optionally, one of its offers.
    ///
    /// # Errors
    ///
    /// Returns an error when the product is unknown or the pharmacy does not sell it.
    pub fn product_offer(
        &self,
        id: &str,
        pharmacy_id: Option<&str>,
    ) -> Result<(&Product, Option<&Offer>), CatalogError> {
        let product = self.product(id)?;

        let Some(pharmacy_id) = pharmacy_id else {
            return Ok((product, None));
        };

        let offer = product
            .offer(pharmacy_id)
            .ok_or_else(|| CatalogError::OfferNotFound {
                product_id: id.to_string(),
                pharmacy_id: pharmacy_id.to_string(),
            })?;

        Ok((product, Some(offer)))
    }

    /// All products in id order.
    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }
}

fn amount(value: Decimal, currency: &Currency, context: impl Fn() -> String) -> Result<i64, CatalogError> {
    minor_units(value, currency).map_err(|source| CatalogError::Amount {
        context: context(),
        source,
    })
}

fn optional_amount(
    value: Option<Decimal>,
    currency: &Currency,
    context: impl Fn() -> String,
) -> Result<Option<i64>, CatalogError> {
    value
        .map(|value| amount(value, currency, context))
        .transpose()
}

fn product_from_fixture(
    id: &str,
    fixture: ProductFixture,
    currency: &Currency,
) -> Result<Product, CatalogError> {
    let offers = fixture
        .offers
        .into_iter()
        .map(|offer| offer_from_fixture(id, offer, currency))
        .collect::<Result<Vec<_>, _>>()?;

    let in_stock_prices = || offers.iter().filter(|offer| offer.in_stock).map(|offer| offer.price);

    let lowest_price = match optional_amount(fixture.lowest_price, currency, || {
        format!("{id}.lowest_price")
    })? {
        Some(price) => Some(price),
        None => in_stock_prices().min(),
    };

    let highest_price = match optional_amount(fixture.highest_price, currency, || {
        format!("{id}.highest_price")
    })? {
        Some(price) => Some(price),
        None => in_stock_prices().max(),
    };

    Ok(Product {
        id: Some(id.to_string()),
        name: fixture.name,
        image: fixture.image,
        category: fixture.category,
        dosage: fixture.dosage,
        manufacturer: fixture.manufacturer,
        requires_prescription: fixture.requires_prescription,
        lowest_price,
        highest_price,
        offers,
    })
}

fn offer_from_fixture(
    product_id: &str,
    fixture: OfferFixture,
    currency: &Currency,
) -> Result<Offer, CatalogError> {
    let context = |field: &'static str| {
        let pharmacy_id = fixture.pharmacy_id.clone();
        move || format!("{product_id}@{pharmacy_id}.{field}")
    };

    Ok(Offer {
        price: amount(fixture.price, currency, context("price"))?,
        original_price: optional_amount(fixture.original_price, currency, context("original_price"))?,
        delivery_fee: amount(fixture.delivery_fee, currency, context("delivery_fee"))?,
        pharmacy_name: fixture
            .pharmacy_name
            .unwrap_or_else(|| fixture.pharmacy_id.clone()),
        pharmacy_id: fixture.pharmacy_id,
        available_quantity: fixture.available_quantity,
        estimated_delivery: fixture.estimated_delivery,
        in_stock: fixture.in_stock,
    })
}
