//! Wire schemas
//!
//! Request and response bodies for the remote cart, promotion and order services. Every response
//! is parsed into a typed schema and validated into domain values here, so a malformed payload
//! fails at the edge instead of leaking into totals math.

use medcart::money::AmountError;
use serde::Deserialize;
use thiserror::Error;

pub mod cart;
pub mod orders;
pub mod promotions;

/// Validation errors for remote payloads.
#[derive(Debug, Error, PartialEq)]
pub enum WireError {
    /// An amount is negative, unrepresentable or in an unknown currency.
    #[error("invalid amount in {field}: {source}")]
    Amount {
        /// Field the amount was read from
        field: &'static str,
        /// Conversion failure
        source: AmountError,
    },

    /// A required identifier is missing or blank.
    #[error("missing {0}")]
    Missing(&'static str),

    /// A line quantity is not a positive integer.
    #[error("invalid quantity {quantity} for {product_id}")]
    Quantity {
        /// Product the line refers to
        product_id: String,
        /// Quantity received
        quantity: i64,
    },
}

/// Response envelope shared by every endpoint.
///
/// Successful responses wrap their payload in `data`; failures carry a `message`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    /// Successful response
    Data {
        /// Payload
        data: T,
    },

    /// Failed response
    Failure {
        /// Human readable reason
        message: String,
    },
}

impl<T> Envelope<T> {
    /// Unwrap the payload, turning a failure envelope into its message.
    ///
    /// # Errors
    ///
    /// Returns the failure message when the envelope is a failure.
    pub fn into_result(self) -> Result<T, String> {
        match self {
            Self::Data { data } => Ok(data),
            Self::Failure { message } => Err(message),
        }
    }
}

/// Reject blank identifiers.
pub(crate) fn required(value: Option<String>, field: &'static str) -> Result<String, WireError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(WireError::Missing(field))
}
