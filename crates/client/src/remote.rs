//! Remote services
//!
//! The cart, promotion and order services the client talks to. The coordinator only depends on
//! these traits; [`crate::http::HttpServices`] is the production implementation.

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::wire::{
    WireError,
    cart::{AddItemRequest, RemoveItemRequest, ServerCart, UpdateItemRequest},
    orders::{CreateOrderRequest, OrderResponse},
    promotions::{PromoValidation, ValidatePromoRequest},
};

/// Errors raised by remote services.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport or body decoding failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body is not valid JSON for the expected schema.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The service answered with a non-success status.
    #[error("request failed with status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Message from the response body
        message: String,
    },

    /// The service answered with a failure envelope.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The response did not pass validation.
    #[error("malformed response: {0}")]
    Malformed(#[from] WireError),

    /// No bearer credential is available for an authenticated endpoint.
    #[error("not authenticated")]
    Unauthenticated,
}

impl RemoteError {
    /// Message suitable for the cart's error field.
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { message, .. } | Self::Rejected(message) if !message.is_empty() => {
                message.clone()
            }
            _ => self.to_string(),
        }
    }
}

/// Server-side cart.
#[automock]
#[async_trait]
pub trait RemoteCart: Send + Sync {
    /// `GET /cart`
    async fn fetch_cart(&self) -> Result<ServerCart, RemoteError>;

    /// `POST /cart/add`
    async fn add_item(&self, request: AddItemRequest) -> Result<(), RemoteError>;

    /// `PUT /cart/update`
    async fn update_item(&self, request: UpdateItemRequest) -> Result<(), RemoteError>;

    /// `DELETE /cart/remove`
    async fn remove_item(&self, request: RemoveItemRequest) -> Result<(), RemoteError>;

    /// `DELETE /cart/clear`
    async fn clear_cart(&self) -> Result<(), RemoteError>;
}

/// Promotion code validation.
#[automock]
#[async_trait]
pub trait PromotionService: Send + Sync {
    /// `POST /promo-codes/validate`
    async fn validate(&self, request: ValidatePromoRequest)
    -> Result<PromoValidation, RemoteError>;
}

/// Order submission.
#[automock]
#[async_trait]
pub trait OrderService: Send + Sync {
    /// `POST /orders/`
    async fn create_order(&self, request: CreateOrderRequest)
    -> Result<OrderResponse, RemoteError>;
}
