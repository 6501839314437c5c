//! Sync errors.

use medcart::{items::factory::ItemFactoryError, orders::OrderAssemblyError};
use thiserror::Error;

use crate::{persistence::PersistenceError, remote::RemoteError, wire::WireError};

/// Errors returned by [`super::CartCoordinator`] operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote cart did not accept a mirrored mutation.
    #[error("cart sync failed: {0}")]
    Remote(#[from] RemoteError),

    /// Loading or saving the cart failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The promotion code was not applied.
    #[error(transparent)]
    Promotion(#[from] PromotionError),

    /// The order was not placed.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The command carried malformed input and the cart ignored it.
    #[error("ignored: {0}")]
    Ignored(ItemFactoryError),
}

/// Promotion code failures. None of these touch the cart.
#[derive(Debug, Error)]
pub enum PromotionError {
    /// No code was entered.
    #[error("enter a promo code")]
    EmptyCode,

    /// The promotion service rejected the code.
    #[error("{0}")]
    Rejected(String),

    /// The promotion service could not be reached or failed.
    #[error("promotion service unavailable: {0}")]
    Remote(RemoteError),

    /// The promotion service answered with an unusable rule.
    #[error("invalid promotion: {0}")]
    Malformed(#[from] WireError),
}

impl From<RemoteError> for PromotionError {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::Rejected(message) => Self::Rejected(message),
            RemoteError::Status { status, message } if (400..500).contains(&status) => {
                Self::Rejected(message)
            }
            RemoteError::Malformed(error) => Self::Malformed(error),
            other => Self::Remote(other),
        }
    }
}

/// Order submission failures. None of these touch the cart.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The cart cannot be turned into an order.
    #[error(transparent)]
    Assembly(#[from] OrderAssemblyError),

    /// The order service did not accept the order.
    #[error("order submission failed: {0}")]
    Remote(#[from] RemoteError),

    /// The order service acknowledged the order without an id.
    #[error("invalid order response: {0}")]
    Malformed(#[from] WireError),
}
