//! Cart persistence
//!
//! Guest carts live in a local JSON document and authenticated carts live on the remote cart
//! service. Both sit behind [`CartPersistence`] so the coordinator can load, save and clear a
//! cart without knowing where it is kept.

use async_trait::async_trait;
use medcart::snapshot::{CartSnapshot, SnapshotError};
use mockall::automock;
use thiserror::Error;

use crate::remote::RemoteError;

mod guest;
mod remote;
mod writer;

pub use guest::GuestFileStore;
pub use remote::RemoteCartPersistence;
pub use writer::GuestWriter;

/// Errors raised while loading or saving a cart.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Reading or writing local storage failed.
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document is not a usable snapshot.
    #[error("invalid cart snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The remote cart service failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The background writer stopped abnormally.
    #[error("guest writer stopped: {0}")]
    Writer(#[from] tokio::task::JoinError),
}

/// Where a cart is kept between sessions.
#[automock]
#[async_trait]
pub trait CartPersistence: Send + Sync {
    /// Load the stored cart, if there is one.
    async fn load_cart(&self) -> Result<Option<CartSnapshot>, PersistenceError>;

    /// Replace the stored cart wholesale.
    async fn save_cart(&self, snapshot: CartSnapshot) -> Result<(), PersistenceError>;

    /// Remove the stored cart.
    async fn clear_cart(&self) -> Result<(), PersistenceError>;
}
