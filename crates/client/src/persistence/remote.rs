//! Server-side cart as a persistence backend.

use std::sync::Arc;

use async_trait::async_trait;
use medcart::{
    cart::{Cart, CartCommand},
    snapshot::CartSnapshot,
};
use rusty_money::iso::Currency;
use tracing::info;

use super::{CartPersistence, PersistenceError};
use crate::{
    remote::{RemoteCart, RemoteError},
    wire::cart::AddItemRequest,
};

/// Adapts the remote cart service to [`CartPersistence`].
///
/// Saving replaces the server cart wholesale: it is cleared and every line is re-added. The
/// promotion is client-local and never stored remotely.
#[derive(Clone)]
pub struct RemoteCartPersistence {
    remote: Arc<dyn RemoteCart>,
    currency: &'static Currency,
}

impl std::fmt::Debug for RemoteCartPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCartPersistence")
            .field("currency", &self.currency.iso_alpha_code)
            .finish_non_exhaustive()
    }
}

impl RemoteCartPersistence {
    /// Persist through `remote`, pricing in `currency`.
    pub fn new(remote: Arc<dyn RemoteCart>, currency: &'static Currency) -> Self {
        Self { remote, currency }
    }
}

#[async_trait]
impl CartPersistence for RemoteCartPersistence {
    async fn load_cart(&self) -> Result<Option<CartSnapshot>, PersistenceError> {
        let mut cart = Cart::new(self.currency);

        let items = self
            .remote
            .fetch_cart()
            .await?
            .into_line_items(self.currency, &[], cart.default_delivery_fee())
            .map_err(RemoteError::from)?;

        cart.dispatch(CartCommand::LoadCart(items));

        Ok(Some(CartSnapshot::capture(&cart)))
    }

    async fn save_cart(&self, snapshot: CartSnapshot) -> Result<(), PersistenceError> {
        self.remote.clear_cart().await?;

        for item in &snapshot.items {
            self.remote
                .add_item(AddItemRequest::new(item, item.quantity(), self.currency))
                .await?;
        }

        info!(items = snapshot.items.len(), "replaced server cart");

        Ok(())
    }

    async fn clear_cart(&self) -> Result<(), PersistenceError> {
        Ok(self.remote.clear_cart().await?)
    }
}

#[cfg(test)]
mod tests {
    use medcart::items::{LineItem, LineItemKey};
    use rust_decimal::Decimal;
    use rusty_money::iso::EGP;
    use testresult::TestResult;

    use super::*;
    use crate::{
        remote::MockRemoteCart,
        wire::cart::{PharmacyRef, ProductRef, ServerCart, ServerCartItem},
    };

    fn server_line(product: &str, quantity: i64) -> ServerCartItem {
        ServerCartItem {
            product: ProductRef {
                id: Some(product.to_string()),
                name: Some(product.to_uppercase()),
                ..ProductRef::default()
            },
            pharmacy: PharmacyRef {
                id: Some("ph1".to_string()),
                ..PharmacyRef::default()
            },
            quantity,
            price: Decimal::new(1_250, 2),
            original_price: None,
            max_quantity: None,
        }
    }

    #[tokio::test]
    async fn load_validates_the_server_cart() -> TestResult {
        let mut remote = MockRemoteCart::new();

        remote.expect_fetch_cart().once().return_once(|| {
            Ok(ServerCart {
                items: vec![server_line("p1", 2)],
            })
        });

        let store = RemoteCartPersistence::new(Arc::new(remote), EGP);
        let snapshot = store.load_cart().await?.ok_or("expected a snapshot")?;

        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.totals.subtotal, 2_500);

        Ok(())
    }

    #[tokio::test]
    async fn load_rejects_malformed_lines() {
        let mut remote = MockRemoteCart::new();

        remote.expect_fetch_cart().once().return_once(|| {
            Ok(ServerCart {
                items: vec![server_line("p1", 0)],
            })
        });

        let store = RemoteCartPersistence::new(Arc::new(remote), EGP);

        assert!(matches!(
            store.load_cart().await,
            Err(PersistenceError::Remote(RemoteError::Malformed(_)))
        ));
    }

    #[tokio::test]
    async fn save_clears_then_re_adds_every_line() -> TestResult {
        let mut remote = MockRemoteCart::new();
        let mut sequence = mockall::Sequence::new();

        remote
            .expect_clear_cart()
            .once()
            .in_sequence(&mut sequence)
            .return_once(|| Ok(()));

        remote
            .expect_add_item()
            .times(2)
            .in_sequence(&mut sequence)
            .returning(|_| Ok(()));

        let mut cart = Cart::new(EGP);
        cart.dispatch(CartCommand::LoadCart(vec![
            LineItem::new(LineItemKey::new("p1", "ph1"), "A", 1_000, 1),
            LineItem::new(LineItemKey::new("p2", "ph1"), "B", 2_000, 3),
        ]));

        let store = RemoteCartPersistence::new(Arc::new(remote), EGP);

        store.save_cart(CartSnapshot::capture(&cart)).await?;

        Ok(())
    }
}
