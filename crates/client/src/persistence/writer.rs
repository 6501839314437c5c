//! Debounced guest writer.

use std::{sync::Arc, time::Duration};

use medcart::snapshot::CartSnapshot;
use tokio::{sync::mpsc, task::JoinHandle, time::timeout};
use tracing::{debug, error, warn};

use super::{CartPersistence, PersistenceError};

#[derive(Debug)]
enum GuestWrite {
    Save(Box<CartSnapshot>),
    Clear,
}

/// Writes the guest cart once its state has settled.
///
/// Every change replaces the pending write; the store is only touched after `debounce` passes
/// with no further change, or on [`GuestWriter::shutdown`].
#[derive(Debug)]
pub struct GuestWriter {
    sender: mpsc::UnboundedSender<GuestWrite>,
    task: JoinHandle<()>,
}

impl GuestWriter {
    /// Spawn the writer task. Must be called inside a Tokio runtime.
    pub fn spawn(store: Arc<dyn CartPersistence>, debounce: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        let task = tokio::spawn(run(store, receiver, debounce));

        Self { sender, task }
    }

    /// Schedule `snapshot` to replace the stored cart.
    pub fn save(&self, snapshot: CartSnapshot) {
        self.send(GuestWrite::Save(Box::new(snapshot)));
    }

    /// Schedule removal of the stored cart.
    pub fn clear(&self) {
        self.send(GuestWrite::Clear);
    }

    fn send(&self, write: GuestWrite) {
        if self.sender.send(write).is_err() {
            warn!("guest writer has stopped, dropping write");
        }
    }

    /// Flush the pending write and stop the task.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer task panicked.
    pub async fn shutdown(self) -> Result<(), PersistenceError> {
        drop(self.sender);

        Ok(self.task.await?)
    }
}

async fn run(
    store: Arc<dyn CartPersistence>,
    mut receiver: mpsc::UnboundedReceiver<GuestWrite>,
    debounce: Duration,
) {
    while let Some(mut latest) = receiver.recv().await {
        let mut open = true;

        loop {
            match timeout(debounce, receiver.recv()).await {
                Ok(Some(next)) => latest = next,
                Ok(None) => {
                    open = false;
                    break;
                }
                Err(_settled) => break,
            }
        }

        let result = match latest {
            GuestWrite::Save(snapshot) => store.save_cart(*snapshot).await,
            GuestWrite::Clear => store.clear_cart().await,
        };

        match result {
            Ok(()) => debug!("guest cart persisted"),
            Err(error) => error!(%error, "failed to persist guest cart"),
        }

        if !open {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use medcart::{
        cart::{Cart, CartCommand},
        items::{LineItem, LineItemKey},
    };
    use rusty_money::iso::EGP;
    use testresult::TestResult;

    use super::*;
    use crate::persistence::MockCartPersistence;

    fn snapshot(quantity: u32) -> CartSnapshot {
        let mut cart = Cart::new(EGP);

        cart.dispatch(CartCommand::LoadCart(vec![LineItem::new(
            LineItemKey::new("p1", "ph1"),
            "Panadol",
            1_000,
            quantity,
        )]));

        CartSnapshot::capture(&cart)
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_collapse_into_one_write() -> TestResult {
        let mut store = MockCartPersistence::new();

        store
            .expect_save_cart()
            .once()
            .withf(|snapshot| snapshot.totals.total_items == 3)
            .return_once(|_| Ok(()));

        store.expect_clear_cart().never();

        let writer = GuestWriter::spawn(Arc::new(store), Duration::from_millis(300));

        writer.save(snapshot(1));
        writer.save(snapshot(2));
        writer.save(snapshot(3));

        writer.shutdown().await?;

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn settled_writes_are_flushed_separately() -> TestResult {
        let mut store = MockCartPersistence::new();

        store
            .expect_save_cart()
            .once()
            .withf(|snapshot| snapshot.totals.total_items == 1)
            .return_once(|_| Ok(()));

        store.expect_clear_cart().once().return_once(|| Ok(()));

        let writer = GuestWriter::spawn(Arc::new(store), Duration::from_millis(300));

        writer.save(snapshot(1));
        tokio::time::sleep(Duration::from_secs(1)).await;
        writer.clear();

        writer.shutdown().await?;

        Ok(())
    }

    #[tokio::test]
    async fn write_failures_do_not_stop_the_writer() -> TestResult {
        let mut store = MockCartPersistence::new();

        store.expect_save_cart().once().return_once(|_| {
            Err(PersistenceError::Io(std::io::Error::other("disk full")))
        });

        let writer = GuestWriter::spawn(Arc::new(store), Duration::ZERO);

        writer.save(snapshot(1));

        writer.shutdown().await?;

        Ok(())
    }
}
