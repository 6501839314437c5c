//! Guest cart file.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use medcart::snapshot::CartSnapshot;
use tokio::fs;
use tracing::debug;

use super::{CartPersistence, PersistenceError};

/// Stores the guest cart as a single JSON document under one storage key.
#[derive(Debug, Clone)]
pub struct GuestFileStore {
    path: PathBuf,
}

impl GuestFileStore {
    /// Store the cart for `key` inside `dir`.
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    /// Location of the cart document.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CartPersistence for GuestFileStore {
    async fn load_cart(&self) -> Result<Option<CartSnapshot>, PersistenceError> {
        let json = match fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        Ok(Some(CartSnapshot::from_json(&json)?))
    }

    async fn save_cart(&self, snapshot: CartSnapshot) -> Result<(), PersistenceError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
        }

        // Write beside the target and rename so a crash never leaves half a document.
        let staging = self.path.with_extension("json.tmp");

        fs::write(&staging, snapshot.to_json()?).await?;
        fs::rename(&staging, &self.path).await?;

        debug!(path = %self.path.display(), items = snapshot.items.len(), "saved guest cart");

        Ok(())
    }

    async fn clear_cart(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path).await {
            Err(error) if error.kind() != ErrorKind::NotFound => Err(error.into()),
            _ => Ok(()),
        }
    }
}
