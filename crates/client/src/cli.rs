//! Command line front-end.

use std::{io, path::Path, sync::Arc};

use medcart::{
    cart::PriceUpdate,
    catalog::{Catalog, CatalogError},
    items::LineItemKey,
    receipt::{Receipt, ReceiptError},
};
use rusty_money::iso::Currency;
use thiserror::Error;
use tracing::info;

use crate::{
    auth::SessionCredentials,
    config::{ClientConfig, Command, ConfigError},
    http::HttpServices,
    persistence::GuestFileStore,
    remote::RemoteError,
    sync::{CartCoordinator, Services, Session, SyncError},
};

/// Errors surfaced by the command line.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be created
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A cart operation failed
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The catalog could not be used
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The cart could not be rendered
    #[error(transparent)]
    Receipt(#[from] ReceiptError),

    /// Writing output failed
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The catalog is priced in another currency than the cart.
    #[error("catalog is priced in {catalog}, the cart in {cart}")]
    CatalogCurrency {
        /// Catalog currency code
        catalog: &'static str,
        /// Cart currency code
        cart: &'static str,
    },

    /// `login` needs a bearer token.
    #[error("sign-in requires a token (--token or MEDCART_TOKEN)")]
    SignInRequired,
}

/// Run one command against the configured cart, writing results to `out`.
///
/// # Errors
///
/// Returns an error if the command fails. The guest cart is flushed either way.
pub async fn run(config: ClientConfig, mut out: impl io::Write) -> Result<(), CliError> {
    let options = config.sync_options()?;
    let currency = options.currency;

    let session = match config.command {
        Command::Login if config.bearer_token().is_none() => return Err(CliError::SignInRequired),
        Command::Login => Session::Guest,
        _ => config.session(),
    };

    let credentials = Arc::new(SessionCredentials::new(config.bearer_token()));
    let http = Arc::new(HttpServices::new(
        &config.api_url,
        config.timeout(),
        credentials,
    )?);

    let services = Services {
        remote: http.clone(),
        promotions: http.clone(),
        orders: http,
        guest_store: Arc::new(GuestFileStore::new(&config.guest_dir, &config.guest_key)),
    };

    let coordinator = CartCoordinator::new(services, options, session);

    let result = match coordinator.hydrate().await {
        Ok(()) => execute(&coordinator, config.command, currency, &mut out).await,
        Err(error) => Err(error.into()),
    };

    coordinator.shutdown().await?;

    result
}

async fn execute(
    coordinator: &CartCoordinator,
    command: Command,
    currency: &'static Currency,
    out: &mut impl io::Write,
) -> Result<(), CliError> {
    match command {
        Command::Show => {}
        Command::Add {
            catalog,
            product,
            pharmacy,
            quantity,
        } => {
            let catalog = load_catalog(&catalog, currency)?;
            let (product, offer) = catalog.product_offer(&product, pharmacy.as_deref())?;

            coordinator
                .add_item(product.clone(), offer.cloned(), quantity)
                .await?;
        }
        Command::Remove { product, pharmacy } => {
            coordinator
                .remove_item(LineItemKey::new(product, pharmacy))
                .await?;
        }
        Command::Update {
            product,
            pharmacy,
            quantity,
        } => {
            coordinator
                .update_quantity(LineItemKey::new(product, pharmacy), quantity)
                .await?;
        }
        Command::Refresh { catalog } => {
            let catalog = load_catalog(&catalog, currency)?;

            let updates: Vec<PriceUpdate> = coordinator
                .cart()
                .items()
                .iter()
                .filter_map(|item| {
                    let offer = catalog
                        .product(item.product_id())
                        .ok()?
                        .offer(item.pharmacy_id())?;

                    Some(PriceUpdate::from_offer(item.product_id(), offer))
                })
                .collect();

            info!(updates = updates.len(), "refreshing prices");

            coordinator.refresh_prices(updates).await?;
        }
        Command::Clear => {
            coordinator.clear().await?;
        }
        Command::Promo { code } => {
            let promotion = coordinator.apply_promo_code(&code).await?;

            writeln!(out, "Applied promo code {}", promotion.code)?;
        }
        Command::Unpromo => {
            coordinator.remove_promotion().await;
        }
        Command::Login => {
            coordinator.authenticate().await?;

            writeln!(out, "Signed in; guest cart merged")?;
        }
        Command::Checkout {
            address,
            use_credits,
        } => {
            let order = coordinator.create_order(&address, use_credits).await?;

            writeln!(
                out,
                "Placed order {} ({})",
                order.order_number, order.status
            )?;

            return Ok(());
        }
    }

    let cart = coordinator.cart();

    Receipt::new(&cart).write_to(&mut *out)?;

    if let Some(error) = cart.error() {
        writeln!(out, "warning: {error}")?;
    }

    Ok(())
}

fn load_catalog(path: &Path, currency: &'static Currency) -> Result<Catalog, CliError> {
    let catalog = Catalog::from_path(path)?;

    if catalog.currency().iso_alpha_code != currency.iso_alpha_code {
        return Err(CliError::CatalogCurrency {
            catalog: catalog.currency().iso_alpha_code,
            cart: currency.iso_alpha_code,
        });
    }

    Ok(catalog)
}
