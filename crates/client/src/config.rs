//! Client configuration module

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use medcart::{
    merge::MergePolicy,
    money::{AmountError, currency},
};
use thiserror::Error;

use crate::{
    auth::BearerToken,
    sync::{FailurePolicy, Session, SyncOptions},
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Arguments or environment could not be parsed.
    #[error(transparent)]
    Parse(#[from] clap::Error),

    /// The configured currency is not an ISO currency.
    #[error("invalid currency: {0}")]
    Currency(#[from] AmountError),
}

/// Medcart client configuration
#[derive(Debug, Parser)]
#[command(name = "medcart", about = "Medcart pharmacy cart client", long_about = None)]
pub struct ClientConfig {
    /// Marketplace API base URL
    #[arg(long, env = "MEDCART_API_URL", default_value = "http://localhost:5000/api")]
    pub api_url: String,

    /// Bearer token; without one the cart is a guest cart
    #[arg(long, env = "MEDCART_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Directory holding the guest cart
    #[arg(long, env = "MEDCART_GUEST_DIR", default_value = ".medcart")]
    pub guest_dir: PathBuf,

    /// Storage key of the guest cart
    #[arg(long, env = "MEDCART_GUEST_KEY", default_value = "guest-cart")]
    pub guest_key: String,

    /// ISO currency code of the cart
    #[arg(long, env = "MEDCART_CURRENCY", default_value = "EGP")]
    pub currency: String,

    /// Quiet period before the guest cart is written, in milliseconds
    #[arg(long, env = "MEDCART_DEBOUNCE_MS", default_value = "500")]
    pub debounce_ms: u64,

    /// What to do with changes the cart service rejects (rollback, keep-optimistic)
    #[arg(long, env = "MEDCART_FAILURE_POLICY", default_value = "rollback")]
    pub failure_policy: FailurePolicy,

    /// How the guest cart is merged at sign-in (server-wins, union-by-key)
    #[arg(long, env = "MEDCART_MERGE_POLICY", default_value = "server-wins")]
    pub merge_policy: MergePolicy,

    /// HTTP request timeout, in seconds
    #[arg(long, env = "MEDCART_TIMEOUT_SECS", default_value = "10")]
    pub timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    /// Operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// Cart operations.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print the cart
    Show,

    /// Add a catalog product
    Add {
        /// YAML catalog file
        #[arg(long)]
        catalog: PathBuf,

        /// Product id
        #[arg(long)]
        product: String,

        /// Pharmacy id; defaults to the product's first offer
        #[arg(long)]
        pharmacy: Option<String>,

        /// Units to add
        #[arg(long, default_value = "1")]
        quantity: u32,
    },

    /// Remove a line
    Remove {
        /// Product id
        #[arg(long)]
        product: String,

        /// Pharmacy id
        #[arg(long)]
        pharmacy: String,
    },

    /// Set a line's quantity; zero or less removes it
    Update {
        /// Product id
        #[arg(long)]
        product: String,

        /// Pharmacy id
        #[arg(long)]
        pharmacy: String,

        /// New quantity
        #[arg(long, allow_negative_numbers = true)]
        quantity: i64,
    },

    /// Re-price every line from a catalog
    Refresh {
        /// YAML catalog file
        #[arg(long)]
        catalog: PathBuf,
    },

    /// Empty the cart
    Clear,

    /// Apply a promo code
    Promo {
        /// Code to validate
        code: String,
    },

    /// Remove the promo code
    Unpromo,

    /// Merge the guest cart into the signed-in cart
    Login,

    /// Place an order for the cart
    Checkout {
        /// Delivery address
        #[arg(long)]
        address: String,

        /// Spend account credits
        #[arg(long)]
        use_credits: bool,
    },
}

impl ClientConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Ok(Self::try_parse()?)
    }

    /// The configured bearer token, if any.
    pub fn bearer_token(&self) -> Option<BearerToken> {
        self.token.as_deref().and_then(BearerToken::new)
    }

    /// Authenticated when a token is configured.
    pub fn session(&self) -> Session {
        match self.bearer_token() {
            Some(_) => Session::Authenticated,
            None => Session::Guest,
        }
    }

    /// HTTP request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Coordinator options.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown currencies.
    pub fn sync_options(&self) -> Result<SyncOptions, ConfigError> {
        Ok(SyncOptions {
            currency: currency(&self.currency)?,
            failure_policy: self.failure_policy,
            merge_policy: self.merge_policy,
            debounce: Duration::from_millis(self.debounce_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parses_policies_and_subcommands() -> TestResult {
        let config = ClientConfig::try_parse_from([
            "medcart",
            "--currency",
            "USD",
            "--failure-policy",
            "keep-optimistic",
            "--merge-policy",
            "union-by-key",
            "update",
            "--product",
            "p1",
            "--pharmacy",
            "ph1",
            "--quantity",
            "-1",
        ])?;

        let options = config.sync_options()?;

        assert_eq!(options.currency.iso_alpha_code, "USD");
        assert_eq!(options.failure_policy, FailurePolicy::KeepOptimistic);
        assert_eq!(options.merge_policy, MergePolicy::UnionByKey);
        assert_eq!(
            config.command,
            Command::Update {
                product: "p1".to_string(),
                pharmacy: "ph1".to_string(),
                quantity: -1,
            }
        );

        Ok(())
    }

    #[test]
    fn blank_tokens_mean_a_guest_session() -> TestResult {
        let config = ClientConfig::try_parse_from(["medcart", "--token", " ", "show"])?;

        assert_eq!(config.session(), Session::Guest);

        let config = ClientConfig::try_parse_from(["medcart", "--token", "abc", "show"])?;

        assert_eq!(config.session(), Session::Authenticated);

        Ok(())
    }

    #[test]
    fn unknown_policies_are_rejected() {
        assert!(
            ClientConfig::try_parse_from(["medcart", "--failure-policy", "retry", "show"]).is_err()
        );
    }
}
