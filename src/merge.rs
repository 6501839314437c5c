//! Login Merge
//!
//! When a guest signs in, the guest cart and the server cart have to become one. The policy is
//! explicit and chosen by the caller.

use std::{fmt, str::FromStr};

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::items::LineItem;

/// How a guest cart is combined with the server cart at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// The server cart replaces the guest cart.
    #[default]
    ServerWins,

    /// Keep every server line, add guest-only lines, take the server quantity for shared keys.
    UnionByKey,
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ServerWins => "server-wins",
            Self::UnionByKey => "union-by-key",
        })
    }
}

/// Unknown merge policy name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown merge policy: {0} (expected server-wins or union-by-key)")]
pub struct ParseMergePolicyError(String);

impl FromStr for MergePolicy {
    type Err = ParseMergePolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "server-wins" => Ok(Self::ServerWins),
            "union-by-key" => Ok(Self::UnionByKey),
            other => Err(ParseMergePolicyError(other.to_string())),
        }
    }
}

/// Result of merging a guest cart into a server cart.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    /// Items the cart should hold after login
    pub items: Vec<LineItem>,

    /// Guest-only items the server does not know about yet
    pub to_push: Vec<LineItem>,
}

/// Merge `guest` items into `server` items under `policy`.
pub fn merge_carts(policy: MergePolicy, server: Vec<LineItem>, guest: &[LineItem]) -> MergeOutcome {
    match policy {
        MergePolicy::ServerWins => MergeOutcome {
            items: server,
            to_push: Vec::new(),
        },
        MergePolicy::UnionByKey => {
            let known: FxHashSet<_> = server.iter().map(|item| item.key().clone()).collect();

            let to_push: Vec<LineItem> = guest
                .iter()
                .filter(|item| !known.contains(item.key()))
                .cloned()
                .collect();

            let mut items = server;
            items.extend(to_push.iter().cloned());

            MergeOutcome { items, to_push }
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::items::LineItemKey;

    use super::*;

    fn item(product: &str, quantity: u32) -> LineItem {
        LineItem::new(LineItemKey::new(product, "ph"), product, 1_000, quantity)
    }

    #[test]
    fn server_wins_discards_guest_items() {
        let outcome = merge_carts(
            MergePolicy::ServerWins,
            vec![item("a", 1)],
            &[item("b", 2)],
        );

        assert_eq!(outcome.items, vec![item("a", 1)]);
        assert!(outcome.to_push.is_empty());
    }

    #[test]
    fn union_keeps_server_quantity_for_shared_keys() {
        let outcome = merge_carts(
            MergePolicy::UnionByKey,
            vec![item("a", 1)],
            &[item("a", 5), item("b", 2)],
        );

        assert_eq!(outcome.items, vec![item("a", 1), item("b", 2)]);
        assert_eq!(outcome.to_push, vec![item("b", 2)]);
    }

    #[test]
    fn policies_parse_from_kebab_case() -> TestResult {
        assert_eq!("server-wins".parse::<MergePolicy>()?, MergePolicy::ServerWins);
        assert_eq!("union-by-key".parse::<MergePolicy>()?, MergePolicy::UnionByKey);
        assert!("guest-wins".parse::<MergePolicy>().is_err());
        assert_eq!(MergePolicy::UnionByKey.to_string(), "union-by-key");

        Ok(())
    }
}
