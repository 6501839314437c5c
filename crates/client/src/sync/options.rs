//! Coordinator options.

use std::{fmt, str::FromStr, time::Duration};

use medcart::merge::MergePolicy;
use rusty_money::iso::{self, Currency};
use thiserror::Error;

/// What to do with an optimistic change the remote cart did not accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Undo the local change.
    #[default]
    Rollback,

    /// Keep the local change and queue it for [`super::CartCoordinator::retry_pending`].
    KeepOptimistic,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rollback => "rollback",
            Self::KeepOptimistic => "keep-optimistic",
        })
    }
}

/// Unknown failure policy name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown failure policy: {0} (expected rollback or keep-optimistic)")]
pub struct ParseFailurePolicyError(String);

impl FromStr for FailurePolicy {
    type Err = ParseFailurePolicyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "rollback" => Ok(Self::Rollback),
            "keep-optimistic" => Ok(Self::KeepOptimistic),
            other => Err(ParseFailurePolicyError(other.to_string())),
        }
    }
}

/// Who owns the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Session {
    /// Signed out: the cart lives in guest storage and nothing is sent to the cart service.
    #[default]
    Guest,

    /// Signed in: every change is mirrored to the cart service.
    Authenticated,
}

/// Tuning for [`super::CartCoordinator`].
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Cart currency
    pub currency: &'static Currency,

    /// Remote failure handling
    pub failure_policy: FailurePolicy,

    /// Guest cart handling at sign-in
    pub merge_policy: MergePolicy,

    /// Quiet period before a guest cart is written
    pub debounce: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            currency: iso::EGP,
            failure_policy: FailurePolicy::default(),
            merge_policy: MergePolicy::default(),
            debounce: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_policy_round_trips_through_its_name() {
        for policy in [FailurePolicy::Rollback, FailurePolicy::KeepOptimistic] {
            assert_eq!(policy.to_string().parse(), Ok(policy));
        }

        assert!("retry".parse::<FailurePolicy>().is_err());
    }
}
