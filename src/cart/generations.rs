//! Reconciliation generations
//!
//! Every locally dispatched mutation stamps the keys it touched with a fresh, monotonically
//! increasing generation. A server snapshot fetched on behalf of a mutation is only applied if
//! no later mutation touched the same keys in the meantime; otherwise a slower, older response
//! would overwrite newer local intent.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::items::LineItemKey;

/// Generation stamp handed out when a mutation is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    keys: SmallVec<[LineItemKey; 2]>,
}

impl Ticket {
    /// The generation this ticket was issued at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Keys stamped by this ticket.
    pub fn keys(&self) -> &[LineItemKey] {
        &self.keys
    }
}

/// Latest dispatched generation per line item key.
#[derive(Debug, Clone, Default)]
pub struct Generations {
    next: u64,
    latest: FxHashMap<LineItemKey, u64>,
}

impl Generations {
    /// Stamp `keys` with a new generation.
    pub fn dispatch<'a>(&mut self, keys: impl IntoIterator<Item = &'a LineItemKey>) -> Ticket {
        self.next += 1;

        let generation = self.next;

        let keys: SmallVec<[LineItemKey; 2]> = keys.into_iter().cloned().collect();

        for key in &keys {
            self.latest.insert(key.clone(), generation);
        }

        Ticket { generation, keys }
    }

    /// Latest generation dispatched for `key`.
    pub fn latest(&self, key: &LineItemKey) -> Option<u64> {
        self.latest.get(key).copied()
    }

    /// Whether no later mutation touched any of the ticket's keys.
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.keys.iter().all(|key| {
            self.latest(key)
                .is_none_or(|latest| latest <= ticket.generation)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generations_increase_monotonically() {
        let mut generations = Generations::default();
        let key = LineItemKey::new("p", "a");

        let first = generations.dispatch([&key]);
        let second = generations.dispatch([&key]);

        assert!(second.generation() > first.generation());
        assert_eq!(generations.latest(&key), Some(second.generation()));
    }

    #[test]
    fn older_ticket_for_same_key_is_stale() {
        let mut generations = Generations::default();
        let key = LineItemKey::new("p", "a");

        let first = generations.dispatch([&key]);
        let second = generations.dispatch([&key]);

        assert!(!generations.is_current(&first));
        assert!(generations.is_current(&second));
    }

    #[test]
    fn mutations_on_other_keys_do_not_stale_a_ticket() {
        let mut generations = Generations::default();
        let key = LineItemKey::new("p", "a");
        let other = LineItemKey::new("q", "a");

        let ticket = generations.dispatch([&key]);
        generations.dispatch([&other]);

        assert!(generations.is_current(&ticket));
        assert_eq!(ticket.keys(), &[key]);
    }
}
