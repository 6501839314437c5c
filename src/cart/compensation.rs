//! Compensation
//!
//! The inverse of an optimistic transition: the prior state of every line it touched, plus the
//! prior promotion if it touched that. Restoring only the touched keys leaves unrelated lines
//! (and any mutation that landed on them since) alone.

use rustc_hash::FxHashSet;

use crate::{
    items::{LineItem, LineItemKey},
    promotions::Promotion,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct PriorLine {
    key: LineItemKey,
    prior: Option<(usize, LineItem)>,
}

/// Recorded inverse of one transition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compensation {
    lines: Vec<PriorLine>,
    promotion: Option<Option<Promotion>>,
}

impl Compensation {
    /// Capture the current state of `keys` (and the promotion, when `promotion` is `Some`).
    pub(crate) fn capture<'a>(
        items: &[LineItem],
        keys: impl IntoIterator<Item = &'a LineItemKey>,
        promotion: Option<Option<&Promotion>>,
    ) -> Self {
        let mut seen = FxHashSet::default();

        let lines = keys
            .into_iter()
            .filter(|key| seen.insert(*key))
            .map(|key| PriorLine {
                key: key.clone(),
                prior: items
                    .iter()
                    .enumerate()
                    .find(|(_, item)| item.key() == key)
                    .map(|(index, item)| (index, item.clone())),
            })
            .collect();

        Self {
            lines,
            promotion: promotion.map(<Option<&Promotion>>::cloned),
        }
    }

    /// Whether restoring this compensation would change nothing.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.promotion.is_none()
    }

    /// Keys this compensation restores.
    pub fn keys(&self) -> impl Iterator<Item = &LineItemKey> {
        self.lines.iter().map(|line| &line.key)
    }

    /// Prior line for each touched key; `None` where the key was absent.
    pub fn priors(&self) -> impl Iterator<Item = (&LineItemKey, Option<&LineItem>)> {
        self.lines
            .iter()
            .map(|line| (&line.key, line.prior.as_ref().map(|(_, item)| item)))
    }

    /// Restore the captured state onto `items` and `promotion`.
    pub(crate) fn restore(self, items: &mut Vec<LineItem>, promotion: &mut Option<Promotion>) {
        let touched: FxHashSet<&LineItemKey> = self.lines.iter().map(|line| &line.key).collect();

        items.retain(|item| !touched.contains(item.key()));

        let mut priors: Vec<(usize, LineItem)> =
            self.lines.into_iter().filter_map(|line| line.prior).collect();

        priors.sort_by_key(|(index, _)| *index);

        for (index, item) in priors {
            let index = index.min(items.len());
            items.insert(index, item);
        }

        if let Some(prior) = self.promotion {
            *promotion = prior;
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn item(product: &str, quantity: u32) -> LineItem {
        LineItem::new(LineItemKey::new(product, "ph"), product, 1_000, quantity)
    }

    #[test]
    fn restores_removed_lines_at_their_positions() {
        let original = vec![item("a", 1), item("b", 2), item("c", 3)];
        let keys = [LineItemKey::new("b", "ph")];
        let compensation = Compensation::capture(&original, &keys, None);

        let mut items = vec![item("a", 1), item("c", 3)];
        let mut promotion = None;

        compensation.restore(&mut items, &mut promotion);

        assert_eq!(items, original);
    }

    #[test]
    fn removes_lines_that_did_not_exist() {
        let original = vec![item("a", 1)];
        let keys = [LineItemKey::new("z", "ph")];
        let compensation = Compensation::capture(&original, &keys, None);

        let mut items = vec![item("a", 1), item("z", 4)];
        let mut promotion = None;

        compensation.restore(&mut items, &mut promotion);

        assert_eq!(items, original);
    }

    #[test]
    fn restores_cleared_cart_and_promotion() {
        let original = vec![item("a", 1), item("b", 2), item("c", 3)];
        let prior_promotion = Promotion::new("SAVE10", Decimal::from(10));
        let keys: Vec<LineItemKey> = original.iter().map(|i| i.key().clone()).collect();
        let compensation = Compensation::capture(&original, &keys, Some(Some(&prior_promotion)));

        let mut items = Vec::new();
        let mut promotion = None;

        compensation.restore(&mut items, &mut promotion);

        assert_eq!(items, original);
        assert_eq!(promotion, Some(prior_promotion));
    }

    #[test]
    fn leaves_untouched_lines_alone() {
        let original = vec![item("a", 1), item("b", 2)];
        let keys = [LineItemKey::new("a", "ph")];
        let compensation = Compensation::capture(&original, &keys, None);

        let mut items = vec![item("a", 5), item("b", 7)];
        let mut promotion = None;

        compensation.restore(&mut items, &mut promotion);

        assert_eq!(items, vec![item("a", 1), item("b", 7)]);
    }

    #[test]
    fn duplicate_keys_are_captured_once() {
        let original = vec![item("a", 1)];
        let key = LineItemKey::new("a", "ph");
        let compensation = Compensation::capture(&original, [&key, &key], None);

        assert_eq!(compensation.keys().count(), 1);
        assert!(!compensation.is_empty());
    }
}
