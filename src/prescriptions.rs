//! Prescription Item Grouping
//!
//! Items added from an approved prescription carry that prescription's id as a tag. Approval
//! itself happens elsewhere; the cart only keeps the linkage so orders can forward it.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::items::{LineItem, LineItemKey};

/// Keys tagged with one prescription.
pub type PrescriptionKeys = SmallVec<[LineItemKey; 4]>;

/// Tag items as originating from `prescription_id`.
pub fn tag_items(items: Vec<LineItem>, prescription_id: &str) -> Vec<LineItem> {
    items
        .into_iter()
        .map(|mut item| {
            let quantity = item.quantity();

            item.tag_prescription(prescription_id, quantity);
            item
        })
        .collect()
}

/// Whether the item is tagged with `prescription_id`.
pub fn is_tagged_with(item: &LineItem, prescription_id: &str) -> bool {
    item.prescription_id() == Some(prescription_id)
}

/// Line items grouped by prescription tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrescriptionGroups {
    groups: BTreeMap<String, PrescriptionKeys>,
    untagged_required: Vec<LineItemKey>,
}

impl PrescriptionGroups {
    /// Group the given items by prescription tag.
    pub fn from_items(items: &[LineItem]) -> Self {
        let mut groups: BTreeMap<String, PrescriptionKeys> = BTreeMap::new();
        let mut untagged_required = Vec::new();

        for item in items {
            match item.prescription_id() {
                Some(id) => groups
                    .entry(id.to_string())
                    .or_default()
                    .push(item.key().clone()),
                None if item.requires_prescription => untagged_required.push(item.key().clone()),
                None => {}
            }
        }

        Self {
            groups,
            untagged_required,
        }
    }

    /// Keys tagged with the given prescription.
    pub fn keys(&self, prescription_id: &str) -> &[LineItemKey] {
        self.groups
            .get(prescription_id)
            .map(SmallVec::as_slice)
            .unwrap_or_default()
    }

    /// Prescription ids present in the cart, in sorted order.
    pub fn prescription_ids(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Items that need a prescription but were not added from one.
    pub fn untagged_required(&self) -> &[LineItemKey] {
        &self.untagged_required
    }

    /// Whether no item is tagged with a prescription.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
