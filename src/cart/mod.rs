//! Cart Aggregate
//!
//! The cart is an owned state object mutated only through [`Cart::dispatch`]. Every transition
//! runs to completion synchronously, is total (malformed input becomes a logged no-op, never a
//! panic or an error), and ends by recomputing totals from the full item list.

use rusty_money::iso::Currency;
use tracing::{debug, warn};

use crate::{
    items::{
        DEFAULT_QUANTITY_CAP, LineItem, LineItemKey,
        factory::{ItemFactoryError, create_line_item, resolve_key},
    },
    money::whole_units,
    prescriptions::{PrescriptionGroups, is_tagged_with, tag_items},
    pricing::{CartTotals, DEFAULT_DELIVERY_FEE, compute_totals},
    products::{Offer, Product},
    promotions::Promotion,
};

mod compensation;
mod generations;

pub use compensation::Compensation;
pub use generations::{Generations, Ticket};

/// Fresh vendor pricing for one line item, applied by [`CartCommand::RefreshPrices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceUpdate {
    /// Line item to refresh
    pub key: LineItemKey,

    /// Current unit price in minor units
    pub price: i64,

    /// Current pre-discount price in minor units
    pub original_price: Option<i64>,

    /// Current vendor delivery fee in minor units
    pub delivery_fee: i64,

    /// Current vendor stock; `None` when unknown
    pub available_quantity: Option<u32>,
}

impl PriceUpdate {
    /// Build an update for `product_id` from a live catalog offer.
    pub fn from_offer(product_id: impl Into<String>, offer: &Offer) -> Self {
        Self {
            key: LineItemKey::new(product_id, offer.pharmacy_id.as_str()),
            price: offer.price,
            original_price: offer.original_price,
            delivery_fee: offer.delivery_fee,
            available_quantity: offer.available_quantity,
        }
    }
}

/// Messages the cart understands.
#[derive(Debug, Clone, PartialEq)]
pub enum CartCommand {
    /// Add `quantity` units of `product` from `offer` (or the product's default offer).
    AddItem {
        /// Catalog product
        product: Product,
        /// Chosen vendor offer
        offer: Option<Offer>,
        /// Units to add
        quantity: u32,
    },

    /// Remove a line; absent keys are a no-op.
    RemoveItem(LineItemKey),

    /// Set a line's quantity; zero or less removes it.
    UpdateQuantity {
        /// Line to update
        key: LineItemKey,
        /// New quantity
        quantity: i64,
    },

    /// Empty the cart and drop the promotion.
    ClearCart,

    /// Make `Promotion` the active promotion.
    ApplyPromotion(Promotion),

    /// Drop the active promotion.
    RemovePromotion,

    /// Replace every item tagged with `prescription_id` by `items`.
    AddPrescriptionItems {
        /// Items built from the approved prescription
        items: Vec<LineItem>,
        /// Prescription tag
        prescription_id: String,
    },

    /// Remove every item tagged with the prescription id.
    RemovePrescriptionItems(String),

    /// Replace the items with a server snapshot, keeping the promotion.
    LoadCart(Vec<LineItem>),

    /// Re-snapshot prices, fees and caps for matching lines.
    RefreshPrices(Vec<PriceUpdate>),

    /// Undo an optimistic transition.
    Restore(Compensation),

    /// Set the transient loading flag.
    SetLoading(bool),

    /// Set or clear the transient error message.
    SetError(Option<String>),
}

/// Outcome of a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The cart changed.
    Applied,

    /// The command was valid but changed nothing.
    Unchanged,

    /// The command carried malformed input and was ignored.
    Ignored(ItemFactoryError),
}

impl Transition {
    /// Whether the cart changed.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// The cart aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    currency: &'static Currency,
    items: Vec<LineItem>,
    promotion: Option<Promotion>,
    totals: CartTotals,
    loading: bool,
    error: Option<String>,
}

impl Cart {
    /// Create an empty cart priced in `currency`.
    pub fn new(currency: &'static Currency) -> Self {
        Self {
            currency,
            items: Vec::new(),
            promotion: None,
            totals: CartTotals::zero(currency),
            loading: false,
            error: None,
        }
    }

    /// Cart currency.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Line items in insertion order.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Look up a line item by key.
    pub fn item(&self, key: &LineItemKey) -> Option<&LineItem> {
        self.items.iter().find(|item| item.key() == key)
    }

    /// Active promotion, if any.
    pub fn promotion(&self) -> Option<&Promotion> {
        self.promotion.as_ref()
    }

    /// Derived totals.
    pub fn totals(&self) -> &CartTotals {
        &self.totals
    }

    /// Whether a network operation is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Last recorded error.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the cart holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items grouped by prescription tag.
    pub fn prescription_groups(&self) -> PrescriptionGroups {
        PrescriptionGroups::from_items(&self.items)
    }

    /// Delivery fee used for products that have no vendor offer.
    pub fn default_delivery_fee(&self) -> i64 {
        whole_units(DEFAULT_DELIVERY_FEE, self.currency)
    }

    /// Keys a command would touch, as seen from the current state.
    pub fn affected_keys(&self, command: &CartCommand) -> Vec<LineItemKey> {
        match command {
            CartCommand::AddItem { product, offer, .. } => {
                resolve_key(product, offer.as_ref(), self.default_delivery_fee())
                    .map(|key| vec![key])
                    .unwrap_or_default()
            }
            CartCommand::RemoveItem(key) | CartCommand::UpdateQuantity { key, .. } => {
                vec![key.clone()]
            }
            CartCommand::ClearCart => self.keys().cloned().collect(),
            CartCommand::AddPrescriptionItems {
                items,
                prescription_id,
            } => self
                .tagged_keys(prescription_id)
                .chain(items.iter().map(LineItem::key))
                .cloned()
                .collect(),
            CartCommand::RemovePrescriptionItems(prescription_id) => {
                self.tagged_keys(prescription_id).cloned().collect()
            }
            CartCommand::LoadCart(items) => self
                .keys()
                .chain(items.iter().map(LineItem::key))
                .cloned()
                .collect(),
            CartCommand::RefreshPrices(updates) => {
                updates.iter().map(|update| update.key.clone()).collect()
            }
            CartCommand::Restore(compensation) => compensation.keys().cloned().collect(),
            CartCommand::ApplyPromotion(_)
            | CartCommand::RemovePromotion
            | CartCommand::SetLoading(_)
            | CartCommand::SetError(_) => Vec::new(),
        }
    }

    /// Record the inverse of `command` against the current state.
    pub fn compensation_for(&self, command: &CartCommand) -> Compensation {
        let keys = self.affected_keys(command);

        let promotion = match command {
            CartCommand::ClearCart
            | CartCommand::ApplyPromotion(_)
            | CartCommand::RemovePromotion => Some(self.promotion.as_ref()),
            _ => None,
        };

        Compensation::capture(&self.items, &keys, promotion)
    }

    /// Apply a command and recompute totals.
    pub fn dispatch(&mut self, command: CartCommand) -> Transition {
        let transition = match command {
            CartCommand::AddItem {
                product,
                offer,
                quantity,
            } => self.add_item(&product, offer.as_ref(), quantity),
            CartCommand::RemoveItem(key) => self.remove_item(&key),
            CartCommand::UpdateQuantity { key, quantity } => self.update_quantity(&key, quantity),
            CartCommand::ClearCart => self.clear(),
            CartCommand::ApplyPromotion(promotion) => {
                self.promotion = Some(promotion);
                Transition::Applied
            }
            CartCommand::RemovePromotion => match self.promotion.take() {
                Some(_) => Transition::Applied,
                None => Transition::Unchanged,
            },
            CartCommand::AddPrescriptionItems {
                items,
                prescription_id,
            } => self.add_prescription_items(items, &prescription_id),
            CartCommand::RemovePrescriptionItems(prescription_id) => {
                self.remove_prescription_items(&prescription_id)
            }
            CartCommand::LoadCart(items) => self.load(items),
            CartCommand::RefreshPrices(updates) => self.refresh_prices(&updates),
            CartCommand::Restore(compensation) => {
                compensation.restore(&mut self.items, &mut self.promotion);
                Transition::Applied
            }
            CartCommand::SetLoading(loading) => {
                self.loading = loading;
                Transition::Applied
            }
            CartCommand::SetError(error) => {
                self.error = error;
                Transition::Applied
            }
        };

        self.recompute();

        transition
    }

    fn keys(&self) -> impl Iterator<Item = &LineItemKey> {
        self.items.iter().map(LineItem::key)
    }

    fn tagged_keys<'a>(&'a self, prescription_id: &'a str) -> impl Iterator<Item = &'a LineItemKey> {
        self.items
            .iter()
            .filter(move |item| is_tagged_with(item, prescription_id))
            .map(LineItem::key)
    }

    fn position(&self, key: &LineItemKey) -> Option<usize> {
        self.items.iter().position(|item| item.key() == key)
    }

    fn recompute(&mut self) {
        self.totals = compute_totals(&self.items, self.promotion.as_ref(), self.currency);
    }

    fn add_item(&mut self, product: &Product, offer: Option<&Offer>, quantity: u32) -> Transition {
        let item = match create_line_item(product, offer, quantity, self.default_delivery_fee()) {
            Ok(item) => item,
            Err(error) => {
                warn!(%error, product_id = ?product.id, "ignoring add item");

                return Transition::Ignored(error);
            }
        };

        self.merge_item(item, None)
    }

    /// Merge `item` into an existing line with the same key, or append it.
    ///
    /// With a `prescription_id`, the units actually added are attributed to that prescription and
    /// the customer's own units on the line stay theirs.
    fn merge_item(&mut self, item: LineItem, prescription_id: Option<&str>) -> Transition {
        let Some(existing) = self.items.iter_mut().find(|line| line.key() == item.key()) else {
            self.items.push(item);
            return Transition::Applied;
        };

        let before = existing.clone();
        let requested = u64::from(existing.quantity()) + u64::from(item.quantity());

        existing.max_quantity = item.max_quantity.max(1);
        existing.set_quantity(existing.clamp_quantity(requested));

        if let Some(prescription_id) = prescription_id {
            let added = existing.quantity().saturating_sub(before.quantity());

            if let Some(previous) = before.prescription_id().filter(|id| *id != prescription_id) {
                debug!(
                    key = %existing.key(),
                    previous,
                    prescription_id,
                    "prescription units move to the newer prescription"
                );
            }

            let units = existing.prescription_quantity() + added;

            existing.tag_prescription(prescription_id, units);
        }

        if *existing == before {
            Transition::Unchanged
        } else {
            Transition::Applied
        }
    }

    /// Take the prescription's units out of every line tagged with it.
    fn strip_prescription(&mut self, prescription_id: &str) -> bool {
        let mut changed = false;

        self.items = std::mem::take(&mut self.items)
            .into_iter()
            .filter_map(|item| {
                if is_tagged_with(&item, prescription_id) {
                    changed = true;
                    item.without_prescription()
                } else {
                    Some(item)
                }
            })
            .collect();

        changed
    }

    fn remove_item(&mut self, key: &LineItemKey) -> Transition {
        match self.position(key) {
            Some(index) => {
                self.items.remove(index);
                Transition::Applied
            }
            None => {
                debug!(%key, "remove of absent line item");
                Transition::Unchanged
            }
        }
    }

    fn update_quantity(&mut self, key: &LineItemKey, quantity: i64) -> Transition {
        let Ok(requested) = u64::try_from(quantity) else {
            return self.remove_item(key);
        };

        if requested == 0 {
            return self.remove_item(key);
        }

        let Some(item) = self.items.iter_mut().find(|item| item.key() == key) else {
            debug!(%key, "quantity update for absent line item");
            return Transition::Unchanged;
        };

        let quantity = item.clamp_quantity(requested);

        if quantity == item.quantity() {
            return Transition::Unchanged;
        }

        item.set_quantity(quantity);

        Transition::Applied
    }

    fn clear(&mut self) -> Transition {
        if self.items.is_empty() && self.promotion.is_none() {
            return Transition::Unchanged;
        }

        self.items.clear();
        self.promotion = None;

        Transition::Applied
    }

    fn add_prescription_items(&mut self, items: Vec<LineItem>, prescription_id: &str) -> Transition {
        self.strip_prescription(prescription_id);

        for item in tag_items(items, prescription_id) {
            if item.quantity() == 0 {
                warn!(key = %item.key(), prescription_id, "ignoring zero-quantity prescription item");
                continue;
            }

            self.merge_item(item, Some(prescription_id));
        }

        Transition::Applied
    }

    fn remove_prescription_items(&mut self, prescription_id: &str) -> Transition {
        if self.strip_prescription(prescription_id) {
            Transition::Applied
        } else {
            Transition::Unchanged
        }
    }

    /// Replace the items with a server snapshot.
    ///
    /// The promotion survives, and so do prescription tags for keys still present: both are
    /// client-side concepts the server never echoes back. Duplicate keys are merged and
    /// zero-quantity lines dropped so the snapshot cannot break the cart's invariants.
    fn load(&mut self, snapshot: Vec<LineItem>) -> Transition {
        let previous = std::mem::take(&mut self.items);

        for mut item in snapshot {
            if item.quantity() == 0 {
                warn!(key = %item.key(), "dropping zero-quantity line from snapshot");
                continue;
            }

            let prior_tag = previous
                .iter()
                .find(|prior| prior.key() == item.key())
                .and_then(|prior| Some((prior.prescription_id()?, prior.prescription_quantity())));

            if let Some((prescription_id, units)) =
                prior_tag.filter(|_| item.prescription_id.is_none())
            {
                item.tag_prescription(prescription_id, units);
            }

            self.merge_item(item, None);
        }

        Transition::Applied
    }

    fn refresh_prices(&mut self, updates: &[PriceUpdate]) -> Transition {
        let mut transition = Transition::Unchanged;

        for update in updates {
            let Some(item) = self.items.iter_mut().find(|item| item.key() == &update.key) else {
                continue;
            };

            let before = item.clone();

            item.price = update.price;
            item.original_price = update.original_price;
            item.delivery_fee = update.delivery_fee;
            item.max_quantity = update
                .available_quantity
                .unwrap_or(DEFAULT_QUANTITY_CAP)
                .max(1);
            item.set_quantity(item.quantity());

            if *item != before {
                transition = Transition::Applied;
            }
        }

        transition
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rusty_money::iso::EGP;

    use crate::products::Offer;

    use super::*;

    fn offer(pharmacy_id: &str, price: i64, available_quantity: Option<u32>) -> Offer {
        Offer {
            pharmacy_id: pharmacy_id.to_string(),
            pharmacy_name: format!("Pharmacy {pharmacy_id}"),
            price,
            original_price: None,
            available_quantity,
            delivery_fee: 1_500,
            estimated_delivery: None,
            in_stock: true,
        }
    }

    fn product(id: &str, offers: Vec<Offer>) -> Product {
        Product {
            id: Some(id.to_string()),
            name: format!("Product {id}"),
            offers,
            ..Product::default()
        }
    }

    fn add(cart: &mut Cart, product: &Product, quantity: u32) -> Transition {
        cart.dispatch(CartCommand::AddItem {
            product: product.clone(),
            offer: None,
            quantity,
        })
    }

    #[test]
    fn adding_same_key_twice_increments_quantity() {
        let mut cart = Cart::new(EGP);
        let paracetamol = product("paracetamol", vec![offer("a", 1_000, Some(10))]);

        add(&mut cart, &paracetamol, 1);
        add(&mut cart, &paracetamol, 1);

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.totals().total_items, 2);
        assert_eq!(cart.totals().subtotal.to_minor_units(), 2_000);
    }

    #[test]
    fn adding_is_capped_by_offer_stock() {
        let mut cart = Cart::new(EGP);
        let paracetamol = product("paracetamol", vec![offer("a", 1_000, Some(3))]);

        add(&mut cart, &paracetamol, 2);
        add(&mut cart, &paracetamol, 2);

        assert_eq!(cart.totals().total_items, 3);
        assert_eq!(add(&mut cart, &paracetamol, 1), Transition::Unchanged);
    }

    #[test]
    fn same_product_from_two_vendors_is_two_lines() {
        let mut cart = Cart::new(EGP);
        let vitamin = product(
            "vitamin-d",
            vec![offer("a", 1_000, None), offer("b", 900, None)],
        );

        cart.dispatch(CartCommand::AddItem {
            product: vitamin.clone(),
            offer: vitamin.offer("a").cloned(),
            quantity: 1,
        });
        cart.dispatch(CartCommand::AddItem {
            product: vitamin.clone(),
            offer: vitamin.offer("b").cloned(),
            quantity: 1,
        });

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.totals().delivery_fee.to_minor_units(), 3_000);
    }

    #[test]
    fn product_without_identity_is_ignored() {
        let mut cart = Cart::new(EGP);
        let mut nameless = product("x", vec![offer("a", 1_000, None)]);
        nameless.id = None;

        let transition = add(&mut cart, &nameless, 1);

        assert_eq!(
            transition,
            Transition::Ignored(ItemFactoryError::InvalidProduct)
        );
        assert!(cart.is_empty());
    }

    #[test]
    fn non_positive_quantity_removes_item() {
        for quantity in [0, -3] {
            let mut cart = Cart::new(EGP);
            let paracetamol = product("paracetamol", vec![offer("a", 1_000, None)]);

            add(&mut cart, &paracetamol, 1);

            let transition = cart.dispatch(CartCommand::UpdateQuantity {
                key: LineItemKey::new("paracetamol", "a"),
                quantity,
            });

            assert_eq!(transition, Transition::Applied);
            assert_eq!(cart.totals().total_items, 0);
            assert!(cart.is_empty());
        }
    }

    #[test]
    fn update_quantity_is_clamped() {
        let mut cart = Cart::new(EGP);
        let paracetamol = product("paracetamol", vec![offer("a", 1_000, Some(5))]);

        add(&mut cart, &paracetamol, 1);
        cart.dispatch(CartCommand::UpdateQuantity {
            key: LineItemKey::new("paracetamol", "a"),
            quantity: 40,
        });

        assert_eq!(cart.totals().total_items, 5);
    }

    #[test]
    fn removing_absent_key_is_a_no_op() {
        let mut cart = Cart::new(EGP);

        let transition = cart.dispatch(CartCommand::RemoveItem(LineItemKey::new("x", "y")));

        assert_eq!(transition, Transition::Unchanged);
    }

    #[test]
    fn clear_keeps_transient_flags() {
        let mut cart = Cart::new(EGP);
        let paracetamol = product("paracetamol", vec![offer("a", 1_000, None)]);

        add(&mut cart, &paracetamol, 1);
        cart.dispatch(CartCommand::ApplyPromotion(Promotion::new(
            "SAVE",
            Decimal::from(10),
        )));
        cart.dispatch(CartCommand::SetError(Some("offline".to_string())));
        cart.dispatch(CartCommand::ClearCart);

        assert!(cart.is_empty());
        assert!(cart.promotion().is_none());
        assert_eq!(cart.error(), Some("offline"));
        assert_eq!(cart.totals(), &CartTotals::zero(EGP));
    }

    #[test]
    fn promotion_stays_applied_but_inert_below_minimum() {
        let mut cart = Cart::new(EGP);
        let cream = product("cream", vec![offer("a", 5_000, None)]);
        let promotion = Promotion::new("HEALTH20", Decimal::from(20))
            .with_min_order_amount(10_000)
            .with_max_discount(Some(5_000));

        add(&mut cart, &cream, 1);
        cart.dispatch(CartCommand::ApplyPromotion(promotion));

        assert!(cart.promotion().is_some());
        assert_eq!(cart.totals().discount.to_minor_units(), 0);

        add(&mut cart, &cream, 1);

        assert_eq!(cart.totals().discount.to_minor_units(), 2_000);
    }

    #[test]
    fn prescription_items_replace_by_tag() {
        let mut cart = Cart::new(EGP);
        let line = |id: &str| LineItem::new(LineItemKey::new(id, "ph"), id, 1_000, 1);

        cart.dispatch(CartCommand::AddPrescriptionItems {
            items: vec![line("a"), line("b")],
            prescription_id: "RX-1".to_string(),
        });
        cart.dispatch(CartCommand::AddPrescriptionItems {
            items: vec![line("c")],
            prescription_id: "RX-1".to_string(),
        });

        let groups = cart.prescription_groups();

        assert_eq!(groups.keys("RX-1"), &[LineItemKey::new("c", "ph")]);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.totals().subtotal.to_minor_units(), 1_000);
    }

    fn amoxicillin_line(quantity: u32) -> LineItem {
        LineItem::new(
            LineItemKey::new("amoxicillin", "ph"),
            "Amoxicillin",
            1_000,
            quantity,
        )
    }

    fn add_prescription(cart: &mut Cart, items: Vec<LineItem>, prescription_id: &str) {
        cart.dispatch(CartCommand::AddPrescriptionItems {
            items,
            prescription_id: prescription_id.to_string(),
        });
    }

    #[test]
    fn prescription_items_merge_into_existing_lines() {
        let mut cart = Cart::new(EGP);
        let amoxicillin = product("amoxicillin", vec![offer("ph", 1_000, None)]);

        add(&mut cart, &amoxicillin, 1);
        add_prescription(&mut cart, vec![amoxicillin_line(2)], "RX-9");

        let item = cart.items().first();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.totals().total_items, 3);
        assert_eq!(item.and_then(LineItem::prescription_id), Some("RX-9"));
        assert_eq!(item.map(LineItem::prescription_quantity), Some(2));
    }

    #[test]
    fn replacing_a_prescription_keeps_customer_units() {
        let mut cart = Cart::new(EGP);
        let key = LineItemKey::new("amoxicillin", "ph");

        cart.dispatch(CartCommand::LoadCart(vec![amoxicillin_line(2)]));

        add_prescription(&mut cart, vec![amoxicillin_line(1)], "RX-1");
        add_prescription(&mut cart, vec![amoxicillin_line(1)], "RX-1");

        assert_eq!(cart.totals().total_items, 3);
        assert_eq!(cart.item(&key).map(LineItem::prescription_quantity), Some(1));

        let other = LineItem::new(LineItemKey::new("insulin", "ph"), "Insulin", 5_000, 1);

        add_prescription(&mut cart, vec![other], "RX-1");

        assert_eq!(cart.item(&key).map(LineItem::quantity), Some(2));
        assert_eq!(cart.item(&key).and_then(LineItem::prescription_id), None);
        assert_eq!(
            cart.prescription_groups().keys("RX-1"),
            &[LineItemKey::new("insulin", "ph")]
        );
    }

    #[test]
    fn removing_a_prescription_keeps_customer_units() {
        let mut cart = Cart::new(EGP);
        let key = LineItemKey::new("amoxicillin", "ph");

        cart.dispatch(CartCommand::LoadCart(vec![amoxicillin_line(2)]));
        add_prescription(&mut cart, vec![amoxicillin_line(1)], "RX-1");

        assert_eq!(cart.totals().total_items, 3);

        let transition = cart.dispatch(CartCommand::RemovePrescriptionItems("RX-1".to_string()));

        assert_eq!(transition, Transition::Applied);
        assert_eq!(cart.totals().total_items, 2);
        assert_eq!(cart.item(&key).and_then(LineItem::prescription_id), None);
        assert!(cart.prescription_groups().keys("RX-1").is_empty());
    }

    #[test]
    fn clamped_prescription_units_are_not_taken_from_the_customer() {
        let mut cart = Cart::new(EGP);
        let key = LineItemKey::new("amoxicillin", "ph");

        cart.dispatch(CartCommand::LoadCart(vec![amoxicillin_line(2).with_max_quantity(2)]));
        add_prescription(
            &mut cart,
            vec![amoxicillin_line(1).with_max_quantity(2)],
            "RX-1",
        );

        assert_eq!(cart.item(&key).map(LineItem::quantity), Some(2));
        assert_eq!(cart.item(&key).map(LineItem::prescription_quantity), Some(0));

        cart.dispatch(CartCommand::RemovePrescriptionItems("RX-1".to_string()));

        assert_eq!(cart.item(&key).map(LineItem::quantity), Some(2));
    }

    #[test]
    fn reloads_keep_the_prescription_share() {
        let mut cart = Cart::new(EGP);
        let key = LineItemKey::new("amoxicillin", "ph");

        cart.dispatch(CartCommand::LoadCart(vec![amoxicillin_line(2)]));
        add_prescription(&mut cart, vec![amoxicillin_line(1)], "RX-1");
        cart.dispatch(CartCommand::LoadCart(vec![amoxicillin_line(3)]));
        cart.dispatch(CartCommand::RemovePrescriptionItems("RX-1".to_string()));

        assert_eq!(cart.item(&key).map(LineItem::quantity), Some(2));
    }

    #[test]
    fn removing_prescription_items_leaves_others() {
        let mut cart = Cart::new(EGP);
        let paracetamol = product("paracetamol", vec![offer("a", 1_000, None)]);

        add(&mut cart, &paracetamol, 1);
        cart.dispatch(CartCommand::AddPrescriptionItems {
            items: vec![LineItem::new(LineItemKey::new("rx", "a"), "Rx", 2_000, 1)],
            prescription_id: "RX-1".to_string(),
        });
        cart.dispatch(CartCommand::RemovePrescriptionItems("RX-1".to_string()));

        assert_eq!(cart.items().len(), 1);
        assert!(cart.prescription_groups().is_empty());
    }

    #[test]
    fn load_cart_preserves_promotion_and_tags() {
        let mut cart = Cart::new(EGP);
        let key = LineItemKey::new("rx", "a");
        let promotion = Promotion::new("SAVE10", Decimal::from(10));

        cart.dispatch(CartCommand::AddPrescriptionItems {
            items: vec![LineItem::new(key.clone(), "Rx", 2_000, 1)],
            prescription_id: "RX-1".to_string(),
        });
        cart.dispatch(CartCommand::ApplyPromotion(promotion.clone()));
        cart.dispatch(CartCommand::LoadCart(vec![
            LineItem::new(key.clone(), "Rx", 2_100, 2),
            LineItem::new(LineItemKey::new("new", "b"), "New", 500, 1),
        ]));

        assert_eq!(cart.promotion(), Some(&promotion));
        assert_eq!(cart.item(&key).and_then(LineItem::prescription_id), Some("RX-1"));
        assert_eq!(cart.totals().subtotal.to_minor_units(), 4_700);
        assert_eq!(cart.totals().discount.to_minor_units(), 470);
    }

    #[test]
    fn load_cart_merges_duplicate_keys() {
        let mut cart = Cart::new(EGP);
        let key = LineItemKey::new("p", "a");

        cart.dispatch(CartCommand::LoadCart(vec![
            LineItem::new(key.clone(), "P", 100, 1),
            LineItem::new(key.clone(), "P", 100, 2),
        ]));

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.totals().total_items, 3);
    }

    #[test]
    fn refresh_prices_updates_snapshot_fields() {
        let mut cart = Cart::new(EGP);
        let paracetamol = product("paracetamol", vec![offer("a", 1_000, None)]);

        add(&mut cart, &paracetamol, 6);

        let mut live = offer("a", 1_200, Some(4));
        live.original_price = Some(1_500);

        let transition = cart.dispatch(CartCommand::RefreshPrices(vec![PriceUpdate::from_offer(
            "paracetamol",
            &live,
        )]));

        let item = cart.item(&LineItemKey::new("paracetamol", "a"));

        assert_eq!(transition, Transition::Applied);
        assert_eq!(item.map(|i| i.price), Some(1_200));
        assert_eq!(item.map(LineItem::quantity), Some(4));
        assert_eq!(cart.totals().subtotal.to_minor_units(), 4_800);
        assert_eq!(cart.totals().savings.to_minor_units(), 1_200);
    }

    #[test]
    fn compensation_undoes_add() {
        let mut cart = Cart::new(EGP);
        let paracetamol = product("paracetamol", vec![offer("a", 1_000, None)]);

        add(&mut cart, &paracetamol, 1);

        let before = cart.clone();
        let command = CartCommand::AddItem {
            product: paracetamol,
            offer: None,
            quantity: 2,
        };
        let compensation = cart.compensation_for(&command);

        cart.dispatch(command);
        cart.dispatch(CartCommand::Restore(compensation));

        assert_eq!(cart, before);
    }

    #[test]
    fn compensation_undoes_clear() {
        let mut cart = Cart::new(EGP);

        add(&mut cart, &product("a", vec![offer("x", 1_000, None)]), 1);
        add(&mut cart, &product("b", vec![offer("y", 2_000, None)]), 2);
        cart.dispatch(CartCommand::ApplyPromotion(Promotion::new(
            "SAVE",
            Decimal::from(5),
        )));

        let before = cart.clone();
        let compensation = cart.compensation_for(&CartCommand::ClearCart);

        cart.dispatch(CartCommand::ClearCart);
        cart.dispatch(CartCommand::Restore(compensation));

        assert_eq!(cart, before);
    }
}
