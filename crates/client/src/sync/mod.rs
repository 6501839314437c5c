//! Sync Coordinator
//!
//! Keeps the local cart and the remote cart service eventually consistent. Every mutation is
//! applied to the local cart first and published immediately; for authenticated sessions the
//! change is then mirrored to the cart service. A failed mirror is either undone through its
//! [`Compensation`] or queued for [`CartCoordinator::retry_pending`], depending on the
//! [`FailurePolicy`]. Guest sessions never talk to the cart service; their cart is written to
//! guest storage once it settles.
//!
//! The cart lock is never held across a network call, so mutations keep landing while earlier
//! ones are in flight. Reconciling snapshots are checked against per-key generations and dropped
//! when a later mutation touched the same lines.

use std::{fmt, sync::Arc};

use medcart::{
    cart::{Cart, CartCommand, Compensation, Generations, PriceUpdate, Ticket, Transition},
    items::{LineItem, LineItemKey},
    merge::merge_carts,
    orders::assemble_order,
    products::{Offer, Product},
    promotions::Promotion,
    snapshot::CartSnapshot,
};
use tokio::sync::{Mutex, watch};
use tracing::{Span, debug, error, info, warn};

use crate::{
    persistence::{CartPersistence, GuestWriter, PersistenceError, RemoteCartPersistence},
    remote::{OrderService, PromotionService, RemoteCart, RemoteError},
    wire::{
        cart::{AddItemRequest, RemoveItemRequest, ServerCart, UpdateItemRequest},
        orders::{CreateOrderRequest, PlacedOrder},
        promotions::ValidatePromoRequest,
    },
};

mod error;
mod options;


pub use error::{OrderError, PromotionError, SyncError};
pub use options::{FailurePolicy, ParseFailurePolicyError, Session, SyncOptions};

/// Collaborators the coordinator talks to.
#[derive(Clone)]
pub struct Services {
    /// Remote cart service
    pub remote: Arc<dyn RemoteCart>,

    /// Promotion code validation
    pub promotions: Arc<dyn PromotionService>,

    /// Order submission
    pub orders: Arc<dyn OrderService>,

    /// Guest cart storage
    pub guest_store: Arc<dyn CartPersistence>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum RemoteOp {
    Add(Box<AddItemRequest>),
    Update(UpdateItemRequest),
    Remove(RemoveItemRequest),
    Clear,
}

#[derive(Debug)]
struct State {
    cart: Cart,
    generations: Generations,
    pending: Vec<Compensation>,
    session: Session,
    in_flight: usize,
}

/// Owns the cart and keeps it in step with storage and the remote services.
pub struct CartCoordinator {
    options: SyncOptions,
    state: Mutex<State>,
    updates: watch::Sender<Cart>,
    remote: Arc<dyn RemoteCart>,
    server_store: RemoteCartPersistence,
    promotions: Arc<dyn PromotionService>,
    orders: Arc<dyn OrderService>,
    guest_store: Arc<dyn CartPersistence>,
    guest_writer: GuestWriter,
}

impl fmt::Debug for CartCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartCoordinator")
            .field("options", &self.options)
            .field("server_store", &self.server_store)
            .finish_non_exhaustive()
    }
}

impl CartCoordinator {
    /// Start a coordinator with an empty cart. Must be called inside a Tokio runtime.
    pub fn new(services: Services, options: SyncOptions, session: Session) -> Self {
        let cart = Cart::new(options.currency);
        let (updates, _) = watch::channel(cart.clone());

        Self {
            guest_writer: GuestWriter::spawn(services.guest_store.clone(), options.debounce),
            server_store: RemoteCartPersistence::new(services.remote.clone(), options.currency),
            state: Mutex::new(State {
                cart,
                generations: Generations::default(),
                pending: Vec::new(),
                session,
                in_flight: 0,
            }),
            updates,
            remote: services.remote,
            promotions: services.promotions,
            orders: services.orders,
            guest_store: services.guest_store,
            options,
        }
    }

    /// The current cart.
    pub fn cart(&self) -> Cart {
        self.updates.borrow().clone()
    }

    /// Watch every published cart state.
    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.updates.subscribe()
    }

    /// Current session kind.
    pub async fn session(&self) -> Session {
        self.state.lock().await.session
    }

    /// Number of changes the cart service has not accepted yet.
    pub async fn pending_changes(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Load the cart from guest storage or the cart service, depending on the session.
    ///
    /// An unreadable guest cart is discarded rather than reported.
    ///
    /// # Errors
    ///
    /// Returns an error if storage or the cart service fails.
    #[tracing::instrument(name = "cart.sync.hydrate", skip(self), fields(session), err)]
    pub async fn hydrate(&self) -> Result<(), SyncError> {
        let session = self.session().await;

        Span::current().record("session", tracing::field::debug(session));

        match session {
            Session::Guest => self.hydrate_guest().await,
            Session::Authenticated => self.hydrate_remote().await,
        }
    }

    async fn hydrate_guest(&self) -> Result<(), SyncError> {
        let snapshot = match self.guest_store.load_cart().await {
            Ok(snapshot) => snapshot,
            Err(PersistenceError::Snapshot(error)) => {
                warn!(%error, "discarding unreadable guest cart");
                None
            }
            Err(error) => return Err(error.into()),
        };

        let Some(snapshot) = snapshot else {
            debug!("no guest cart stored");
            return Ok(());
        };

        let loaded = match snapshot.into_cart_in(self.options.currency) {
            Ok(cart) => cart,
            Err(error) => {
                warn!(%error, "discarding incompatible guest cart");
                return Ok(());
            }
        };

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        state.generations.dispatch(loaded.items().iter().map(LineItem::key));
        state.cart = loaded;

        info!(items = state.cart.items().len(), "restored guest cart");

        self.publish(state);

        Ok(())
    }

    async fn hydrate_remote(&self) -> Result<(), SyncError> {
        self.begin_remote(&mut *self.state.lock().await);

        let loaded = self.server_store.load_cart().await;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        Self::end_remote(state);

        match loaded {
            Ok(snapshot) => {
                let items = snapshot.map(|snapshot| snapshot.items).unwrap_or_default();

                let command = CartCommand::LoadCart(items);

                state.generations.dispatch(&state.cart.affected_keys(&command));
                state.cart.dispatch(command);

                info!(items = state.cart.items().len(), "loaded server cart");

                self.publish(state);

                Ok(())
            }
            Err(error) => {
                error!(%error, "failed to load server cart");

                state.cart.dispatch(CartCommand::SetError(Some(error.to_string())));
                self.publish(state);

                Err(error.into())
            }
        }
    }

    /// Switch a guest session to authenticated, merging the guest cart into the server cart.
    ///
    /// Guest-only lines the merge keeps are pushed to the cart service. A push failure never
    /// drops them locally; they are queued for [`Self::retry_pending`] instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cart cannot be loaded (the session stays a guest session)
    /// or a guest line cannot be pushed.
    #[tracing::instrument(
        name = "cart.sync.authenticate",
        skip(self),
        fields(policy = %self.options.merge_policy, pushed),
        err
    )]
    pub async fn authenticate(&self) -> Result<(), SyncError> {
        let guest_items = {
            let state = self.state.lock().await;

            if state.session == Session::Authenticated {
                debug!("already authenticated");
                return Ok(());
            }

            state.cart.items().to_vec()
        };

        let server_items = self
            .server_store
            .load_cart()
            .await?
            .map(|snapshot| snapshot.items)
            .unwrap_or_default();

        let outcome = merge_carts(self.options.merge_policy, server_items.clone(), &guest_items);

        Span::current().record("pushed", outcome.to_push.len());

        {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            let command = CartCommand::LoadCart(server_items);

            state.session = Session::Authenticated;
            state.generations.dispatch(&state.cart.affected_keys(&command));
            state.cart.dispatch(command);

            self.publish(state);
        }

        self.guest_writer.clear();

        if outcome.to_push.is_empty() {
            return Ok(());
        }

        self.mutate(CartCommand::LoadCart(outcome.items), FailurePolicy::KeepOptimistic)
            .await
            .map(|_| ())
    }

    /// Add units of a product from one of its offers.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Ignored`] for malformed products and a remote error if the cart
    /// service rejects the change.
    #[tracing::instrument(
        name = "cart.sync.add_item",
        skip(self, product, offer),
        fields(product_id = ?product.id, pharmacy_id = ?offer.as_ref().map(|offer| &offer.pharmacy_id)),
        err
    )]
    pub async fn add_item(
        &self,
        product: Product,
        offer: Option<Offer>,
        quantity: u32,
    ) -> Result<Transition, SyncError> {
        self.mutate(
            CartCommand::AddItem {
                product,
                offer,
                quantity,
            },
            self.options.failure_policy,
        )
        .await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the cart service rejects the change.
    #[tracing::instrument(name = "cart.sync.remove_item", skip(self, key), fields(key = %key), err)]
    pub async fn remove_item(&self, key: LineItemKey) -> Result<Transition, SyncError> {
        self.mutate(CartCommand::RemoveItem(key), self.options.failure_policy)
            .await
    }

    /// Set a line's quantity, then reload the server cart to pick up server-side adjustments.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the cart service rejects the change. A failed reload after an
    /// accepted update is logged, not returned.
    #[tracing::instrument(
        name = "cart.sync.update_quantity",
        skip(self, key),
        fields(key = %key),
        err
    )]
    pub async fn update_quantity(
        &self,
        key: LineItemKey,
        quantity: i64,
    ) -> Result<Transition, SyncError> {
        self.mutate(
            CartCommand::UpdateQuantity { key, quantity },
            self.options.failure_policy,
        )
        .await
    }

    /// Empty the cart and drop the promotion.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the cart service fails to clear.
    #[tracing::instrument(name = "cart.sync.clear", skip(self), err)]
    pub async fn clear(&self) -> Result<Transition, SyncError> {
        self.mutate(CartCommand::ClearCart, self.options.failure_policy)
            .await
    }

    /// Replace the lines of an approved prescription.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the cart service rejects any of the changes.
    #[tracing::instrument(
        name = "cart.sync.add_prescription_items",
        skip(self, items),
        fields(items = items.len()),
        err
    )]
    pub async fn add_prescription_items(
        &self,
        items: Vec<LineItem>,
        prescription_id: String,
    ) -> Result<Transition, SyncError> {
        self.mutate(
            CartCommand::AddPrescriptionItems {
                items,
                prescription_id,
            },
            self.options.failure_policy,
        )
        .await
    }

    /// Remove every line tagged with a prescription.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the cart service rejects any of the removals.
    #[tracing::instrument(name = "cart.sync.remove_prescription_items", skip(self), err)]
    pub async fn remove_prescription_items(
        &self,
        prescription_id: String,
    ) -> Result<Transition, SyncError> {
        self.mutate(
            CartCommand::RemovePrescriptionItems(prescription_id),
            self.options.failure_policy,
        )
        .await
    }

    /// Re-snapshot prices, fees and caps from live offers.
    ///
    /// Only quantity changes forced by a lower cap are mirrored; the cart service keeps its own
    /// prices.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the cart service rejects a clamped quantity.
    #[tracing::instrument(
        name = "cart.sync.refresh_prices",
        skip(self, updates),
        fields(updates = updates.len()),
        err
    )]
    pub async fn refresh_prices(&self, updates: Vec<PriceUpdate>) -> Result<Transition, SyncError> {
        self.mutate(
            CartCommand::RefreshPrices(updates),
            self.options.failure_policy,
        )
        .await
    }

    /// Validate a promo code and make it the active promotion.
    ///
    /// Nothing is applied until the promotion service accepts the code.
    ///
    /// # Errors
    ///
    /// Returns [`PromotionError`] for blank, rejected or malformed codes. The cart is left
    /// untouched.
    #[tracing::instrument(name = "cart.sync.apply_promo_code", skip(self), err)]
    pub async fn apply_promo_code(&self, code: &str) -> Result<Promotion, SyncError> {
        let code = code.trim();

        if code.is_empty() {
            return Err(PromotionError::EmptyCode.into());
        }

        let request = {
            let state = self.state.lock().await;

            ValidatePromoRequest::new(
                code,
                state.cart.totals().subtotal.to_minor_units(),
                self.options.currency,
            )
        };

        let promotion = self
            .promotions
            .validate(request)
            .await
            .map_err(PromotionError::from)?
            .into_promotion(code, self.options.currency)
            .map_err(PromotionError::from)?;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        state
            .cart
            .dispatch(CartCommand::ApplyPromotion(promotion.clone()));

        info!(
            code = %promotion.code,
            discount = %state.cart.totals().discount,
            "applied promotion"
        );

        self.settle(state);

        Ok(promotion)
    }

    /// Drop the active promotion.
    #[tracing::instrument(name = "cart.sync.remove_promotion", skip(self))]
    pub async fn remove_promotion(&self) -> Transition {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let transition = state.cart.dispatch(CartCommand::RemovePromotion);

        if transition.is_applied() {
            self.settle(state);
        }

        transition
    }

    /// Submit the cart as an order and clear it on success.
    ///
    /// A failed submission leaves the cart exactly as it was. A failed clear after a placed
    /// order is never rolled back; it is queued for [`Self::retry_pending`].
    ///
    /// # Errors
    ///
    /// Returns [`OrderError`] if the cart cannot be assembled or the order service fails.
    #[tracing::instrument(
        name = "cart.sync.create_order",
        skip(self, delivery_address),
        fields(order_id),
        err
    )]
    pub async fn create_order(
        &self,
        delivery_address: &str,
        use_credits: bool,
    ) -> Result<PlacedOrder, SyncError> {
        let draft = {
            let state = self.state.lock().await;

            assemble_order(&state.cart, delivery_address, use_credits).map_err(OrderError::from)?
        };

        let request = CreateOrderRequest::from_draft(draft, self.options.currency);

        let response = self
            .orders
            .create_order(request)
            .await
            .map_err(OrderError::from)?;

        let order = PlacedOrder::try_from(response).map_err(OrderError::from)?;

        Span::current().record("order_id", order.id.as_str());

        info!(order_number = %order.order_number, "order placed");

        if let Err(error) = self
            .mutate(CartCommand::ClearCart, FailurePolicy::KeepOptimistic)
            .await
        {
            warn!(%error, "order placed but the cart could not be cleared remotely");
        }

        Ok(order)
    }

    /// Push the whole local cart to the cart service, replacing whatever it holds.
    ///
    /// Returns the number of queued changes that were settled.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart service fails; the queue is kept.
    #[tracing::instrument(name = "cart.sync.retry_pending", skip(self), err)]
    pub async fn retry_pending(&self) -> Result<usize, SyncError> {
        let snapshot = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            if state.pending.is_empty() || state.session == Session::Guest {
                return Ok(0);
            }

            self.begin_remote(state);

            CartSnapshot::capture(&state.cart)
        };

        let result = self.server_store.save_cart(snapshot).await;

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        Self::end_remote(state);

        match result {
            Ok(()) => {
                let settled = state.pending.len();

                state.pending.clear();
                self.publish(state);

                info!(settled, "pending changes accepted");

                Ok(settled)
            }
            Err(error) => {
                state.cart.dispatch(CartCommand::SetError(Some(error.to_string())));
                self.publish(state);

                Err(error.into())
            }
        }
    }

    /// Undo every queued change, newest first.
    ///
    /// Returns the number of changes undone.
    #[tracing::instrument(name = "cart.sync.discard_pending", skip(self))]
    pub async fn discard_pending(&self) -> usize {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let discarded = state.pending.len();

        while let Some(compensation) = state.pending.pop() {
            state.generations.dispatch(compensation.keys());
            state.cart.dispatch(CartCommand::Restore(compensation));
        }

        if discarded > 0 {
            state.cart.dispatch(CartCommand::SetError(None));
            self.publish(state);
        }

        discarded
    }

    /// Flush guest storage and stop the background writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer stopped abnormally.
    pub async fn shutdown(self) -> Result<(), SyncError> {
        Ok(self.guest_writer.shutdown().await?)
    }

    /// Apply `command` optimistically and mirror it to the cart service.
    async fn mutate(
        &self,
        command: CartCommand,
        on_failure: FailurePolicy,
    ) -> Result<Transition, SyncError> {
        let reconcile = matches!(command, CartCommand::UpdateQuantity { .. });
        let clear = matches!(command, CartCommand::ClearCart);

        let (transition, compensation, ticket, ops) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            let compensation = state.cart.compensation_for(&command);

            let transition = match state.cart.dispatch(command) {
                Transition::Ignored(reason) => return Err(SyncError::Ignored(reason)),
                Transition::Unchanged => return Ok(Transition::Unchanged),
                applied @ Transition::Applied => applied,
            };

            let ticket = state.generations.dispatch(compensation.keys());

            if state.session == Session::Guest {
                self.settle(state);
                return Ok(transition);
            }

            let ops = if clear {
                vec![RemoteOp::Clear]
            } else {
                remote_ops(&compensation, &state.cart)
            };

            if ops.is_empty() {
                self.publish(state);
                return Ok(transition);
            }

            self.begin_remote(state);

            (transition, compensation, ticket, ops)
        };

        let outcome = self.mirror(ops).await;

        let fetched = match outcome {
            Ok(()) if reconcile => Some(self.remote.fetch_cart().await),
            _ => None,
        };

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        Self::end_remote(state);

        let result = match outcome {
            Ok(()) => {
                if let Some(fetched) = fetched {
                    self.reconcile(state, &ticket, fetched);
                }

                Ok(transition)
            }
            Err(error) => {
                Self::recover(state, compensation, &ticket, on_failure, &error);

                Err(error.into())
            }
        };

        self.publish(state);

        result
    }

    async fn mirror(&self, ops: Vec<RemoteOp>) -> Result<(), RemoteError> {
        for op in ops {
            match op {
                RemoteOp::Add(request) => self.remote.add_item(*request).await?,
                RemoteOp::Update(request) => self.remote.update_item(request).await?,
                RemoteOp::Remove(request) => self.remote.remove_item(request).await?,
                RemoteOp::Clear => self.remote.clear_cart().await?,
            }
        }

        Ok(())
    }

    /// Replace local lines with a server snapshot fetched on behalf of `ticket`.
    fn reconcile(
        &self,
        state: &mut State,
        ticket: &Ticket,
        fetched: Result<ServerCart, RemoteError>,
    ) {
        let items = fetched.and_then(|server| {
            server
                .into_line_items(
                    self.options.currency,
                    state.cart.items(),
                    state.cart.default_delivery_fee(),
                )
                .map_err(RemoteError::from)
        });

        let items = match items {
            Ok(items) => items,
            Err(error) => {
                warn!(%error, "reload after update failed, keeping local cart");
                return;
            }
        };

        let superseded = |item: &LineItem| {
            state
                .generations
                .latest(item.key())
                .is_some_and(|latest| latest > ticket.generation())
        };

        if !state.generations.is_current(ticket)
            || state.cart.items().iter().any(superseded)
            || items.iter().any(superseded)
        {
            warn!(
                generation = ticket.generation(),
                "discarding stale server snapshot"
            );
            return;
        }

        let command = CartCommand::LoadCart(items);

        state.generations.dispatch(&state.cart.affected_keys(&command));
        state.cart.dispatch(command);

        debug!(generation = ticket.generation(), "reconciled with server cart");
    }

    /// Handle a mirror the cart service did not accept.
    fn recover(
        state: &mut State,
        compensation: Compensation,
        ticket: &Ticket,
        policy: FailurePolicy,
        error: &RemoteError,
    ) {
        state
            .cart
            .dispatch(CartCommand::SetError(Some(error.user_message())));

        match policy {
            FailurePolicy::Rollback if state.generations.is_current(ticket) => {
                warn!(%error, "rolling back rejected change");

                state.generations.dispatch(compensation.keys());
                state.cart.dispatch(CartCommand::Restore(compensation));
            }
            FailurePolicy::Rollback => {
                warn!(%error, "rejected change was superseded, queueing instead of rolling back");

                state.pending.push(compensation);
            }
            FailurePolicy::KeepOptimistic => {
                warn!(%error, "keeping rejected change for retry");

                state.pending.push(compensation);
            }
        }
    }

    fn begin_remote(&self, state: &mut State) {
        state.in_flight += 1;
        state.cart.dispatch(CartCommand::SetError(None));
        state.cart.dispatch(CartCommand::SetLoading(true));

        self.publish(state);
    }

    fn end_remote(state: &mut State) {
        state.in_flight = state.in_flight.saturating_sub(1);
        state
            .cart
            .dispatch(CartCommand::SetLoading(state.in_flight > 0));
    }

    fn publish(&self, state: &State) {
        self.updates.send_replace(state.cart.clone());
    }

    /// Publish and persist a settled change.
    fn settle(&self, state: &State) {
        self.publish(state);
        self.persist_guest(state);
    }

    fn persist_guest(&self, state: &State) {
        if state.session != Session::Guest {
            return;
        }

        if state.cart.is_empty() && state.cart.promotion().is_none() {
            self.guest_writer.clear();
        } else {
            self.guest_writer.save(CartSnapshot::capture(&state.cart));
        }
    }
}

/// Remote calls that bring the cart service in line with the lines a transition touched.
fn remote_ops(compensation: &Compensation, cart: &Cart) -> Vec<RemoteOp> {
    compensation
        .priors()
        .filter_map(|(key, prior)| match (prior, cart.item(key)) {
            (None, Some(item)) => Some(RemoteOp::Add(Box::new(AddItemRequest::new(
                item,
                item.quantity(),
                cart.currency(),
            )))),
            (Some(_), None) => Some(RemoteOp::Remove(RemoveItemRequest::from(key))),
            (Some(before), Some(after)) if before.quantity() != after.quantity() => Some(
                RemoteOp::Update(UpdateItemRequest::new(key, after.quantity())),
            ),
            _ => None,
        })
        .collect()
}
