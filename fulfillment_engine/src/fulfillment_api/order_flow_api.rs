use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{
        Actor,
        ActorRole,
        ItemKey,
        ItemStatus,
        NewOrder,
        NewStatusHistoryEntry,
        OrderId,
        OrderItem,
        OrderStatus,
        PaymentStatus,
        StatusHistoryEntry,
        StatusPolicy,
    },
    events::{EventProducers, ItemStatusChangedEvent, OrderCreatedEvent, OrderStatusChangedEvent},
    fulfillment::{check_transition, overall_status},
    fulfillment_api::{
        errors::OrderFlowError,
        order_objects::{FullOrder, OrderQueryFilter, StatusUpdateResult},
    },
    helpers,
    traits::{ItemPatch, MilestoneStamps, OrderStore, OrderStoreError, StatusChangeSet, TrackingUpdate},
};

/// How many times a status-changing operation is replayed from a fresh read after losing an optimistic-concurrency
/// race, before the conflict is surfaced to the caller.
const MAX_CONFLICT_RETRIES: usize = 3;

/// Note attached to order-level history entries that were produced as a side effect of an item transition.
const DERIVED_NOTE: &str = "derived from item fulfilment update";

/// `OrderFlowApi` is the primary API for the order fulfillment state machine. It orchestrates every status-changing
/// operation: load the aggregate, validate the transition, mutate the item, recompute the aggregate status, persist
/// order and history in one commit, and publish events for downstream collaborators.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    policy: StatusPolicy,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B) -> Self {
        Self { db, producers: EventProducers::default(), policy: StatusPolicy::default() }
    }

    pub fn with_producers(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }

    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: OrderStore
{
    /// Accepts a checkout and stores the order with its line items in one transaction. The engine assigns the public
    /// order id and order number and snapshots line totals; items start life as `PENDING`.
    ///
    /// The call is idempotent at the store level; the `OrderCreated` event fires only for a genuinely new order.
    pub async fn process_new_order(&self, order: NewOrder) -> Result<FullOrder, OrderFlowError> {
        let order_id = OrderId::from(helpers::new_order_id());
        let order_number = helpers::new_order_number();
        let (full, inserted) = self.db.insert_order(order, order_id, order_number).await?;
        if inserted {
            debug!("🛒️ Order {} created with {} line item(s)", full.order.order_id, full.items.len());
            self.call_order_created_hook(&full).await;
        }
        Ok(full)
    }

    /// Transitions one line item to `target_status` on behalf of `actor`.
    ///
    /// The full contract, in order:
    /// 1. Load the order; `OrderNotFound` if absent.
    /// 2. Locate the line item selling `product_id`. No such item is `ItemNotFound`; an item owned by a different
    ///    vendor is `Forbidden` for vendor actors.
    /// 3. Normalize `target_status` under the configured policy and validate the transition; `InvalidTransition`
    ///    carries the validator's reason.
    /// 4. Mutate the item (and its notes), recompute the aggregate status, stamp milestone timestamps the first time
    ///    a milestone is reached, and persist order + history atomically.
    /// 5. Publish item/order status events.
    ///
    /// A write that loses an optimistic-concurrency race against another vendor is replayed from step 1; after
    /// [`MAX_CONFLICT_RETRIES`] failed attempts the operation fails with `Conflict`.
    ///
    /// Returns the committed aggregate and the history entries this call appended. Two entries are produced when the
    /// item transition also moved the order-level status; one otherwise.
    pub async fn update_item_status(
        &self,
        order_id: &OrderId,
        vendor_id: &str,
        product_id: &str,
        target_status: &str,
        actor: &Actor,
        note: Option<String>,
    ) -> Result<StatusUpdateResult, OrderFlowError> {
        let target = match self.policy {
            StatusPolicy::Strict => {
                ItemStatus::try_normalize(target_status).map_err(|e| OrderFlowError::InvalidStatus(e.0))?
            },
            StatusPolicy::Permissive => ItemStatus::normalize(target_status),
        };
        for attempt in 0..MAX_CONFLICT_RETRIES {
            let full = self.db.fetch_order(order_id).await?.ok_or_else(|| {
                debug!("🔄️📦️ Order {order_id} not found");
                OrderFlowError::OrderNotFound(order_id.clone())
            })?;
            let item = self.locate_item(&full, vendor_id, product_id, actor)?;
            let from = item.status;
            check_transition(from, target)?;

            let mut change = StatusChangeSet::new(order_id.clone(), full.order.version);
            change.item_patches.push(ItemPatch {
                product_id: product_id.to_string(),
                vendor_id: item.vendor_id.clone(),
                status: target,
                vendor_note: note.clone(),
                internal_note: note.clone(),
            });
            let key = item.key();
            change.history.push(NewStatusHistoryEntry::for_item(&key, from, target, actor, note.clone()));

            let statuses: Vec<ItemStatus> =
                full.items.iter().map(|i| if i.id == item.id { target } else { i.status }).collect();
            let old_overall = full.order.order_status;
            let new_overall = overall_status(&statuses);
            if new_overall != old_overall {
                change.order_status = Some(new_overall);
                change.stamps = MilestoneStamps::for_status(new_overall, Utc::now());
                change.history.push(NewStatusHistoryEntry::for_order(
                    old_overall,
                    new_overall,
                    actor,
                    Some(DERIVED_NOTE.to_string()),
                ));
            }

            let history = change.history.clone();
            match self.db.commit_status_change(change).await {
                Ok(updated) => {
                    debug!("🔄️📦️ Item {key} on order {order_id} moved {from} → {target}");
                    self.call_item_status_hook(order_id, &key, from, target, actor).await;
                    if new_overall != old_overall {
                        self.call_order_status_hook(order_id, old_overall, new_overall, actor).await;
                    }
                    return Ok(StatusUpdateResult::new(updated, history));
                },
                Err(OrderStoreError::VersionConflict(_)) => {
                    debug!(
                        "🔄️📦️ Concurrent write to order {order_id} detected (attempt {}). Re-reading and retrying.",
                        attempt + 1
                    );
                },
                Err(e) => return Err(e.into()),
            }
        }
        warn!("🔄️📦️ Update to order {order_id} abandoned after {MAX_CONFLICT_RETRIES} stale writes");
        Err(OrderFlowError::Conflict(order_id.clone()))
    }

    /// Writes the order-level status directly, bypassing both the transition validator and the aggregator. Admin
    /// override is unconstrained by design: it may move the order backward or to a value inconsistent with its item
    /// statuses. The inconsistency is expected and resolves itself on the next item-level update, which recomputes
    /// the aggregate and overwrites the override.
    ///
    /// The target must be a member of the canonical enumeration (`InvalidStatus` otherwise) and the override itself
    /// is always recorded as an order-level history entry.
    pub async fn admin_set_order_status(
        &self,
        order_id: &OrderId,
        target_status: &str,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<StatusUpdateResult, OrderFlowError> {
        require_privileged(actor)?;
        let target =
            OrderStatus::try_normalize(target_status).map_err(|e| OrderFlowError::InvalidStatus(e.0))?;
        for _attempt in 0..MAX_CONFLICT_RETRIES {
            let full =
                self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
            let old = full.order.order_status;
            let mut change = StatusChangeSet::new(order_id.clone(), full.order.version);
            change.order_status = Some(target);
            change.stamps = MilestoneStamps::for_status(target, Utc::now());
            change.history.push(NewStatusHistoryEntry::for_order(old, target, actor, reason.clone()));
            let history = change.history.clone();
            match self.db.commit_status_change(change).await {
                Ok(updated) => {
                    info!("🔐️ Admin {} overrode order {order_id} status {old} → {target}", actor.id);
                    if old != target {
                        self.call_order_status_hook(order_id, old, target, actor).await;
                    }
                    return Ok(StatusUpdateResult::new(updated, history));
                },
                Err(OrderStoreError::VersionConflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(OrderFlowError::Conflict(order_id.clone()))
    }

    /// Force-cancels every eligible line item: items that are not yet `DELIVERED`, `CANCELLED` or `REFUNDED`, further
    /// narrowed to `target_items` when provided. Cancellation here is a privileged forced transition and does not
    /// consult the validator.
    ///
    /// Produces one item-level history entry per cancelled item plus one order-level entry, all committed atomically
    /// with the status writes. Fails with `NoCancellableItems` when the filter matches nothing eligible.
    pub async fn admin_cancel_order(
        &self,
        order_id: &OrderId,
        reason: &str,
        target_items: Option<&[ItemKey]>,
        actor: &Actor,
    ) -> Result<StatusUpdateResult, OrderFlowError> {
        require_privileged(actor)?;
        for _attempt in 0..MAX_CONFLICT_RETRIES {
            let full =
                self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
            let eligible: Vec<&OrderItem> = full
                .items
                .iter()
                .filter(|i| !i.status.is_terminal())
                .filter(|i| target_items.map(|keys| keys.contains(&i.key())).unwrap_or(true))
                .collect();
            if eligible.is_empty() {
                debug!("🔐️ Cancel request for order {order_id} matched no eligible items");
                return Err(OrderFlowError::NoCancellableItems(order_id.clone()));
            }

            let mut change = StatusChangeSet::new(order_id.clone(), full.order.version);
            for item in &eligible {
                change.item_patches.push(ItemPatch {
                    product_id: item.product_id.clone(),
                    vendor_id: item.vendor_id.clone(),
                    status: ItemStatus::Cancelled,
                    vendor_note: None,
                    internal_note: Some(reason.to_string()),
                });
                change.history.push(NewStatusHistoryEntry::for_item(
                    &item.key(),
                    item.status,
                    ItemStatus::Cancelled,
                    actor,
                    Some(reason.to_string()),
                ));
            }
            let cancelled_ids: Vec<i64> = eligible.iter().map(|i| i.id).collect();
            let statuses: Vec<ItemStatus> = full
                .items
                .iter()
                .map(|i| if cancelled_ids.contains(&i.id) { ItemStatus::Cancelled } else { i.status })
                .collect();
            let old_overall = full.order.order_status;
            let new_overall = overall_status(&statuses);
            if new_overall != old_overall {
                change.order_status = Some(new_overall);
                change.stamps = MilestoneStamps::for_status(new_overall, Utc::now());
            }
            change.history.push(NewStatusHistoryEntry::for_order(
                old_overall,
                new_overall,
                actor,
                Some(reason.to_string()),
            ));

            let history = change.history.clone();
            let events: Vec<ItemStatusChangedEvent> = eligible
                .iter()
                .map(|i| ItemStatusChangedEvent {
                    order_id: order_id.clone(),
                    item: i.key(),
                    from_status: i.status,
                    to_status: ItemStatus::Cancelled,
                    actor: actor.clone(),
                })
                .collect();
            match self.db.commit_status_change(change).await {
                Ok(updated) => {
                    info!("🔐️ Admin {} cancelled {} item(s) on order {order_id}", actor.id, events.len());
                    for event in events {
                        for emitter in &self.producers.item_status_changed_producer {
                            emitter.publish_event(event.clone()).await;
                        }
                    }
                    if new_overall != old_overall {
                        self.call_order_status_hook(order_id, old_overall, new_overall, actor).await;
                    }
                    return Ok(StatusUpdateResult::new(updated, history));
                },
                Err(OrderStoreError::VersionConflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(OrderFlowError::Conflict(order_id.clone()))
    }

    /// Sets carrier metadata on one line item. Tracking is independent of status: no validation, no version bump, no
    /// history entry. Vendor actors may only touch their own items.
    pub async fn update_tracking(
        &self,
        order_id: &OrderId,
        vendor_id: &str,
        product_id: &str,
        tracking: TrackingUpdate,
        actor: &Actor,
    ) -> Result<OrderItem, OrderFlowError> {
        let full =
            self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let item = self.locate_item(&full, vendor_id, product_id, actor)?;
        let key = item.key();
        let item = self.db.update_tracking(order_id, &key, tracking).await?;
        debug!("🚚️ Tracking updated for item {key} on order {order_id}");
        Ok(item)
    }

    /// Consumes the externally driven payment signal and mirrors it on the order. `confirmed_at` is stamped the first
    /// time the order becomes `PAID`. The payments subsystem keeps its own audit trail, so no fulfillment history
    /// entry is written here.
    pub async fn process_payment_update(
        &self,
        order_id: &OrderId,
        status: PaymentStatus,
        actor: &Actor,
    ) -> Result<FullOrder, OrderFlowError> {
        require_privileged(actor)?;
        for _attempt in 0..MAX_CONFLICT_RETRIES {
            let full =
                self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
            if full.order.payment_status == status {
                return Ok(full);
            }
            let mut change = StatusChangeSet::new(order_id.clone(), full.order.version);
            change.payment_status = Some(status);
            if status == PaymentStatus::Paid {
                change.stamps.confirmed_at = Some(Utc::now());
            }
            match self.db.commit_status_change(change).await {
                Ok(updated) => {
                    debug!("💰️ Order {order_id} payment status is now {status}");
                    return Ok(updated);
                },
                Err(OrderStoreError::VersionConflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(OrderFlowError::Conflict(order_id.clone()))
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<FullOrder, OrderFlowError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))
    }

    pub async fn history(&self, order_id: &OrderId) -> Result<Vec<StatusHistoryEntry>, OrderFlowError> {
        Ok(self.db.history_for_order(order_id).await?)
    }

    pub async fn vendor_history(&self, vendor_id: &str) -> Result<Vec<StatusHistoryEntry>, OrderFlowError> {
        Ok(self.db.history_for_vendor(vendor_id).await?)
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<FullOrder>, OrderFlowError> {
        trace!("🔎️ Searching orders: {query}");
        Ok(self.db.search_orders(query).await?)
    }

    /// Resolves the targeted line item by its (vendor, product) pair and enforces ownership. Two vendors may list
    /// the same product on one order, so the pair is the key, never the product alone. When no pair matches but the
    /// product exists under another vendor, the miss is `Forbidden` for vendor actors and `ItemNotFound` for everyone
    /// else (admins name the vendor they mean; a mismatch is a miss, not a rights problem).
    fn locate_item<'a>(
        &self,
        full: &'a FullOrder,
        vendor_id: &str,
        product_id: &str,
        actor: &Actor,
    ) -> Result<&'a OrderItem, OrderFlowError> {
        if let Some(item) = full.item_for(vendor_id, product_id) {
            if actor.role == ActorRole::Vendor && actor.id != item.vendor_id {
                return Err(OrderFlowError::Forbidden(format!(
                    "Actor {} does not own item {} on order {}",
                    actor.id, item.product_id, full.order.order_id
                )));
            }
            return Ok(item);
        }
        if full.item_for_product(product_id).is_some() && actor.role == ActorRole::Vendor {
            return Err(OrderFlowError::Forbidden(format!(
                "Item {product_id} on order {} belongs to another vendor",
                full.order.order_id
            )));
        }
        Err(OrderFlowError::ItemNotFound { order_id: full.order.order_id.clone(), product_id: product_id.to_string() })
    }

    async fn call_order_created_hook(&self, order: &FullOrder) {
        for emitter in &self.producers.order_created_producer {
            emitter.publish_event(OrderCreatedEvent::new(order.clone())).await;
        }
    }

    async fn call_item_status_hook(
        &self,
        order_id: &OrderId,
        item: &ItemKey,
        from: ItemStatus,
        to: ItemStatus,
        actor: &Actor,
    ) {
        for emitter in &self.producers.item_status_changed_producer {
            let event = ItemStatusChangedEvent {
                order_id: order_id.clone(),
                item: item.clone(),
                from_status: from,
                to_status: to,
                actor: actor.clone(),
            };
            emitter.publish_event(event).await;
        }
    }

    async fn call_order_status_hook(&self, order_id: &OrderId, from: OrderStatus, to: OrderStatus, actor: &Actor) {
        for emitter in &self.producers.order_status_changed_producer {
            let event = OrderStatusChangedEvent {
                order_id: order_id.clone(),
                from_status: from,
                to_status: to,
                actor: actor.clone(),
            };
            emitter.publish_event(event).await;
        }
    }
}

fn require_privileged(actor: &Actor) -> Result<(), OrderFlowError> {
    match actor.role {
        ActorRole::Admin | ActorRole::System => Ok(()),
        _ => Err(OrderFlowError::Forbidden(format!("Actor {} is not permitted to perform admin operations", actor.id))),
    }
}
