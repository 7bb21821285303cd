use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Actor, ItemKey, ItemStatus, OrderId, OrderStatus},
    fulfillment_api::order_objects::FullOrder,
};

/// Fired once when a checkout lands a brand-new order in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: FullOrder,
}

impl OrderCreatedEvent {
    pub fn new(order: FullOrder) -> Self {
        Self { order }
    }
}

/// Fired after an item-level transition commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStatusChangedEvent {
    pub order_id: OrderId,
    pub item: ItemKey,
    pub from_status: ItemStatus,
    pub to_status: ItemStatus,
    pub actor: Actor,
}

/// Fired whenever the aggregate order status changes, whether derived from an item update or written by an admin
/// override. Notification and chat collaborators subscribe to this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order_id: OrderId,
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub actor: Actor,
}
