use fulfillment_engine::{
    db_types::{ItemKey, ItemStatus, NewStatusHistoryEntry, PaymentStatus},
    order_objects::OrderView,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateItemStatusRequest {
    pub status: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTrackingRequest {
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminStatusRequest {
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCancelRequest {
    pub reason: String,
    #[serde(default)]
    pub items: Option<Vec<ItemKey>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentUpdateRequest {
    pub status: PaymentStatus,
}

/// Response to a vendor status update: the order scoped to the caller, the item's new status, and the history entries
/// the operation appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemStatusUpdateResponse {
    pub order: OrderView,
    pub status: ItemStatus,
    pub history: Vec<NewStatusHistoryEntry>,
}
