use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{ItemStatus, NewStatusHistoryEntry, OrderId, OrderStatus, PaymentStatus};

/// One item mutation inside a [`StatusChangeSet`]. Notes are merged, not replaced: a `None` leaves the stored note
/// untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPatch {
    pub product_id: String,
    pub vendor_id: String,
    pub status: ItemStatus,
    pub vendor_note: Option<String>,
    pub internal_note: Option<String>,
}

/// Milestone timestamps to stamp with this commit. The store writes each with first-write-wins semantics; a
/// timestamp that is already set is never overwritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MilestoneStamps {
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl MilestoneStamps {
    /// The stamp an aggregate status earns when it is first reached.
    pub fn for_status(status: OrderStatus, at: DateTime<Utc>) -> Self {
        let mut stamps = Self::default();
        match status {
            OrderStatus::Shipped => stamps.shipped_at = Some(at),
            OrderStatus::Delivered => stamps.delivered_at = Some(at),
            OrderStatus::Cancelled => stamps.cancelled_at = Some(at),
            _ => {},
        }
        stamps
    }
}

/// Everything one status-changing operation wants to persist, applied by the store in a single transaction,
/// conditional on `expected_version`. A version mismatch means another writer committed since the aggregate was
/// loaded; the store must reject the whole set so the caller can re-read and re-apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangeSet {
    pub order_id: OrderId,
    pub expected_version: i64,
    pub item_patches: Vec<ItemPatch>,
    /// New aggregate status, when it changed (or was overridden). The store also writes the legacy mirror from this.
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub stamps: MilestoneStamps,
    pub history: Vec<NewStatusHistoryEntry>,
}

impl StatusChangeSet {
    pub fn new(order_id: OrderId, expected_version: i64) -> Self {
        Self {
            order_id,
            expected_version,
            item_patches: Vec::new(),
            order_status: None,
            payment_status: None,
            stamps: MilestoneStamps::default(),
            history: Vec::new(),
        }
    }
}

/// Carrier metadata a vendor attaches to a line item. Independent of status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingUpdate {
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
}
