use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::warn;
use mps_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Unrecognized status value: {0}")]
pub struct StatusConversionError(pub String);

/// How the system edge treats status strings it does not recognize.
///
/// `Permissive` rewrites them to `PENDING` (and logs the rewrite); `Strict` rejects the request instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusPolicy {
    #[default]
    Permissive,
    Strict,
}

//--------------------------------------     ItemStatus      ---------------------------------------------------------
/// Fulfillment state of a single vendor line on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    /// The item has been placed and the vendor has not acted on it yet.
    Pending,
    /// The vendor has accepted the item for fulfillment.
    Accepted,
    /// The vendor is preparing the item for dispatch.
    Packing,
    /// The item has been handed to a carrier.
    Shipped,
    /// The item has reached the customer. Terminal.
    Delivered,
    /// The item will not be fulfilled. Terminal.
    Cancelled,
    /// The payments subsystem has refunded the item. Terminal, and only ever written by that subsystem.
    Refunded,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 7] = [
        ItemStatus::Pending,
        ItemStatus::Accepted,
        ItemStatus::Packing,
        ItemStatus::Shipped,
        ItemStatus::Delivered,
        ItemStatus::Cancelled,
        ItemStatus::Refunded,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Delivered | ItemStatus::Cancelled | ItemStatus::Refunded)
    }

    /// Strict normalization. Accepts the canonical value in any casing, plus the legacy lowercase aliases
    /// (`confirmed` → `ACCEPTED`, `processing` → `PACKING`).
    pub fn try_normalize(input: &str) -> Result<Self, StatusConversionError> {
        match input.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ItemStatus::Pending),
            "accepted" | "confirmed" => Ok(ItemStatus::Accepted),
            "packing" | "processing" => Ok(ItemStatus::Packing),
            "shipped" => Ok(ItemStatus::Shipped),
            "delivered" => Ok(ItemStatus::Delivered),
            "cancelled" => Ok(ItemStatus::Cancelled),
            "refunded" => Ok(ItemStatus::Refunded),
            _ => Err(StatusConversionError(input.to_string())),
        }
    }

    /// Permissive normalization. Unrecognized input collapses to `PENDING`; the rewrite is logged so bad input does
    /// not vanish silently.
    pub fn normalize(input: &str) -> Self {
        Self::try_normalize(input).unwrap_or_else(|_| {
            warn!("⚖️ Unrecognized item status '{input}' normalized to PENDING");
            ItemStatus::Pending
        })
    }
}

impl Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Pending => write!(f, "PENDING"),
            ItemStatus::Accepted => write!(f, "ACCEPTED"),
            ItemStatus::Packing => write!(f, "PACKING"),
            ItemStatus::Shipped => write!(f, "SHIPPED"),
            ItemStatus::Delivered => write!(f, "DELIVERED"),
            ItemStatus::Cancelled => write!(f, "CANCELLED"),
            ItemStatus::Refunded => write!(f, "REFUNDED"),
        }
    }
}

impl FromStr for ItemStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ItemStatus::Pending),
            "ACCEPTED" => Ok(ItemStatus::Accepted),
            "PACKING" => Ok(ItemStatus::Packing),
            "SHIPPED" => Ok(ItemStatus::Shipped),
            "DELIVERED" => Ok(ItemStatus::Delivered),
            "CANCELLED" => Ok(ItemStatus::Cancelled),
            "REFUNDED" => Ok(ItemStatus::Refunded),
            s => Err(StatusConversionError(s.to_string())),
        }
    }
}

//--------------------------------------     OrderStatus     ---------------------------------------------------------
/// The single customer-facing status of an order, derived from its item statuses unless an admin has overridden it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    PartiallyShipped,
    Shipped,
    PartiallyDelivered,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::PartiallyShipped,
        OrderStatus::Shipped,
        OrderStatus::PartiallyDelivered,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    /// Strict normalization. Accepts the canonical value in any casing, plus the legacy lowercase aliases.
    pub fn try_normalize(input: &str) -> Result<Self, StatusConversionError> {
        match input.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" | "confirmed" => Ok(OrderStatus::Processing),
            "partially_shipped" => Ok(OrderStatus::PartiallyShipped),
            "shipped" => Ok(OrderStatus::Shipped),
            "partially_delivered" => Ok(OrderStatus::PartiallyDelivered),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "refunded" => Ok(OrderStatus::Refunded),
            _ => Err(StatusConversionError(input.to_string())),
        }
    }

    /// Permissive normalization. Unrecognized input collapses to `PENDING` with a log entry.
    pub fn normalize(input: &str) -> Self {
        Self::try_normalize(input).unwrap_or_else(|_| {
            warn!("⚖️ Unrecognized order status '{input}' normalized to PENDING");
            OrderStatus::Pending
        })
    }

    /// The single lowercase word written to the legacy status mirror. Systems still reading the old field cannot
    /// represent the partial states, so both partial and full shipment collapse to `shipped`.
    pub fn as_legacy(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::PartiallyShipped => "shipped",
            OrderStatus::Shipped => "shipped",
            OrderStatus::PartiallyDelivered => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Processing => write!(f, "PROCESSING"),
            OrderStatus::PartiallyShipped => write!(f, "PARTIALLY_SHIPPED"),
            OrderStatus::Shipped => write!(f, "SHIPPED"),
            OrderStatus::PartiallyDelivered => write!(f, "PARTIALLY_DELIVERED"),
            OrderStatus::Delivered => write!(f, "DELIVERED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::Refunded => write!(f, "REFUNDED"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "PARTIALLY_SHIPPED" => Ok(OrderStatus::PartiallyShipped),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "PARTIALLY_DELIVERED" => Ok(OrderStatus::PartiallyDelivered),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "REFUNDED" => Ok(OrderStatus::Refunded),
            s => Err(StatusConversionError(s.to_string())),
        }
    }
}

//--------------------------------------    PaymentStatus    ---------------------------------------------------------
/// Externally driven payment signal. The fulfillment core mirrors it but never computes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "PENDING"),
            PaymentStatus::Paid => write!(f, "PAID"),
            PaymentStatus::Failed => write!(f, "FAILED"),
            PaymentStatus::Refunded => write!(f, "REFUNDED"),
        }
    }
}

//--------------------------------------      ActorRole      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Customer,
    Vendor,
    Admin,
    System,
}

impl Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorRole::Customer => write!(f, "CUSTOMER"),
            ActorRole::Vendor => write!(f, "VENDOR"),
            ActorRole::Admin => write!(f, "ADMIN"),
            ActorRole::System => write!(f, "SYSTEM"),
        }
    }
}

/// The actor context carried by every mutating operation and stamped on every history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn customer<S: Into<String>>(id: S) -> Self {
        Self { id: id.into(), role: ActorRole::Customer }
    }

    pub fn vendor<S: Into<String>>(id: S) -> Self {
        Self { id: id.into(), role: ActorRole::Vendor }
    }

    pub fn admin<S: Into<String>>(id: S) -> Self {
        Self { id: id.into(), role: ActorRole::Admin }
    }

    pub fn system() -> Self {
        Self { id: "system".to_string(), role: ActorRole::System }
    }
}

//--------------------------------------       OrderId       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------       ItemKey       ---------------------------------------------------------
/// Identifies one line item within an order. Product and vendor together are unique per order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemKey {
    pub product_id: String,
    pub vendor_id: String,
}

impl ItemKey {
    pub fn new<P: Into<String>, V: Into<String>>(product_id: P, vendor_id: V) -> Self {
        Self { product_id: product_id.into(), vendor_id: vendor_id.into() }
    }
}

impl Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.vendor_id, self.product_id)
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    /// Human-readable order number. Generated at creation, unique, never reused.
    pub order_number: String,
    pub customer_id: String,
    pub order_status: OrderStatus,
    /// Lowercase mirror of `order_status` for consumers of the old field. Kept in sync on every aggregate write.
    pub legacy_status: String,
    pub payment_status: PaymentStatus,
    pub currency: String,
    pub total_price: Money,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency counter. Incremented on every committed write to the aggregate.
    pub version: i64,
}

//--------------------------------------      OrderItem      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: String,
    pub vendor_id: String,
    pub qty: i64,
    /// Priced snapshot taken at order time. Never recomputed from live product data.
    pub unit_price: Money,
    pub line_total: Money,
    pub status: ItemStatus,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub vendor_note: Option<String>,
    pub internal_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.product_id.clone(), self.vendor_id.clone())
    }
}

//--------------------------------------     HistoryLevel    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryLevel {
    Order,
    Item,
}

impl Display for HistoryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryLevel::Order => write!(f, "ORDER"),
            HistoryLevel::Item => write!(f, "ITEM"),
        }
    }
}

//--------------------------------------  StatusHistoryEntry ---------------------------------------------------------
/// One immutable audit record. Entries are never updated or deleted; the newest-first sequence for an order is its
/// canonical timeline, and replaying `to_status` per item reconstructs current state.
///
/// `from_status` and `to_status` hold item statuses for `ITEM` entries and order statuses for `ORDER` entries, stored
/// as text so a single table serves both levels.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub level: HistoryLevel,
    pub item_product_id: Option<String>,
    pub item_vendor_id: Option<String>,
    pub from_status: String,
    pub to_status: String,
    pub actor_id: String,
    pub actor_role: ActorRole,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A history entry that has not been persisted yet. The store assigns `id` and `created_at` at commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStatusHistoryEntry {
    pub level: HistoryLevel,
    pub item_product_id: Option<String>,
    pub item_vendor_id: Option<String>,
    pub from_status: String,
    pub to_status: String,
    pub actor_id: String,
    pub actor_role: ActorRole,
    pub note: Option<String>,
}

impl NewStatusHistoryEntry {
    pub fn for_item(item: &ItemKey, from: ItemStatus, to: ItemStatus, actor: &Actor, note: Option<String>) -> Self {
        Self {
            level: HistoryLevel::Item,
            item_product_id: Some(item.product_id.clone()),
            item_vendor_id: Some(item.vendor_id.clone()),
            from_status: from.to_string(),
            to_status: to.to_string(),
            actor_id: actor.id.clone(),
            actor_role: actor.role,
            note,
        }
    }

    pub fn for_order(from: OrderStatus, to: OrderStatus, actor: &Actor, note: Option<String>) -> Self {
        Self {
            level: HistoryLevel::Order,
            item_product_id: None,
            item_vendor_id: None,
            from_status: from.to_string(),
            to_status: to.to_string(),
            actor_id: actor.id.clone(),
            actor_role: actor.role,
            note,
        }
    }
}

//--------------------------------------       NewOrder      ---------------------------------------------------------
/// Checkout payload. The engine assigns the public order id and order number and snapshots line totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: String,
    pub currency: String,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(customer_id: S, currency: S, items: Vec<NewOrderItem>) -> Self {
        Self { customer_id: customer_id.into(), currency: currency.into(), items }
    }

    pub fn total_price(&self) -> Money {
        self.items.iter().map(NewOrderItem::line_total).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub vendor_id: String,
    pub qty: i64,
    pub unit_price: Money,
}

impl NewOrderItem {
    pub fn new<P: Into<String>, V: Into<String>>(product_id: P, vendor_id: V, qty: i64, unit_price: Money) -> Self {
        Self { product_id: product_id.into(), vendor_id: vendor_id.into(), qty, unit_price }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price * self.qty
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn item_status_normalization_accepts_canonical_and_legacy_forms() {
        assert_eq!(ItemStatus::normalize("PENDING"), ItemStatus::Pending);
        assert_eq!(ItemStatus::normalize("accepted"), ItemStatus::Accepted);
        assert_eq!(ItemStatus::normalize("Shipped"), ItemStatus::Shipped);
        assert_eq!(ItemStatus::normalize("confirmed"), ItemStatus::Accepted);
        assert_eq!(ItemStatus::normalize("processing"), ItemStatus::Packing);
        assert_eq!(ItemStatus::normalize("refunded"), ItemStatus::Refunded);
    }

    #[test]
    fn item_status_normalization_is_idempotent() {
        for input in ["PENDING", "confirmed", "processing", "SHIPPED", "delivered", "garbage", "", "✨"] {
            let once = ItemStatus::normalize(input);
            let twice = ItemStatus::normalize(&once.to_string());
            assert_eq!(once, twice, "normalize(normalize({input:?})) diverged");
        }
    }

    #[test]
    fn unrecognized_statuses_collapse_to_pending() {
        assert_eq!(ItemStatus::normalize("garbage"), ItemStatus::Pending);
        assert_eq!(OrderStatus::normalize("nonsense"), OrderStatus::Pending);
        assert!(ItemStatus::try_normalize("garbage").is_err());
        assert!(OrderStatus::try_normalize("nonsense").is_err());
    }

    #[test]
    fn order_status_normalization_is_idempotent() {
        for input in ["pending", "confirmed", "PARTIALLY_SHIPPED", "partially_delivered", "junk"] {
            let once = OrderStatus::normalize(input);
            let twice = OrderStatus::normalize(&once.to_string());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn legacy_mapping_collapses_partial_states() {
        assert_eq!(OrderStatus::PartiallyShipped.as_legacy(), "shipped");
        assert_eq!(OrderStatus::Shipped.as_legacy(), "shipped");
        assert_eq!(OrderStatus::PartiallyDelivered.as_legacy(), "shipped");
        assert_eq!(OrderStatus::Delivered.as_legacy(), "delivered");
        assert_eq!(OrderStatus::Pending.as_legacy(), "pending");
        assert_eq!(OrderStatus::Refunded.as_legacy(), "refunded");
    }

    #[test]
    fn canonical_forms_round_trip_through_display() {
        for status in ItemStatus::ALL {
            assert_eq!(status.to_string().parse::<ItemStatus>().unwrap(), status);
        }
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
    }
}
