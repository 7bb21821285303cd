use std::fmt::Display;

use chrono::{DateTime, Utc};
use mps_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{
    ItemStatus,
    NewStatusHistoryEntry,
    Order,
    OrderId,
    OrderItem,
    OrderStatus,
    PaymentStatus,
    StatusHistoryEntry,
};

//--------------------------------------      FullOrder      ---------------------------------------------------------
/// The order aggregate: the order row plus its line items in insertion order. This is the unit every status-changing
/// operation loads, mutates and persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl FullOrder {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self { order, items }
    }

    /// The line item the given vendor sells under `product_id`, if any. Product and vendor together are unique per
    /// order; two vendors may list the same product.
    pub fn item_for(&self, vendor_id: &str, product_id: &str) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.product_id == product_id && i.vendor_id == vendor_id)
    }

    /// Any line item selling the given product, regardless of vendor.
    pub fn item_for_product(&self, product_id: &str) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub fn item_statuses(&self) -> Vec<ItemStatus> {
        self.items.iter().map(|i| i.status).collect()
    }

    /// Builds the serializable view for the given caller scope. Vendors see only their own items; internal notes are
    /// visible to admins only.
    pub fn view(&self, scope: &ViewScope) -> OrderView {
        let items = self
            .items
            .iter()
            .filter(|i| match scope {
                ViewScope::Vendor(vendor_id) => &i.vendor_id == vendor_id,
                _ => true,
            })
            .map(|i| ItemView::scoped(i, scope))
            .collect();
        OrderView {
            order_id: self.order.order_id.clone(),
            order_number: self.order.order_number.clone(),
            customer_id: self.order.customer_id.clone(),
            order_status: self.order.order_status,
            legacy_status: self.order.legacy_status.clone(),
            payment_status: self.order.payment_status,
            currency: self.order.currency.clone(),
            total_price: self.order.total_price,
            confirmed_at: self.order.confirmed_at,
            shipped_at: self.order.shipped_at,
            delivered_at: self.order.delivered_at,
            cancelled_at: self.order.cancelled_at,
            created_at: self.order.created_at,
            updated_at: self.order.updated_at,
            items,
        }
    }
}

/// Who is looking at an order. Controls item filtering and note visibility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewScope {
    Customer,
    Vendor(String),
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    pub order_id: OrderId,
    pub order_number: String,
    pub customer_id: String,
    pub order_status: OrderStatus,
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
    pub items: Vec<ItemView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemView {
    pub product_id: String,
    pub vendor_id: String,
    pub qty: i64,
    pub unit_price: Money,
    pub line_total: Money,
    pub status: ItemStatus,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub vendor_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_note: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ItemView {
    fn scoped(item: &OrderItem, scope: &ViewScope) -> Self {
        let internal_note = match scope {
            ViewScope::Admin => item.internal_note.clone(),
            _ => None,
        };
        Self {
            product_id: item.product_id.clone(),
            vendor_id: item.vendor_id.clone(),
            qty: item.qty,
            unit_price: item.unit_price,
            line_total: item.line_total,
            status: item.status,
            carrier: item.carrier.clone(),
            tracking_number: item.tracking_number.clone(),
            vendor_note: item.vendor_note.clone(),
            internal_note,
            updated_at: item.updated_at,
        }
    }
}

//--------------------------------------  StatusUpdateResult ---------------------------------------------------------
/// What a status-changing operation hands back: the committed aggregate and the history entries this operation
/// appended, for the caller to relay to notification collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateResult {
    pub order: FullOrder,
    pub history: Vec<NewStatusHistoryEntry>,
}

impl StatusUpdateResult {
    pub fn new(order: FullOrder, history: Vec<NewStatusHistoryEntry>) -> Self {
        Self { order, history }
    }
}

/// An order plus its timeline, as served by the read endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithTimeline {
    #[serde(flatten)]
    pub order: OrderView,
    pub history: Vec<StatusHistoryEntry>,
}

//--------------------------------------   OrderQueryFilter  ---------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub customer_id: Option<String>,
    pub vendor_id: Option<String>,
    pub order_status: Option<Vec<OrderStatus>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl OrderQueryFilter {
    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_customer_id<S: Into<String>>(mut self, customer_id: S) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_vendor_id<S: Into<String>>(mut self, vendor_id: S) -> Self {
        self.vendor_id = Some(vendor_id.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.order_status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() &&
            self.customer_id.is_none() &&
            self.vendor_id.is_none() &&
            self.order_status.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(order_id) = &self.order_id {
            write!(f, "order_id: {order_id}. ")?;
        }
        if let Some(customer_id) = &self.customer_id {
            write!(f, "customer_id: {customer_id}. ")?;
        }
        if let Some(vendor_id) = &self.vendor_id {
            write!(f, "vendor_id: {vendor_id}. ")?;
        }
        if let Some(statuses) = &self.order_status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        Ok(())
    }
}
