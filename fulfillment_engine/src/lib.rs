//! Marketplace Fulfillment Engine
//!
//! The fulfillment engine owns the multi-vendor order fulfillment state machine: the rules governing how a single
//! customer order, whose line items belong to different vendors, progresses through per-item and aggregate order
//! statuses, with transition validation and an immutable audit trail.
//!
//! The library is divided into three main sections:
//! 1. The pure state machine ([`mod@fulfillment`]): transition legality for item statuses and the reduction of item
//!    statuses into the single customer-facing order status. No I/O, trivially testable.
//! 2. The persistence contract ([`mod@traits`]) and its SQLite implementation. The store applies a whole change set
//!    (order row, item rows, history entries) in one version-guarded transaction, so a lost-update race between two
//!    vendors on the same order is detected rather than silently dropped.
//! 3. The public API ([`OrderFlowApi`]): load, validate, mutate, aggregate, persist, record history, publish events.
//!
//! The engine also provides a set of events that can be subscribed to. Notification and support-chat collaborators
//! hook into these rather than being called from the state machine directly.
pub mod db_types;
pub mod events;
pub mod fulfillment;
mod fulfillment_api;
pub mod helpers;
#[cfg(feature = "sqlite")]
pub mod test_utils;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use fulfillment_api::{
    errors::OrderFlowError,
    order_flow_api::OrderFlowApi,
    order_objects,
};
