//! The persistence contract for the order aggregate. Backends implement [`OrderStore`]; the engine's public API is
//! generic over it, so the state machine can be exercised against mocks or an embedded database alike.
mod data_objects;
mod order_store;

pub use data_objects::{ItemPatch, MilestoneStamps, StatusChangeSet, TrackingUpdate};
pub use order_store::{OrderStore, OrderStoreError};
