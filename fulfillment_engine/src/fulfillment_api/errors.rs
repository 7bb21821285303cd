use thiserror::Error;

use crate::{db_types::OrderId, fulfillment::TransitionDenied, traits::OrderStoreError};

/// The error taxonomy of the order aggregate service. Every variant carries enough context for the HTTP layer to
/// report a structured `{kind, reason}` pair; nothing is silently swallowed.
#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} has no line item for product {product_id}")]
    ItemNotFound { order_id: OrderId, product_id: String },
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidTransition(#[from] TransitionDenied),
    #[error("Invalid status value: {0}")]
    InvalidStatus(String),
    #[error("No line items on order {0} are eligible for cancellation")]
    NoCancellableItems(OrderId),
    #[error("The update to order {0} kept colliding with concurrent writers and was abandoned")]
    Conflict(OrderId),
    #[error("{0}")]
    StoreError(OrderStoreError),
}

impl OrderFlowError {
    /// Stable machine-readable kind, reported alongside the human-readable reason.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderFlowError::OrderNotFound(_) | OrderFlowError::ItemNotFound { .. } => "NOT_FOUND",
            OrderFlowError::Forbidden(_) => "FORBIDDEN",
            OrderFlowError::InvalidTransition(_) => "INVALID_TRANSITION",
            OrderFlowError::InvalidStatus(_) => "INVALID_STATUS",
            OrderFlowError::NoCancellableItems(_) => "NO_CANCELLABLE_ITEMS",
            OrderFlowError::Conflict(_) => "CONFLICT",
            OrderFlowError::StoreError(_) => "STORE_ERROR",
        }
    }
}

impl From<OrderStoreError> for OrderFlowError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(oid) => OrderFlowError::OrderNotFound(oid),
            OrderStoreError::ItemNotFound { order_id, item } => {
                OrderFlowError::ItemNotFound { order_id, product_id: item.product_id }
            },
            other => OrderFlowError::StoreError(other),
        }
    }
}
