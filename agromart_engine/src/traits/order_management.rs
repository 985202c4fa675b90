use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{Money, NewOrder, Order, OrderId, OrderStatusType, StatusChange},
    order_objects::{OrderQueryFilter, PartialCheckoutFailure},
    traits::{CartError, InventoryError},
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("An order cannot move from {from} to {to}")]
    IllegalTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Order {0} belongs to another seller")]
    NotOrderSeller(OrderId),
    #[error("Order {0} belongs to another buyer")]
    NotOrderBuyer(OrderId),
    #[error("Invalid checkout request: {0}")]
    ValidationError(String),
    #[error("Listing {0} in the cart has no seller information")]
    MissingSellerInfo(i64),
    #[error("The declared total of {declared} does not match the order total of {computed}")]
    TotalMismatch { declared: String, computed: Money },
    #[error("The cart is empty")]
    EmptyCart,
    #[error("Checkout only partially succeeded. {}", .0.reason)]
    PartialCheckout(PartialCheckoutFailure),
    #[error("{0}")]
    Cart(#[from] CartError),
    #[error("{0}")]
    Inventory(#[from] InventoryError),
}

impl From<sqlx::Error> for OrderFlowError {
    fn from(e: sqlx::Error) -> Self {
        OrderFlowError::DatabaseError(e.to_string())
    }
}

/// Persistence of seller orders and their status history.
///
/// Status validation lives in [`crate::OrderFlowApi`]. Backends only guarantee that a status update is applied as a
/// compare-and-swap against the status the caller validated, so that two concurrent transitions on the same order
/// are linearized.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// In a single atomic transaction:
    /// * stores the order and its item snapshots,
    /// * records the initial `Pending` entry in the status history at `created_at`,
    /// * deletes the lines of cart `cart_id` that the order consumed. Stock is not touched, since it was reserved when
    ///   the lines were added to the cart.
    ///
    /// Fails with [`OrderFlowError::OrderAlreadyExists`] if the order id has been used before.
    async fn insert_order(&self, order: NewOrder, cart_id: &str) -> Result<Order, OrderFlowError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError>;

    /// Fetches orders matching the filter, oldest first, with their items.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError>;

    /// Moves the order from `expected` to `new_status`, setting `updated_at` to `occurred_at` and appending an entry to
    /// the status history.
    ///
    /// Returns `None` without changing anything if the order is no longer in the `expected` status.
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        expected: OrderStatusType,
        new_status: OrderStatusType,
        occurred_at: DateTime<Utc>,
    ) -> Result<Option<Order>, OrderFlowError>;

    /// Moves a `Pending` order to `Cancelled` and returns every item's quantity to its listing, in one transaction.
    ///
    /// Returns `None` without changing anything if the order is no longer `Pending`.
    async fn cancel_order(&self, order_id: &OrderId, occurred_at: DateTime<Utc>) -> Result<Option<Order>, OrderFlowError>;

    /// The status history of the order, in the order the statuses were entered.
    async fn fetch_status_history(&self, order_id: &OrderId) -> Result<Vec<StatusChange>, OrderFlowError>;
}
