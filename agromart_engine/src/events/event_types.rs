use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, Transaction};

/// Emitted once for every seller order that is committed, whether by a cash checkout or a settled online payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// Emitted after an order has moved to a new status. `order` is the order after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub old_status: OrderStatusType,
    pub order: Order,
}

impl OrderStatusChangedEvent {
    pub fn new(old_status: OrderStatusType, order: Order) -> Self {
        Self { old_status, order }
    }
}

/// Emitted when a gateway payment has been recorded for the first time. Replayed callbacks do not emit this event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReconciledEvent {
    pub transaction: Transaction,
    pub orders: Vec<Order>,
}

impl PaymentReconciledEvent {
    pub fn new(transaction: Transaction, orders: Vec<Order>) -> Self {
        Self { transaction, orders }
    }

    pub fn needs_review(&self) -> bool {
        self.transaction.needs_review
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderCreated(OrderCreatedEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
    PaymentReconciled(PaymentReconciledEvent),
}
