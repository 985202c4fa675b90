use serde::{Deserialize, Serialize};

use crate::db_types::{Order, Transaction};

/// The result of settling a staged payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettledPayment {
    pub orders: Vec<Order>,
    pub transaction: Transaction,
    /// True if the payment had already been settled by an earlier callback, and nothing new was written.
    pub replayed: bool,
}

/// The result of recording a confirmed payment that could not be matched to a staged draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmatchedPayment {
    pub transaction: Transaction,
    pub replayed: bool,
}
