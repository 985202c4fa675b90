use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewOrder, NewTransaction, PaymentDraft, Transaction},
    traits::{CartError, OrderFlowError, SettledPayment, UnmatchedPayment},
};

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The payment signature could not be verified")]
    SignatureMismatch,
    #[error("There is no staged payment for transaction {0}")]
    DraftNotFound(String),
    #[error("The staged payment {0} belongs to another buyer")]
    NotDraftOwner(String),
    #[error("Transaction {0} does not exist")]
    TransactionNotFound(i64),
    #[error("Transaction {0} belongs to another buyer")]
    NotTransactionOwner(i64),
    #[error("Could not read the payment gateway callback: {0}")]
    InvalidCallback(String),
    #[error("The payment gateway reported status {0}")]
    PaymentNotCompleted(String),
    #[error("Payment configuration error: {0}")]
    ConfigurationError(String),
    #[error("{0}")]
    Checkout(#[from] OrderFlowError),
    #[error("{0}")]
    Cart(#[from] CartError),
}

impl From<sqlx::Error> for PaymentError {
    fn from(e: sqlx::Error) -> Self {
        PaymentError::DatabaseError(e.to_string())
    }
}

/// Storage for payment drafts and transactions.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement: Clone {
    /// Stores a payment draft, keyed by its transaction uuid.
    async fn stage_payment_draft(&self, draft: PaymentDraft) -> Result<PaymentDraft, PaymentError>;

    async fn fetch_payment_draft(&self, transaction_uuid: &str) -> Result<Option<PaymentDraft>, PaymentError>;

    async fn fetch_transaction_by_uuid(&self, transaction_uuid: &str) -> Result<Option<Transaction>, PaymentError>;

    async fn fetch_transaction(&self, id: i64) -> Result<Option<Transaction>, PaymentError>;

    /// Settles a gateway payment in a single atomic transaction:
    /// * if a transaction already exists for the draft's uuid, nothing is written and the existing records are
    ///   returned with `replayed` set,
    /// * otherwise every order is stored (removing its lines from the draft's cart), the transaction is stored, and
    ///   the draft is deleted.
    ///
    /// If anything fails, nothing is written and the draft is retained.
    async fn settle_payment(
        &self,
        draft: &PaymentDraft,
        orders: Vec<NewOrder>,
        transaction: NewTransaction,
    ) -> Result<SettledPayment, PaymentError>;

    /// Stores a transaction for a confirmed payment that has no staged draft. Idempotent on the transaction uuid.
    async fn record_unmatched_payment(&self, transaction: NewTransaction) -> Result<UnmatchedPayment, PaymentError>;

    /// All transactions where `email` is the buyer or the seller, newest first.
    async fn fetch_transactions_for_email(&self, email: &str) -> Result<Vec<Transaction>, PaymentError>;

    async fn delete_transaction(&self, id: i64) -> Result<(), PaymentError>;

    /// Deletes payment drafts created before `cutoff` and returns them.
    async fn purge_stale_drafts(&self, cutoff: DateTime<Utc>) -> Result<Vec<PaymentDraft>, PaymentError>;
}
