use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db_types::{Listing, NewListing, StockAdjustment};

#[derive(Debug, Clone, Error)]
pub enum InventoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Listing {0} does not exist")]
    ListingNotFound(i64),
    #[error("Not enough quantity available. Listing {listing_id} has {available} left, but {requested} was requested")]
    InsufficientStock { listing_id: i64, available: i64, requested: i64 },
    #[error("Listing {0} does not belong to the given seller")]
    OwnershipMismatch(i64),
    #[error("Invalid listing request: {0}")]
    ValidationError(String),
}

impl From<sqlx::Error> for InventoryError {
    fn from(e: sqlx::Error) -> Self {
        InventoryError::DatabaseError(e.to_string())
    }
}

/// The `InventoryManagement` trait defines how listings and their stock counters are stored.
///
/// Stock is never read and then written back. Backends must apply a decrease as a single conditional update that only
/// succeeds if the resulting quantity is not negative, so that two buyers racing for the last unit cannot both win.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement: Clone {
    /// Stores a new listing. The listing is assumed to have been validated already.
    async fn insert_listing(&self, listing: NewListing) -> Result<Listing, InventoryError>;

    async fn fetch_listing(&self, listing_id: i64) -> Result<Option<Listing>, InventoryError>;

    /// Deletes the listing if it belongs to `seller_email`.
    ///
    /// ## Failure modes
    /// * [`InventoryError::ListingNotFound`] if the listing does not exist.
    /// * [`InventoryError::OwnershipMismatch`] if the listing belongs to another seller. Nothing is deleted.
    async fn delete_listing(&self, listing_id: i64, seller_email: &str) -> Result<Listing, InventoryError>;

    /// Applies a stock adjustment and returns the listing as it is after the change.
    ///
    /// * A decrease that would take the quantity below zero fails with [`InventoryError::InsufficientStock`] and
    ///   leaves the counter untouched.
    /// * If `expected_seller` is set and does not match the listing's seller, the call fails with
    ///   [`InventoryError::OwnershipMismatch`].
    /// * If `idempotency_key` has been seen before for this listing, the adjustment is not applied again and the current listing is
    ///   returned.
    async fn adjust_stock(&self, adjustment: StockAdjustment) -> Result<Listing, InventoryError>;

    /// Forgets the idempotency keys claimed before `cutoff`, returning how many were removed. A retry that arrives
    /// after its key was purged is applied as a new request.
    async fn purge_idempotency_keys(&self, cutoff: DateTime<Utc>) -> Result<u64, InventoryError>;
}
