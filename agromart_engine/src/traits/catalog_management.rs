use thiserror::Error;

use crate::db_types::{Listing, ListingKind};

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        CatalogError::DatabaseError(e.to_string())
    }
}

/// Read-only listing queries used for discovery.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    /// Fetches listings of the given kind, newest first.
    async fn fetch_listings(&self, kind: ListingKind) -> Result<Vec<Listing>, CatalogError>;

    /// Fetches one seller's listings of the given kind, newest first.
    async fn fetch_listings_by_seller(&self, kind: ListingKind, seller_email: &str)
        -> Result<Vec<Listing>, CatalogError>;
}
