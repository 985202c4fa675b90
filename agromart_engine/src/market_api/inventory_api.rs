use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{Listing, NewListing, StockAdjustment},
    traits::{InventoryError, InventoryManagement},
};

/// `InventoryApi` manages listings and is the only way stock counters change outside of carts and cancellations.
pub struct InventoryApi<B> {
    db: B,
}

impl<B> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi")
    }
}

impl<B> InventoryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement
{
    /// Validates and stores a new listing for the seller named in the listing.
    pub async fn create_listing(&self, listing: NewListing) -> Result<Listing, InventoryError> {
        listing.validate().map_err(InventoryError::ValidationError)?;
        let listing = self.db.insert_listing(listing).await?;
        info!("🔄️🌽️ {} listed {} x {} of {}", listing.seller_email, listing.quantity, listing.unit, listing.name);
        Ok(listing)
    }

    pub async fn listing(&self, listing_id: i64) -> Result<Listing, InventoryError> {
        self.db.fetch_listing(listing_id).await?.ok_or(InventoryError::ListingNotFound(listing_id))
    }

    pub async fn delete_listing(&self, listing_id: i64, seller_email: &str) -> Result<Listing, InventoryError> {
        self.db.delete_listing(listing_id, seller_email).await
    }

    /// Applies a signed change to a listing's stock.
    ///
    /// `delta` must be positive. A decrease that would take the stock below zero fails with
    /// [`InventoryError::InsufficientStock`] and changes nothing. A repeated idempotency key returns the listing as it
    /// is now without applying the change again.
    pub async fn adjust_stock(&self, adjustment: StockAdjustment) -> Result<Listing, InventoryError> {
        if adjustment.delta <= 0 {
            return Err(InventoryError::ValidationError(format!(
                "Quantity change must be a positive number, not {}",
                adjustment.delta
            )));
        }
        let result = self.db.adjust_stock(adjustment.clone()).await;
        match &result {
            Ok(listing) => debug!(
                "🔄️🌽️ Stock {} of {} applied to listing #{}. {} left",
                adjustment.direction, adjustment.delta, listing.id, listing.quantity
            ),
            Err(e) => debug!("🔄️🌽️ Stock change on listing #{} refused. {e}", adjustment.listing_id),
        }
        result
    }

    /// Forgets idempotency keys older than `ttl`.
    pub async fn purge_idempotency_keys(&self, ttl: Duration) -> Result<u64, InventoryError> {
        let cutoff = Utc::now() - ttl;
        self.db.purge_idempotency_keys(cutoff).await
    }
}
