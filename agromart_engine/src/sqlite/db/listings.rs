use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Listing, ListingKind, NewListing, StockAdjustment, StockDirection},
    traits::InventoryError,
};

/// Inserts a new listing using the given connection. This is not atomic. You can embed this call inside a transaction
/// if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
pub async fn insert_listing(listing: NewListing, conn: &mut SqliteConnection) -> Result<Listing, sqlx::Error> {
    let now = Utc::now();
    let listing = sqlx::query_as::<_, Listing>(
        r#"
            INSERT INTO listings (
                kind,
                name,
                price,
                category,
                quantity,
                unit,
                description,
                image,
                seller_email,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *;
        "#,
    )
    .bind(listing.kind)
    .bind(listing.name)
    .bind(listing.price)
    .bind(listing.category)
    .bind(listing.quantity)
    .bind(listing.unit)
    .bind(listing.description)
    .bind(listing.image)
    .bind(listing.seller_email)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Listing #{} ({}) created for {}", listing.id, listing.name, listing.seller_email);
    Ok(listing)
}

pub async fn fetch_listing(listing_id: i64, conn: &mut SqliteConnection) -> Result<Option<Listing>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM listings WHERE id = $1").bind(listing_id).fetch_optional(conn).await
}

pub async fn delete_listing(listing_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM listings WHERE id = $1").bind(listing_id).execute(conn).await?;
    Ok(result.rows_affected())
}

/// Fetches listings of the given kind, newest first, optionally restricted to one seller.
pub async fn fetch_listings(
    kind: ListingKind,
    seller_email: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Listing>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM listings WHERE kind = ");
    builder.push_bind(kind);
    if let Some(seller) = seller_email {
        builder.push(" AND seller_email = ");
        builder.push_bind(seller.to_string());
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let listings = builder.build_query_as::<Listing>().fetch_all(conn).await?;
    Ok(listings)
}

/// Marks an idempotency key as used for the given listing. Keys are scoped to a listing, so the same key sent for a
/// different listing is a new request.
///
/// Returns `true` if the key was claimed by this call, or `false` if it had been claimed before, in which case the
/// caller must not apply its change again. Call this inside the same transaction as the change it guards, so that a
/// failed change releases the key again.
pub async fn claim_idempotency_key(
    key: &str,
    listing_id: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO stock_idempotency_keys (idempotency_key, listing_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (idempotency_key, listing_id) DO NOTHING
        "#,
    )
    .bind(key)
    .bind(listing_id)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    let claimed = result.rows_affected() == 1;
    if !claimed {
        debug!("🗃️ Idempotency key {key} has been used before. The stock change will not be repeated.");
    }
    Ok(claimed)
}

/// Forgets idempotency keys claimed before `cutoff`. Returns the number of keys removed.
pub async fn delete_idempotency_keys_before(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM stock_idempotency_keys WHERE created_at < $1").bind(cutoff).execute(conn).await?;
    if result.rows_affected() > 0 {
        debug!("🗃️ {} expired idempotency keys deleted", result.rows_affected());
    }
    Ok(result.rows_affected())
}

/// Applies the stock change in `adjustment` as a single conditional update. The idempotency key in the adjustment is
/// ignored here; see [`claim_idempotency_key`].
///
/// A decrease only succeeds if the resulting quantity is not negative. The check and the write are the same SQL
/// statement, so concurrent decreases of one listing are linearized by the database.
pub async fn apply_adjustment(
    adjustment: &StockAdjustment,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Listing, InventoryError> {
    if adjustment.delta <= 0 {
        return Err(InventoryError::ValidationError(format!(
            "Quantity change must be a positive number, not {}",
            adjustment.delta
        )));
    }
    let listing_id = adjustment.listing_id;
    let current = fetch_listing(listing_id, &mut *conn).await?.ok_or(InventoryError::ListingNotFound(listing_id))?;
    if let Some(seller) = &adjustment.expected_seller {
        if seller != &current.seller_email {
            debug!("🗃️ Stock change on listing #{listing_id} refused. {seller} is not the seller.");
            return Err(InventoryError::OwnershipMismatch(listing_id));
        }
    }
    let delta = adjustment.signed_delta();
    let updated = sqlx::query_as::<_, Listing>(
        r#"
            UPDATE listings
            SET quantity = quantity + $1, updated_at = $2
            WHERE id = $3 AND quantity + $1 >= 0
            RETURNING *;
        "#,
    )
    .bind(delta)
    .bind(now)
    .bind(listing_id)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(listing) => {
            trace!(
                "🗃️ Listing #{listing_id} stock {} by {}. {} remaining",
                adjustment.direction,
                adjustment.delta,
                listing.quantity
            );
            Ok(listing)
        },
        None => {
            let listing = fetch_listing(listing_id, conn).await?.ok_or(InventoryError::ListingNotFound(listing_id))?;
            debug_assert_eq!(adjustment.direction, StockDirection::Decrease);
            debug!(
                "🗃️ Listing #{listing_id} has {} in stock. A decrease of {} was refused.",
                listing.quantity, adjustment.delta
            );
            Err(InventoryError::InsufficientStock {
                listing_id,
                available: listing.quantity,
                requested: adjustment.delta,
            })
        },
    }
}
