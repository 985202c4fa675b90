use chrono::{DateTime, Utc};
use log::{debug, trace, warn};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use sqlx::{QueryBuilder, SqliteConnection};

use super::listings;
use crate::{
    db_types::{Cart, CartLine, Listing, StockAdjustment},
    traits::{CartError, InventoryError},
};

/// Generates a fresh cart id of the form `cart-{millis}-{random}`
pub fn new_cart_id() -> String {
    let suffix: String = thread_rng().sample_iter(&Alphanumeric).take(8).map(char::from).collect();
    format!("cart-{}-{suffix}", Utc::now().timestamp_millis())
}

pub async fn insert_cart(cart_id: &str, buyer_email: &str, conn: &mut SqliteConnection) -> Result<Cart, sqlx::Error> {
    let now = Utc::now();
    let cart = sqlx::query_as(
        r#"
            INSERT INTO carts (cart_id, buyer_email, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING *;
        "#,
    )
    .bind(cart_id)
    .bind(buyer_email)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Cart {cart_id} created for {buyer_email}");
    Ok(cart)
}

pub async fn fetch_cart(cart_id: &str, conn: &mut SqliteConnection) -> Result<Option<Cart>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM carts WHERE cart_id = $1").bind(cart_id).fetch_optional(conn).await
}

/// The lines of the cart, in the order they were first added.
pub async fn fetch_cart_lines(cart_id: &str, conn: &mut SqliteConnection) -> Result<Vec<CartLine>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT listing_id, kind, name, image, category, seller_email, unit_price, cart_quantity
            FROM cart_lines
            WHERE cart_id = $1
            ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(cart_id)
    .fetch_all(conn)
    .await
}

pub async fn fetch_cart_line(
    cart_id: &str,
    listing_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<CartLine>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT listing_id, kind, name, image, category, seller_email, unit_price, cart_quantity
            FROM cart_lines
            WHERE cart_id = $1 AND listing_id = $2
        "#,
    )
    .bind(cart_id)
    .bind(listing_id)
    .fetch_optional(conn)
    .await
}

/// Adds `quantity` units of the listing to the cart. If the listing is already in the cart, the line quantity is
/// increased and the original snapshot is kept.
async fn upsert_line(
    cart_id: &str,
    listing: &Listing,
    quantity: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO cart_lines (
                cart_id,
                listing_id,
                kind,
                name,
                image,
                category,
                seller_email,
                unit_price,
                cart_quantity,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            ON CONFLICT (cart_id, listing_id) DO UPDATE SET
                cart_quantity = cart_quantity + excluded.cart_quantity,
                updated_at = excluded.updated_at
        "#,
    )
    .bind(cart_id)
    .bind(listing.id)
    .bind(listing.kind)
    .bind(&listing.name)
    .bind(&listing.image)
    .bind(listing.category)
    .bind(&listing.seller_email)
    .bind(listing.price)
    .bind(quantity)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

async fn set_line_quantity(
    cart_id: &str,
    listing_id: i64,
    quantity: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE cart_lines SET cart_quantity = $1, updated_at = $2 WHERE cart_id = $3 AND listing_id = $4")
        .bind(quantity)
        .bind(now)
        .bind(cart_id)
        .bind(listing_id)
        .execute(conn)
        .await?;
    Ok(())
}

async fn delete_line(cart_id: &str, listing_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1 AND listing_id = $2")
        .bind(cart_id)
        .bind(listing_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Removes the given listings from the cart without touching stock. This is used when the lines are converted into an
/// order, since the stock they reserved now belongs to the order.
pub async fn delete_lines(cart_id: &str, listing_ids: &[i64], conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    if listing_ids.is_empty() {
        return Ok(0);
    }
    let mut builder = QueryBuilder::new("DELETE FROM cart_lines WHERE cart_id = ");
    builder.push_bind(cart_id.to_string());
    builder.push(" AND listing_id IN (");
    let mut ids = builder.separated(", ");
    for id in listing_ids {
        ids.push_bind(*id);
    }
    builder.push(")");
    trace!("🗃️ Executing query: {}", builder.sql());
    let result = builder.build().execute(conn).await?;
    debug!("🗃️ {} lines removed from cart {cart_id}", result.rows_affected());
    Ok(result.rows_affected())
}

/// Compares a snapshot of a cart with its current lines. Returns the listing id of the first snapshot line that is no
/// longer in the cart, or is there with a different quantity. Lines added to the cart since the snapshot are ignored.
pub fn first_changed_line(snapshot: &[CartLine], current: &[CartLine]) -> Option<i64> {
    snapshot
        .iter()
        .find(|line| {
            !current.iter().any(|c| c.listing_id == line.listing_id && c.cart_quantity == line.cart_quantity)
        })
        .map(|line| line.listing_id)
}

async fn touch_cart(cart_id: &str, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE carts SET updated_at = $1 WHERE cart_id = $2").bind(now).bind(cart_id).execute(conn).await?;
    Ok(())
}

async fn ensure_cart_exists(cart_id: &str, conn: &mut SqliteConnection) -> Result<(), CartError> {
    match fetch_cart(cart_id, conn).await? {
        Some(_) => Ok(()),
        None => Err(CartError::CartNotFound(cart_id.to_string())),
    }
}

/// Claims the idempotency key, if one was given. Returns `false` if the key has been used before.
async fn claim_key(key: Option<&str>, listing_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    match key {
        Some(key) => listings::claim_idempotency_key(key, listing_id, conn).await,
        None => Ok(true),
    }
}

/// Returns stock to a listing. A listing that has been deleted in the meantime has nowhere to return the stock to, so
/// the release is skipped.
pub(crate) async fn release_stock(
    listing_id: i64,
    quantity: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), InventoryError> {
    let adjustment = StockAdjustment::increase(listing_id, quantity);
    match listings::apply_adjustment(&adjustment, now, conn).await {
        Ok(_) => Ok(()),
        Err(InventoryError::ListingNotFound(id)) => {
            warn!("🗃️ Listing #{id} no longer exists. {quantity} units could not be returned to stock.");
            Ok(())
        },
        Err(e) => Err(e),
    }
}

/// Reserves stock for the listing and adds it to the cart. Call this inside a transaction.
pub async fn add_to_cart(
    cart_id: &str,
    listing_id: i64,
    quantity: i64,
    idempotency_key: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Vec<CartLine>, CartError> {
    if quantity < 1 {
        return Err(CartError::ValidationError(format!("Quantity must be at least 1, not {quantity}")));
    }
    ensure_cart_exists(cart_id, conn).await?;
    if claim_key(idempotency_key, listing_id, conn).await? {
        let now = Utc::now();
        let listing = listings::apply_adjustment(&StockAdjustment::decrease(listing_id, quantity), now, conn).await?;
        upsert_line(cart_id, &listing, quantity, now, conn).await?;
        touch_cart(cart_id, now, conn).await?;
        debug!("🗃️ {quantity} of listing #{listing_id} added to cart {cart_id}");
    }
    let lines = fetch_cart_lines(cart_id, conn).await?;
    Ok(lines)
}

/// Removes the line from the cart and returns its reserved stock. Call this inside a transaction.
pub async fn remove_from_cart(
    cart_id: &str,
    listing_id: i64,
    idempotency_key: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Vec<CartLine>, CartError> {
    ensure_cart_exists(cart_id, conn).await?;
    if claim_key(idempotency_key, listing_id, conn).await? {
        let line = fetch_cart_line(cart_id, listing_id, conn)
            .await?
            .ok_or_else(|| CartError::LineNotFound { cart_id: cart_id.to_string(), listing_id })?;
        let now = Utc::now();
        release_stock(listing_id, line.cart_quantity, now, conn).await?;
        delete_line(cart_id, listing_id, conn).await?;
        touch_cart(cart_id, now, conn).await?;
        debug!("🗃️ Listing #{listing_id} removed from cart {cart_id}. {} units released", line.cart_quantity);
    }
    let lines = fetch_cart_lines(cart_id, conn).await?;
    Ok(lines)
}

/// Sets the quantity of a cart line, reserving or releasing the difference. Call this inside a transaction.
pub async fn set_cart_quantity(
    cart_id: &str,
    listing_id: i64,
    quantity: i64,
    idempotency_key: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Vec<CartLine>, CartError> {
    if quantity < 1 {
        return Err(CartError::ValidationError(format!("Quantity must be at least 1, not {quantity}")));
    }
    ensure_cart_exists(cart_id, conn).await?;
    if claim_key(idempotency_key, listing_id, conn).await? {
        let line = fetch_cart_line(cart_id, listing_id, conn)
            .await?
            .ok_or_else(|| CartError::LineNotFound { cart_id: cart_id.to_string(), listing_id })?;
        let now = Utc::now();
        let diff = quantity - line.cart_quantity;
        if diff > 0 {
            listings::apply_adjustment(&StockAdjustment::decrease(listing_id, diff), now, conn).await?;
        } else if diff < 0 {
            release_stock(listing_id, -diff, now, conn).await?;
        }
        set_line_quantity(cart_id, listing_id, quantity, now, conn).await?;
        touch_cart(cart_id, now, conn).await?;
        debug!("🗃️ Listing #{listing_id} in cart {cart_id} set to {quantity} (was {})", line.cart_quantity);
    }
    let lines = fetch_cart_lines(cart_id, conn).await?;
    Ok(lines)
}
