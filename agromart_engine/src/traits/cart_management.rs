use thiserror::Error;

use crate::{
    db_types::{Cart, CartLine},
    traits::InventoryError,
};

#[derive(Debug, Clone, Error)]
pub enum CartError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Cart {0} does not exist")]
    CartNotFound(String),
    #[error("Cart {0} belongs to another buyer")]
    NotCartOwner(String),
    #[error("Listing {listing_id} is not in cart {cart_id}")]
    LineNotFound { cart_id: String, listing_id: i64 },
    #[error("Invalid cart request: {0}")]
    ValidationError(String),
    #[error("{0}")]
    Inventory(#[from] InventoryError),
}

impl From<sqlx::Error> for CartError {
    fn from(e: sqlx::Error) -> Self {
        CartError::DatabaseError(e.to_string())
    }
}

/// Server-owned shopping carts.
///
/// A cart line is a stock reservation: every method that changes a line's quantity adjusts the listing's stock by the
/// same amount, in the same database transaction. All mutating methods return the full cart after the change. When an
/// idempotency key is supplied and has already been used, nothing is changed and the current cart is returned.
#[allow(async_fn_in_trait)]
pub trait CartManagement: Clone {
    /// Creates an empty cart for the buyer and returns it. The cart id is generated by the server.
    async fn create_cart(&self, buyer_email: &str) -> Result<Cart, CartError>;

    async fn fetch_cart(&self, cart_id: &str) -> Result<Option<Cart>, CartError>;

    async fn fetch_cart_lines(&self, cart_id: &str) -> Result<Vec<CartLine>, CartError>;

    /// Reserves `quantity` units of the listing and adds them to the cart. If the listing is already in the cart, the
    /// line quantity is increased.
    async fn add_to_cart(
        &self,
        cart_id: &str,
        listing_id: i64,
        quantity: i64,
        idempotency_key: Option<String>,
    ) -> Result<Vec<CartLine>, CartError>;

    /// Removes the line from the cart and releases its full quantity back to the listing.
    async fn remove_from_cart(
        &self,
        cart_id: &str,
        listing_id: i64,
        idempotency_key: Option<String>,
    ) -> Result<Vec<CartLine>, CartError>;

    /// Sets the quantity of a line, reserving or releasing the difference between the old and new quantity.
    async fn set_cart_quantity(
        &self,
        cart_id: &str,
        listing_id: i64,
        quantity: i64,
        idempotency_key: Option<String>,
    ) -> Result<Vec<CartLine>, CartError>;
}
