use std::fmt::Debug;

use log::*;

use crate::{
    db_types::Cart,
    order_objects::CartView,
    traits::{CartError, CartManagement},
};

/// `CartApi` manages server-owned carts. Every line in a cart holds a stock reservation on its listing.
///
/// All methods take the caller's email and fail with [`CartError::NotCartOwner`] if the cart belongs to someone else.
pub struct CartApi<B> {
    db: B,
}

impl<B> Debug for CartApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CartApi")
    }
}

impl<B> CartApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> CartApi<B>
where B: CartManagement
{
    pub async fn create_cart(&self, buyer_email: &str) -> Result<Cart, CartError> {
        let cart = self.db.create_cart(buyer_email).await?;
        debug!("🔄️🛒️ New cart {} for {buyer_email}", cart.cart_id);
        Ok(cart)
    }

    async fn owned_cart(&self, cart_id: &str, buyer_email: &str) -> Result<Cart, CartError> {
        let cart = self.db.fetch_cart(cart_id).await?.ok_or_else(|| CartError::CartNotFound(cart_id.to_string()))?;
        if cart.buyer_email != buyer_email {
            warn!("🔄️🛒️ {buyer_email} tried to use cart {cart_id}, which belongs to {}", cart.buyer_email);
            return Err(CartError::NotCartOwner(cart_id.to_string()));
        }
        Ok(cart)
    }

    pub async fn cart(&self, cart_id: &str, buyer_email: &str) -> Result<CartView, CartError> {
        let cart = self.owned_cart(cart_id, buyer_email).await?;
        let lines = self.db.fetch_cart_lines(cart_id).await?;
        Ok(CartView::new(cart.cart_id, cart.buyer_email, lines))
    }

    /// Reserves `quantity` units of the listing and adds them to the cart.
    pub async fn add_to_cart(
        &self,
        cart_id: &str,
        buyer_email: &str,
        listing_id: i64,
        quantity: i64,
        idempotency_key: Option<String>,
    ) -> Result<CartView, CartError> {
        if quantity < 1 {
            return Err(CartError::ValidationError(format!("Quantity must be at least 1, not {quantity}")));
        }
        let cart = self.owned_cart(cart_id, buyer_email).await?;
        let lines = self.db.add_to_cart(cart_id, listing_id, quantity, idempotency_key).await?;
        Ok(CartView::new(cart.cart_id, cart.buyer_email, lines))
    }

    /// Removes the line and returns its full quantity to stock.
    pub async fn remove_from_cart(
        &self,
        cart_id: &str,
        buyer_email: &str,
        listing_id: i64,
        idempotency_key: Option<String>,
    ) -> Result<CartView, CartError> {
        let cart = self.owned_cart(cart_id, buyer_email).await?;
        let lines = self.db.remove_from_cart(cart_id, listing_id, idempotency_key).await?;
        Ok(CartView::new(cart.cart_id, cart.buyer_email, lines))
    }

    /// Sets the quantity of a cart line. Setting it to zero removes the line.
    pub async fn update_quantity(
        &self,
        cart_id: &str,
        buyer_email: &str,
        listing_id: i64,
        quantity: i64,
        idempotency_key: Option<String>,
    ) -> Result<CartView, CartError> {
        if quantity < 0 {
            return Err(CartError::ValidationError(format!("Quantity cannot be negative ({quantity})")));
        }
        if quantity == 0 {
            return self.remove_from_cart(cart_id, buyer_email, listing_id, idempotency_key).await;
        }
        let cart = self.owned_cart(cart_id, buyer_email).await?;
        let lines = self.db.set_cart_quantity(cart_id, listing_id, quantity, idempotency_key).await?;
        Ok(CartView::new(cart.cart_id, cart.buyer_email, lines))
    }
}
