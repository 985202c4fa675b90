//! `SqliteDatabase` is a concrete implementation of an AgroMart fulfilment backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`] module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{begin_write, carts, db_url, drafts, listings, new_pool, orders, transactions};
use crate::{
    db_types::{
        Cart,
        CartLine,
        Listing,
        ListingKind,
        NewListing,
        NewOrder,
        NewTransaction,
        Order,
        OrderId,
        OrderStatusType,
        PaymentDraft,
        StatusChange,
        StockAdjustment,
        Transaction,
    },
    order_objects::OrderQueryFilter,
    traits::{
        CartError,
        CartManagement,
        CatalogError,
        CatalogManagement,
        InventoryError,
        InventoryManagement,
        OrderFlowError,
        OrderManagement,
        PaymentError,
        PaymentManagement,
        SettledPayment,
        UnmatchedPayment,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn insert_listing(&self, listing: NewListing) -> Result<Listing, InventoryError> {
        let mut tx = begin_write(&self.pool).await?;
        let listing = listings::insert_listing(listing, &mut tx).await?;
        tx.commit().await?;
        Ok(listing)
    }

    async fn fetch_listing(&self, listing_id: i64) -> Result<Option<Listing>, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        let listing = listings::fetch_listing(listing_id, &mut conn).await?;
        Ok(listing)
    }

    async fn delete_listing(&self, listing_id: i64, seller_email: &str) -> Result<Listing, InventoryError> {
        let mut tx = begin_write(&self.pool).await?;
        let listing =
            listings::fetch_listing(listing_id, &mut tx).await?.ok_or(InventoryError::ListingNotFound(listing_id))?;
        if listing.seller_email != seller_email {
            debug!("🗃️ {seller_email} tried to delete listing #{listing_id}, which belongs to {}", listing.seller_email);
            return Err(InventoryError::OwnershipMismatch(listing_id));
        }
        listings::delete_listing(listing_id, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Listing #{listing_id} ({}) deleted by {seller_email}", listing.name);
        Ok(listing)
    }

    async fn adjust_stock(&self, adjustment: StockAdjustment) -> Result<Listing, InventoryError> {
        let mut tx = begin_write(&self.pool).await?;
        if let Some(key) = adjustment.idempotency_key.as_deref() {
            if !listings::claim_idempotency_key(key, adjustment.listing_id, &mut tx).await? {
                let listing = listings::fetch_listing(adjustment.listing_id, &mut tx)
                    .await?
                    .ok_or(InventoryError::ListingNotFound(adjustment.listing_id))?;
                tx.commit().await?;
                return Ok(listing);
            }
        }
        let listing = listings::apply_adjustment(&adjustment, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(listing)
    }

    async fn purge_idempotency_keys(&self, cutoff: DateTime<Utc>) -> Result<u64, InventoryError> {
        let mut tx = begin_write(&self.pool).await?;
        let purged = listings::delete_idempotency_keys_before(cutoff, &mut tx).await?;
        tx.commit().await?;
        Ok(purged)
    }
}

impl CartManagement for SqliteDatabase {
    async fn create_cart(&self, buyer_email: &str) -> Result<Cart, CartError> {
        let mut tx = begin_write(&self.pool).await?;
        let cart_id = carts::new_cart_id();
        let cart = carts::insert_cart(&cart_id, buyer_email, &mut tx).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn fetch_cart(&self, cart_id: &str) -> Result<Option<Cart>, CartError> {
        let mut conn = self.pool.acquire().await?;
        let cart = carts::fetch_cart(cart_id, &mut conn).await?;
        Ok(cart)
    }

    async fn fetch_cart_lines(&self, cart_id: &str) -> Result<Vec<CartLine>, CartError> {
        let mut conn = self.pool.acquire().await?;
        let lines = carts::fetch_cart_lines(cart_id, &mut conn).await?;
        Ok(lines)
    }

    async fn add_to_cart(
        &self,
        cart_id: &str,
        listing_id: i64,
        quantity: i64,
        idempotency_key: Option<String>,
    ) -> Result<Vec<CartLine>, CartError> {
        let mut tx = begin_write(&self.pool).await?;
        let lines = carts::add_to_cart(cart_id, listing_id, quantity, idempotency_key.as_deref(), &mut tx).await?;
        tx.commit().await?;
        Ok(lines)
    }

    async fn remove_from_cart(
        &self,
        cart_id: &str,
        listing_id: i64,
        idempotency_key: Option<String>,
    ) -> Result<Vec<CartLine>, CartError> {
        let mut tx = begin_write(&self.pool).await?;
        let lines = carts::remove_from_cart(cart_id, listing_id, idempotency_key.as_deref(), &mut tx).await?;
        tx.commit().await?;
        Ok(lines)
    }

    async fn set_cart_quantity(
        &self,
        cart_id: &str,
        listing_id: i64,
        quantity: i64,
        idempotency_key: Option<String>,
    ) -> Result<Vec<CartLine>, CartError> {
        let mut tx = begin_write(&self.pool).await?;
        let lines =
            carts::set_cart_quantity(cart_id, listing_id, quantity, idempotency_key.as_deref(), &mut tx).await?;
        tx.commit().await?;
        Ok(lines)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder, cart_id: &str) -> Result<Order, OrderFlowError> {
        let mut tx = begin_write(&self.pool).await?;
        let listing_ids = order.listing_ids();
        let order = orders::insert_order(order, &mut tx).await?;
        carts::delete_lines(cart_id, &listing_ids, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        order_id: &OrderId,
        expected: OrderStatusType,
        new_status: OrderStatusType,
        occurred_at: DateTime<Utc>,
    ) -> Result<Option<Order>, OrderFlowError> {
        let mut tx = begin_write(&self.pool).await?;
        let order = orders::update_order_status(order_id, expected, new_status, occurred_at, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn cancel_order(&self, order_id: &OrderId, occurred_at: DateTime<Utc>) -> Result<Option<Order>, OrderFlowError> {
        let mut tx = begin_write(&self.pool).await?;
        let cancelled = orders::update_order_status(
            order_id,
            OrderStatusType::Pending,
            OrderStatusType::Cancelled,
            occurred_at,
            &mut tx,
        )
        .await?;
        let Some(order) = cancelled else {
            return Ok(None);
        };
        for item in &order.items {
            carts::release_stock(item.listing_id, item.quantity, occurred_at, &mut tx).await?;
        }
        tx.commit().await?;
        info!("🗃️ Order [{order_id}] cancelled. {} items returned to stock", order.items.len());
        Ok(Some(order))
    }

    async fn fetch_status_history(&self, order_id: &OrderId) -> Result<Vec<StatusChange>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let history = orders::fetch_status_history(order_id, &mut conn).await?;
        Ok(history)
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn stage_payment_draft(&self, draft: PaymentDraft) -> Result<PaymentDraft, PaymentError> {
        let mut tx = begin_write(&self.pool).await?;
        let draft = drafts::insert_draft(draft, &mut tx).await?;
        tx.commit().await?;
        Ok(draft)
    }

    async fn fetch_payment_draft(&self, transaction_uuid: &str) -> Result<Option<PaymentDraft>, PaymentError> {
        let mut conn = self.pool.acquire().await?;
        let draft = drafts::fetch_draft(transaction_uuid, &mut conn).await?;
        Ok(draft)
    }

    async fn fetch_transaction_by_uuid(&self, transaction_uuid: &str) -> Result<Option<Transaction>, PaymentError> {
        let mut conn = self.pool.acquire().await?;
        let tx = transactions::fetch_transaction_by_uuid(transaction_uuid, &mut conn).await?;
        Ok(tx)
    }

    async fn fetch_transaction(&self, id: i64) -> Result<Option<Transaction>, PaymentError> {
        let mut conn = self.pool.acquire().await?;
        let tx = transactions::fetch_transaction(id, &mut conn).await?;
        Ok(tx)
    }

    async fn settle_payment(
        &self,
        draft: &PaymentDraft,
        new_orders: Vec<NewOrder>,
        transaction: NewTransaction,
    ) -> Result<SettledPayment, PaymentError> {
        let mut tx = begin_write(&self.pool).await?;
        if let Some(existing) = transactions::fetch_transaction_by_uuid(&draft.transaction_uuid, &mut tx).await? {
            let query = OrderQueryFilter::default().with_transaction_id(existing.transaction_id.clone());
            let settled = orders::search_orders(query, &mut tx).await?;
            tx.commit().await?;
            debug!("🗃️ Payment {} was settled before. Returning the existing records.", draft.transaction_uuid);
            return Ok(SettledPayment { orders: settled, transaction: existing, replayed: true });
        }
        let cart_lines = carts::fetch_cart_lines(&draft.cart_id, &mut tx).await?;
        if let Some(changed) = carts::first_changed_line(&draft.lines.0, &cart_lines) {
            let transaction =
                NewTransaction { needs_review: true, seller_email: None, order_details: None, ..transaction };
            let transaction = transactions::insert_transaction(transaction, &mut tx).await?;
            drafts::delete_draft(&draft.transaction_uuid, &mut tx).await?;
            tx.commit().await?;
            warn!(
                "🗃️ Cart {} changed after payment {} was initiated (listing #{changed}). No orders were created and \
                 transaction #{} needs review.",
                draft.cart_id, draft.transaction_uuid, transaction.id
            );
            return Ok(SettledPayment { orders: vec![], transaction, replayed: false });
        }
        let mut settled = Vec::with_capacity(new_orders.len());
        for order in new_orders {
            let listing_ids = order.listing_ids();
            let order = orders::insert_order(order, &mut tx).await?;
            carts::delete_lines(&draft.cart_id, &listing_ids, &mut tx).await?;
            settled.push(order);
        }
        let transaction = transactions::insert_transaction(transaction, &mut tx).await?;
        drafts::delete_draft(&draft.transaction_uuid, &mut tx).await?;
        tx.commit().await?;
        info!(
            "🗃️ Payment {} settled as transaction #{} with {} orders",
            draft.transaction_uuid,
            transaction.id,
            settled.len()
        );
        Ok(SettledPayment { orders: settled, transaction, replayed: false })
    }

    async fn record_unmatched_payment(&self, transaction: NewTransaction) -> Result<UnmatchedPayment, PaymentError> {
        let mut tx = begin_write(&self.pool).await?;
        if let Some(existing) = transactions::fetch_transaction_by_uuid(&transaction.transaction_uuid, &mut tx).await? {
            tx.commit().await?;
            return Ok(UnmatchedPayment { transaction: existing, replayed: true });
        }
        let transaction = transactions::insert_transaction(transaction, &mut tx).await?;
        tx.commit().await?;
        warn!(
            "🗃️ Payment {} had no staged order. Transaction #{} was recorded for manual review.",
            transaction.transaction_uuid, transaction.id
        );
        Ok(UnmatchedPayment { transaction, replayed: false })
    }

    async fn fetch_transactions_for_email(&self, email: &str) -> Result<Vec<Transaction>, PaymentError> {
        let mut conn = self.pool.acquire().await?;
        let result = transactions::fetch_transactions_for_email(email, &mut conn).await?;
        Ok(result)
    }

    async fn delete_transaction(&self, id: i64) -> Result<(), PaymentError> {
        let mut tx = begin_write(&self.pool).await?;
        let deleted = transactions::delete_transaction(id, &mut tx).await?;
        tx.commit().await?;
        match deleted {
            0 => Err(PaymentError::TransactionNotFound(id)),
            _ => Ok(()),
        }
    }

    async fn purge_stale_drafts(&self, cutoff: DateTime<Utc>) -> Result<Vec<PaymentDraft>, PaymentError> {
        let mut tx = begin_write(&self.pool).await?;
        let purged = drafts::delete_drafts_created_before(cutoff, &mut tx).await?;
        tx.commit().await?;
        Ok(purged)
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_listings(&self, kind: ListingKind) -> Result<Vec<Listing>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let result = listings::fetch_listings(kind, None, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_listings_by_seller(
        &self,
        kind: ListingKind,
        seller_email: &str,
    ) -> Result<Vec<Listing>, CatalogError> {
        let mut conn = self.pool.acquire().await?;
        let result = listings::fetch_listings(kind, Some(seller_email), &mut conn).await?;
        Ok(result)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the database schema up to date.
    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
