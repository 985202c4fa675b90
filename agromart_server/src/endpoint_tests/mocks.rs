use agromart_engine::{
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
use chrono::{DateTime, Utc};
use mockall::mock;

mock! {
    pub Backend {}

    impl Clone for Backend {
        fn clone(&self) -> Self;
    }

    impl InventoryManagement for Backend {
        async fn insert_listing(&self, listing: NewListing) -> Result<Listing, InventoryError>;
        async fn fetch_listing(&self, listing_id: i64) -> Result<Option<Listing>, InventoryError>;
        async fn delete_listing(&self, listing_id: i64, seller_email: &str) -> Result<Listing, InventoryError>;
        async fn adjust_stock(&self, adjustment: StockAdjustment) -> Result<Listing, InventoryError>;
        async fn purge_idempotency_keys(&self, cutoff: DateTime<Utc>) -> Result<u64, InventoryError>;
    }

    impl CartManagement for Backend {
        async fn create_cart(&self, buyer_email: &str) -> Result<Cart, CartError>;
        async fn fetch_cart(&self, cart_id: &str) -> Result<Option<Cart>, CartError>;
        async fn fetch_cart_lines(&self, cart_id: &str) -> Result<Vec<CartLine>, CartError>;
        async fn add_to_cart(&self, cart_id: &str, listing_id: i64, quantity: i64, idempotency_key: Option<String>) -> Result<Vec<CartLine>, CartError>;
        async fn remove_from_cart(&self, cart_id: &str, listing_id: i64, idempotency_key: Option<String>) -> Result<Vec<CartLine>, CartError>;
        async fn set_cart_quantity(&self, cart_id: &str, listing_id: i64, quantity: i64, idempotency_key: Option<String>) -> Result<Vec<CartLine>, CartError>;
    }

    impl OrderManagement for Backend {
        async fn insert_order(&self, order: NewOrder, cart_id: &str) -> Result<Order, OrderFlowError>;
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError>;
        async fn update_order_status(&self, order_id: &OrderId, expected: OrderStatusType, new_status: OrderStatusType, occurred_at: DateTime<Utc>) -> Result<Option<Order>, OrderFlowError>;
        async fn cancel_order(&self, order_id: &OrderId, occurred_at: DateTime<Utc>) -> Result<Option<Order>, OrderFlowError>;
        async fn fetch_status_history(&self, order_id: &OrderId) -> Result<Vec<StatusChange>, OrderFlowError>;
    }

    impl PaymentManagement for Backend {
        async fn stage_payment_draft(&self, draft: PaymentDraft) -> Result<PaymentDraft, PaymentError>;
        async fn fetch_payment_draft(&self, transaction_uuid: &str) -> Result<Option<PaymentDraft>, PaymentError>;
        async fn fetch_transaction_by_uuid(&self, transaction_uuid: &str) -> Result<Option<Transaction>, PaymentError>;
        async fn fetch_transaction(&self, id: i64) -> Result<Option<Transaction>, PaymentError>;
        async fn settle_payment(&self, draft: &PaymentDraft, orders: Vec<NewOrder>, transaction: NewTransaction) -> Result<SettledPayment, PaymentError>;
        async fn record_unmatched_payment(&self, transaction: NewTransaction) -> Result<UnmatchedPayment, PaymentError>;
        async fn fetch_transactions_for_email(&self, email: &str) -> Result<Vec<Transaction>, PaymentError>;
        async fn delete_transaction(&self, id: i64) -> Result<(), PaymentError>;
        async fn purge_stale_drafts(&self, cutoff: DateTime<Utc>) -> Result<Vec<PaymentDraft>, PaymentError>;
    }

    impl CatalogManagement for Backend {
        async fn fetch_listings(&self, kind: ListingKind) -> Result<Vec<Listing>, CatalogError>;
        async fn fetch_listings_by_seller(&self, kind: ListingKind, seller_email: &str) -> Result<Vec<Listing>, CatalogError>;
    }
}
