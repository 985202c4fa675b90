use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use agromart_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    CartApi,
    CatalogApi,
    InventoryApi,
    OrderFlowApi,
    PaymentApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    auth::IdentityMiddlewareFactory,
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    routes::{
        health,
        AddToCartRoute,
        AdjustStockRoute,
        CancelOrderRoute,
        CartRoute,
        CatalogByCategoryRoute,
        CatalogForSellerRoute,
        CatalogRoute,
        CatalogSellersRoute,
        CheckoutRoute,
        CreateCartRoute,
        CreateListingRoute,
        DeleteListingRoute,
        DeleteTransactionRoute,
        InitiatePaymentRoute,
        ListingRoute,
        MyOrdersRoute,
        MyTransactionsRoute,
        OrderTimelineRoute,
        PaymentFailureRoute,
        PaymentSuccessRoute,
        RemoveFromCartRoute,
        SearchOrdersRoute,
        SellerOrdersRoute,
        UpdateCartQuantityRoute,
        UpdateOrderStatusRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 128;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, logging_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let purge_api = PaymentApi::new(db.clone(), producers.clone(), config.gateway.clone());
    let _worker = start_expiry_worker(purge_api, InventoryApi::new(db.clone()), config.draft_ttl);
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let bind_addr = (config.host.clone(), config.port);
    let srv = HttpServer::new(move || {
        let inventory_api = InventoryApi::new(db.clone());
        let cart_api = CartApi::new(db.clone());
        let catalog_api = CatalogApi::new(db.clone());
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone()).with_delivery_fee(config.delivery_fee);
        let payment_api = PaymentApi::new(db.clone(), producers.clone(), config.gateway.clone())
            .with_delivery_fee(config.delivery_fee);
        let options = ServerOptions::from_config(&config);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("ams::access_log"))
            .app_data(web::Data::new(inventory_api))
            .app_data(web::Data::new(cart_api))
            .app_data(web::Data::new(catalog_api))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(payment_api))
            .app_data(web::Data::new(options));
        // Routes that require an identity
        let api_scope = web::scope("/api")
            .wrap(IdentityMiddlewareFactory)
            .service(CreateListingRoute::<SqliteDatabase>::new())
            .service(DeleteListingRoute::<SqliteDatabase>::new())
            .service(AdjustStockRoute::<SqliteDatabase>::new())
            .service(CreateCartRoute::<SqliteDatabase>::new())
            .service(CartRoute::<SqliteDatabase>::new())
            .service(AddToCartRoute::<SqliteDatabase>::new())
            .service(UpdateCartQuantityRoute::<SqliteDatabase>::new())
            .service(RemoveFromCartRoute::<SqliteDatabase>::new())
            .service(CheckoutRoute::<SqliteDatabase>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(SellerOrdersRoute::<SqliteDatabase>::new())
            .service(OrderTimelineRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(CancelOrderRoute::<SqliteDatabase>::new())
            .service(SearchOrdersRoute::<SqliteDatabase>::new())
            .service(InitiatePaymentRoute::<SqliteDatabase>::new())
            .service(PaymentSuccessRoute::<SqliteDatabase>::new())
            .service(PaymentFailureRoute::<SqliteDatabase>::new())
            .service(MyTransactionsRoute::<SqliteDatabase>::new())
            .service(DeleteTransactionRoute::<SqliteDatabase>::new());
        app.service(health)
            .service(CatalogRoute::<SqliteDatabase>::new())
            .service(CatalogByCategoryRoute::<SqliteDatabase>::new())
            .service(CatalogSellersRoute::<SqliteDatabase>::new())
            .service(CatalogForSellerRoute::<SqliteDatabase>::new())
            .service(ListingRoute::<SqliteDatabase>::new())
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((bind_addr.0.as_str(), bind_addr.1))?
    .run();
    Ok(srv)
}

/// Hooks that write every fulfilment event to the log
pub fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_created(|ev| {
            Box::pin(async move {
                let order = ev.order;
                info!(
                    "📬️ Order [{}] for {} placed by {} with {} ({} payment)",
                    order.order_id, order.total_amount, order.buyer_email, order.seller_email, order.payment_method
                );
            })
        })
        .on_status_changed(|ev| {
            Box::pin(async move {
                info!("📬️ Order [{}] moved from {} to {}", ev.order.order_id, ev.old_status, ev.order.status);
            })
        })
        .on_payment_reconciled(|ev| {
            Box::pin(async move {
                let tx = &ev.transaction;
                if ev.needs_review() {
                    warn!(
                        "📬️ Payment {} ({}) of {} by {} has no matching order and needs manual review",
                        tx.transaction_uuid, tx.transaction_id, tx.amount, tx.buyer_email
                    );
                } else {
                    info!(
                        "📬️ Payment {} of {} by {} settled {} orders",
                        tx.transaction_uuid,
                        tx.amount,
                        tx.buyer_email,
                        ev.orders.len()
                    );
                }
            })
        });
    hooks
}
