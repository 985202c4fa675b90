use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use agromart_engine::{
    db_types::{Money, Order, OrderId, OrderStatusType, StatusChange},
    events::EventProducers,
    order_objects::{PartialCheckoutFailure, StatusTimeline},
    traits::OrderFlowError,
    OrderFlowApi,
};
use chrono::Duration;
use serde_json::json;

use super::{
    helpers::{cart, cart_line, order, send_request, stored, timestamp, ADMIN, BUYER, FARMER, OTHER_FARMER},
    mocks::MockBackend,
};
use crate::{
    auth::Role,
    routes::{
        CancelOrderRoute,
        CheckoutRoute,
        MyOrdersRoute,
        OrderTimelineRoute,
        SearchOrdersRoute,
        SellerOrdersRoute,
        UpdateOrderStatusRoute,
    },
};

fn configure_with(backend: MockBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(OrderFlowApi::new(backend, EventProducers::default())))
            .service(CheckoutRoute::<MockBackend>::new())
            .service(MyOrdersRoute::<MockBackend>::new())
            .service(SellerOrdersRoute::<MockBackend>::new())
            .service(OrderTimelineRoute::<MockBackend>::new())
            .service(UpdateOrderStatusRoute::<MockBackend>::new())
            .service(CancelOrderRoute::<MockBackend>::new())
            .service(SearchOrdersRoute::<MockBackend>::new());
    }
}

/// A cart holding two kilos of tomatoes from one farmer and a kilo of potatoes from another
fn two_seller_cart() -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_fetch_cart().returning(|id| Ok(Some(cart(id, BUYER))));
    backend
        .expect_fetch_cart_lines()
        .returning(|_| Ok(vec![cart_line(1, FARMER, 120, 2), cart_line(2, OTHER_FARMER, 60, 1)]));
    backend
}

fn checkout_body(declared_total: f64) -> serde_json::Value {
    json!({
        "cartId": "cart-1",
        "deliveryAddress": "Ward 4, Bharatpur",
        "phoneNumber": "9800000000",
        "paymentMethod": "cash",
        "declaredTotal": declared_total
    })
}

fn with_order(status: OrderStatusType) -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_fetch_order_by_order_id().returning(move |id| Ok(Some(order(id.as_str(), FARMER, status))));
    backend
}

#[actix_web::test]
async fn checkout_splits_by_seller() {
    let _ = env_logger::try_init().ok();
    let mut backend = two_seller_cart();
    let mut id = 0;
    backend.expect_insert_order().withf(|_, cart_id| cart_id == "cart-1").times(2).returning(move |order, _| {
        id += 1;
        Ok(stored(order, id))
    });
    let req = TestRequest::post().uri("/checkout").set_json(checkout_body(400.0));
    let (status, body) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::CREATED);
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders.len(), 2);
    let tomatoes = orders.iter().find(|o| o.seller_email == FARMER).unwrap();
    assert_eq!(tomatoes.subtotal, Money::from_rupees(240));
    assert_eq!(tomatoes.delivery_fee, Money::from_rupees(50));
    assert_eq!(tomatoes.total_amount, Money::from_rupees(290));
    assert!(orders.iter().all(|o| o.status == OrderStatusType::Pending && o.buyer_email == BUYER));
}

#[actix_web::test]
async fn declared_total_must_match() {
    let _ = env_logger::try_init().ok();
    let mut backend = two_seller_cart();
    backend.expect_insert_order().never();
    let req = TestRequest::post().uri("/checkout").set_json(checkout_body(350.0));
    let (status, body) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("\"error\""), "{body}");
}

#[actix_web::test]
async fn partial_checkout_reports_both_halves() {
    let _ = env_logger::try_init().ok();
    let mut backend = two_seller_cart();
    let mut calls = 0;
    backend.expect_insert_order().times(2).returning(move |order, _| {
        calls += 1;
        if calls == 1 {
            Ok(stored(order, calls))
        } else {
            Err(OrderFlowError::DatabaseError("database is locked".into()))
        }
    });
    let req = TestRequest::post().uri("/checkout").set_json(checkout_body(400.0));
    let (status, body) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    let failure: PartialCheckoutFailure = serde_json::from_str(&body).unwrap();
    assert_eq!(failure.orders.len(), 1);
    assert_eq!(failure.failed_sellers.len(), 1);
    assert_eq!(failure.failed_lines.len(), 1);
    assert_ne!(failure.orders[0].seller_email, failure.failed_sellers[0]);
}

#[actix_web::test]
async fn online_payments_skip_checkout() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_cart().never();
    let mut body = checkout_body(400.0);
    body["paymentMethod"] = json!("online");
    let req = TestRequest::post().uri("/checkout").set_json(body);
    let (status, _) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn sellers_move_orders_forward() {
    let _ = env_logger::try_init().ok();
    let mut backend = with_order(OrderStatusType::Pending);
    backend
        .expect_update_order_status()
        .withf(|id, expected, new_status, _| {
            id.as_str() == "ORD-1" && *expected == OrderStatusType::Pending && *new_status == OrderStatusType::Shipping
        })
        .times(1)
        .returning(|id, _, new_status, at| {
            let mut updated = order(id.as_str(), FARMER, new_status);
            updated.updated_at = at;
            Ok(Some(updated))
        });
    let req = TestRequest::put().uri("/orders/ORD-1/status").set_json(json!({"status": "Shipping"}));
    let (status, body) = send_request(req, Some((FARMER, Role::Farmer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatusType::Shipping);
}

#[actix_web::test]
async fn backdated_status_changes_are_refused() {
    let _ = env_logger::try_init().ok();
    let mut backend = with_order(OrderStatusType::Processing);
    backend.expect_update_order_status().never();
    let earlier = (timestamp() - Duration::minutes(5)).to_rfc3339();
    let req = TestRequest::put()
        .uri("/orders/ORD-1/status")
        .set_json(json!({"status": "Delivered", "occurredAt": earlier}));
    let (status, body) = send_request(req, Some((FARMER, Role::Farmer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("\"error\""), "{body}");
}

#[actix_web::test]
async fn delivered_orders_are_final() {
    let _ = env_logger::try_init().ok();
    let mut backend = with_order(OrderStatusType::Delivered);
    backend.expect_update_order_status().never();
    let req = TestRequest::put().uri("/orders/ORD-1/status").set_json(json!({"status": "Shipping"}));
    let (status, _) = send_request(req, Some((FARMER, Role::Farmer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn status_change_lost_a_race() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    let mut fetches = 0;
    backend.expect_fetch_order_by_order_id().times(2).returning(move |id| {
        fetches += 1;
        let status = if fetches == 1 { OrderStatusType::Processing } else { OrderStatusType::Delivered };
        Ok(Some(order(id.as_str(), FARMER, status)))
    });
    backend.expect_update_order_status().times(1).returning(|_, _, _, _| Ok(None));
    let req = TestRequest::put().uri("/orders/ORD-1/status").set_json(json!({"status": "Shipping"}));
    let (status, body) = send_request(req, Some((FARMER, Role::Farmer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Delivered"), "{body}");
}

#[actix_web::test]
async fn only_the_seller_moves_an_order() {
    let _ = env_logger::try_init().ok();
    let mut backend = with_order(OrderStatusType::Pending);
    backend.expect_update_order_status().never();
    let req = TestRequest::put().uri("/orders/ORD-1/status").set_json(json!({"status": "Processing"}));
    let (status, _) = send_request(req, Some((OTHER_FARMER, Role::Farmer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let backend = with_order(OrderStatusType::Pending);
    let req = TestRequest::put().uri("/orders/ORD-1/status").set_json(json!({"status": "Processing"}));
    let (status, _) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn buyers_cancel_pending_orders() {
    let _ = env_logger::try_init().ok();
    let mut backend = with_order(OrderStatusType::Pending);
    backend
        .expect_cancel_order()
        .times(1)
        .returning(|id, _| Ok(Some(order(id.as_str(), FARMER, OrderStatusType::Cancelled))));
    let req = TestRequest::delete().uri("/orders/ORD-1");
    let (status, body) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatusType::Cancelled);

    let mut backend = with_order(OrderStatusType::Processing);
    backend.expect_cancel_order().never();
    let req = TestRequest::delete().uri("/orders/ORD-1");
    let (status, _) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn timeline_fills_skipped_statuses() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_order_by_order_id().returning(|id| {
        let mut order = order(id.as_str(), FARMER, OrderStatusType::Shipping);
        order.updated_at = timestamp() + Duration::hours(5);
        Ok(Some(order))
    });
    backend.expect_fetch_status_history().returning(|id| {
        Ok(vec![
            StatusChange { order_id: id.clone(), status: OrderStatusType::Pending, occurred_at: timestamp() },
            StatusChange {
                order_id: id.clone(),
                status: OrderStatusType::Shipping,
                occurred_at: timestamp() + Duration::hours(5),
            },
        ])
    });
    let req = TestRequest::get().uri("/orders/ORD-1/timeline");
    let (status, body) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);
    let timeline: StatusTimeline = serde_json::from_str(&body).unwrap();
    assert_eq!(timeline.order_id, OrderId::from("ORD-1"));
    assert_eq!(timeline.timestamps.len(), 3);
    let processing = timeline.timestamp_for(OrderStatusType::Processing).unwrap();
    assert!(processing.synthetic);
    assert!(processing.at < timestamp() + Duration::hours(5));
}

#[actix_web::test]
async fn order_lists() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_search_orders()
        .withf(|q| q.buyer_email.as_deref() == Some(BUYER) && q.seller_email.is_none())
        .times(1)
        .returning(|_| Ok(vec![order("ORD-1", FARMER, OrderStatusType::Pending)]));
    let req = TestRequest::get().uri("/orders");
    let (status, body) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Vec<Order>>(&body).unwrap().len(), 1);

    let mut backend = MockBackend::new();
    backend
        .expect_search_orders()
        .withf(|q| q.seller_email.as_deref() == Some(FARMER) && q.buyer_email.is_none())
        .times(1)
        .returning(|_| Ok(vec![]));
    let req = TestRequest::get().uri("/orders/seller");
    let (status, body) = send_request(req, Some((FARMER, Role::Farmer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn search_is_for_admins() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_search_orders().never();
    let req = TestRequest::get().uri("/search/orders?sellerEmail=ram@farm.np");
    let (status, _) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut backend = MockBackend::new();
    backend
        .expect_search_orders()
        .withf(|q| q.seller_email.as_deref() == Some(FARMER) && q.status == Some(vec![OrderStatusType::Shipping]))
        .times(1)
        .returning(|_| Ok(vec![order("ORD-1", FARMER, OrderStatusType::Shipping)]));
    let req = TestRequest::get().uri("/search/orders?sellerEmail=ram@farm.np&status=Shipping");
    let (status, body) = send_request(req, Some((ADMIN, Role::Admin)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("ORD-1"));
}
