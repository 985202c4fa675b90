use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use agromart_engine::{
    db_types::Money,
    order_objects::CartView,
    traits::{CartError, InventoryError},
    CartApi,
};
use serde_json::json;

use super::{
    helpers::{cart, cart_line, send_request, BUYER, FARMER, OTHER_FARMER},
    mocks::MockBackend,
};
use crate::{
    auth::Role,
    routes::{AddToCartRoute, CartRoute, CreateCartRoute, RemoveFromCartRoute, UpdateCartQuantityRoute},
};

fn configure_with(backend: MockBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(CartApi::new(backend)))
            .service(CreateCartRoute::<MockBackend>::new())
            .service(CartRoute::<MockBackend>::new())
            .service(AddToCartRoute::<MockBackend>::new())
            .service(UpdateCartQuantityRoute::<MockBackend>::new())
            .service(RemoveFromCartRoute::<MockBackend>::new());
    }
}

fn buyers_cart() -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_fetch_cart().returning(|id| Ok((id == "cart-1").then(|| cart("cart-1", BUYER))));
    backend
}

#[actix_web::test]
async fn buyers_create_carts() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_create_cart().withf(|email| email == BUYER).times(1).returning(|email| Ok(cart("cart-1", email)));
    let req = TestRequest::post().uri("/carts");
    let (status, body) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.contains("\"cartId\":\"cart-1\""), "{body}");
}

#[actix_web::test]
async fn sellers_do_not_shop() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_create_cart().never();
    let req = TestRequest::post().uri("/carts");
    let (status, _) = send_request(req, Some((FARMER, Role::Farmer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn cart_shows_subtotal() {
    let _ = env_logger::try_init().ok();
    let mut backend = buyers_cart();
    backend
        .expect_fetch_cart_lines()
        .returning(|_| Ok(vec![cart_line(1, FARMER, 120, 2), cart_line(2, OTHER_FARMER, 60, 3)]));
    let req = TestRequest::get().uri("/carts/cart-1");
    let (status, body) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);
    let view: CartView = serde_json::from_str(&body).unwrap();
    assert_eq!(view.lines.len(), 2);
    assert_eq!(view.subtotal, Money::from_rupees(420));
}

#[actix_web::test]
async fn someone_elses_cart() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_cart().returning(|id| Ok(Some(cart(id, "shyam@buyer.np"))));
    backend.expect_add_to_cart().never();
    let req = TestRequest::post().uri("/carts/cart-1/lines").set_json(json!({"listingId": 1, "quantity": 2}));
    let (status, _) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn adding_reserves_stock() {
    let _ = env_logger::try_init().ok();
    let mut backend = buyers_cart();
    backend
        .expect_add_to_cart()
        .withf(|cart_id, listing_id, qty, key| {
            cart_id == "cart-1" && *listing_id == 1 && *qty == 2 && key.as_deref() == Some("tap-1")
        })
        .times(1)
        .returning(|_, _, _, _| Ok(vec![cart_line(1, FARMER, 120, 2)]));
    let req = TestRequest::post()
        .uri("/carts/cart-1/lines")
        .set_json(json!({"listingId": 1, "quantity": 2, "idempotencyKey": "tap-1"}));
    let (status, body) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);
    let view: CartView = serde_json::from_str(&body).unwrap();
    assert_eq!(view.subtotal, Money::from_rupees(240));
}

#[actix_web::test]
async fn adding_more_than_is_in_stock() {
    let _ = env_logger::try_init().ok();
    let mut backend = buyers_cart();
    backend.expect_add_to_cart().returning(|_, listing_id, requested, _| {
        Err(CartError::Inventory(InventoryError::InsufficientStock { listing_id, available: 1, requested }))
    });
    let req = TestRequest::post().uri("/carts/cart-1/lines").set_json(json!({"listingId": 1, "quantity": 4}));
    let (status, _) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn zero_quantity_removes_the_line() {
    let _ = env_logger::try_init().ok();
    let mut backend = buyers_cart();
    backend.expect_set_cart_quantity().never();
    backend
        .expect_remove_from_cart()
        .withf(|cart_id, listing_id, _| cart_id == "cart-1" && *listing_id == 1)
        .times(1)
        .returning(|_, _, _| Ok(vec![]));
    let req = TestRequest::put().uri("/carts/cart-1/lines/1").set_json(json!({"quantity": 0}));
    let (status, body) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);
    let view: CartView = serde_json::from_str(&body).unwrap();
    assert!(view.lines.is_empty());
}

#[actix_web::test]
async fn removing_a_missing_line() {
    let _ = env_logger::try_init().ok();
    let mut backend = buyers_cart();
    backend
        .expect_remove_from_cart()
        .returning(|cart_id, listing_id, _| Err(CartError::LineNotFound { cart_id: cart_id.to_string(), listing_id }));
    let req = TestRequest::delete().uri("/carts/cart-1/lines/5?idempotencyKey=rm-1");
    let (status, _) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
