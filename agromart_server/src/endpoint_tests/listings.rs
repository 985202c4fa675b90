use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use agromart_engine::{
    db_types::{Listing, ListingKind, Money, StockDirection},
    traits::InventoryError,
    InventoryApi,
};
use serde_json::json;

use super::{
    helpers::{listing, send_request, timestamp, BUYER, FARMER, SUPPLIER},
    mocks::MockBackend,
};
use crate::{
    auth::Role,
    routes::{AdjustStockRoute, CreateListingRoute, DeleteListingRoute},
};

fn configure_with(backend: MockBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(InventoryApi::new(backend)))
            .service(CreateListingRoute::<MockBackend>::new())
            .service(DeleteListingRoute::<MockBackend>::new())
            .service(AdjustStockRoute::<MockBackend>::new());
    }
}

fn tomatoes() -> serde_json::Value {
    json!({
        "name": "Tomatoes",
        "price": 120.5,
        "category": "vegetables",
        "quantity": 40,
        "unit": "KG",
        "image": "uploads/tomatoes.jpg"
    })
}

#[actix_web::test]
async fn farmers_list_produce() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_insert_listing()
        .withf(|l| l.kind == ListingKind::Product && l.seller_email == FARMER && l.price == Money::from_paisa(12_050))
        .times(1)
        .returning(|l| {
            Ok(Listing {
                id: 7,
                kind: l.kind,
                name: l.name,
                price: l.price,
                category: l.category,
                quantity: l.quantity,
                unit: l.unit,
                description: l.description,
                image: l.image,
                seller_email: l.seller_email,
                created_at: timestamp(),
                updated_at: timestamp(),
            })
        });
    let req = TestRequest::post().uri("/listings").set_json(tomatoes());
    let (status, body) = send_request(req, Some((FARMER, Role::Farmer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::CREATED);
    let listing: Listing = serde_json::from_str(&body).unwrap();
    assert_eq!(listing.id, 7);
    assert_eq!(listing.quantity, 40);
}

#[actix_web::test]
async fn suppliers_cannot_list_produce() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_insert_listing().never();
    let req = TestRequest::post().uri("/listings").set_json(tomatoes());
    let (status, body) = send_request(req, Some((SUPPLIER, Role::Supplier)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("not a valid category"), "{body}");
}

#[actix_web::test]
async fn buyers_cannot_list() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_insert_listing().never();
    let req = TestRequest::post().uri("/listings").set_json(tomatoes());
    let (status, _) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn anonymous_callers_cannot_list() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post().uri("/listings").set_json(tomatoes());
    let (status, _) = send_request(req, None, configure_with(MockBackend::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn stock_never_goes_negative() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_adjust_stock()
        .withf(|a| {
            a.listing_id == 1 && a.direction == StockDirection::Decrease && a.expected_seller.as_deref() == Some(FARMER)
        })
        .times(1)
        .returning(|_| Err(InventoryError::InsufficientStock { listing_id: 1, available: 2, requested: 5 }));
    let req = TestRequest::post().uri("/listings/1/stock").set_json(json!({"delta": 5, "direction": "decrease"}));
    let (status, _) = send_request(req, Some((FARMER, Role::Farmer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn restocking_someone_elses_listing() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_adjust_stock().returning(|a| Err(InventoryError::OwnershipMismatch(a.listing_id)));
    let req = TestRequest::post().uri("/listings/1/stock").set_json(json!({"delta": 5, "direction": "increase"}));
    let (status, _) = send_request(req, Some((SUPPLIER, Role::Supplier)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn sellers_delete_their_listings() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_delete_listing()
        .withf(|id, seller| *id == 1 && seller == FARMER)
        .times(1)
        .returning(|_, _| Ok(listing(1, FARMER, "Tomatoes", 120, 40)));
    let req = TestRequest::delete().uri("/listings/1");
    let (status, body) = send_request(req, Some((FARMER, Role::Farmer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);
    let listing: Listing = serde_json::from_str(&body).unwrap();
    assert_eq!(listing.name, "Tomatoes");
}
