use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use agromart_engine::{
    catalog_api::{CategoryGroup, SellerSummary},
    db_types::{Listing, ListingKind},
    CatalogApi,
    InventoryApi,
};

use super::{
    helpers::{listing, send_request, FARMER, OTHER_FARMER},
    mocks::MockBackend,
};
use crate::routes::{
    health,
    CatalogByCategoryRoute,
    CatalogForSellerRoute,
    CatalogRoute,
    CatalogSellersRoute,
    ListingRoute,
};

fn catalog_backend() -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_fetch_listings().returning(|kind| match kind {
        ListingKind::Product => Ok(vec![
            listing(3, OTHER_FARMER, "Cauliflower", 80, 12),
            listing(2, FARMER, "Potatoes", 60, 100),
            listing(1, FARMER, "Tomatoes", 120, 40),
        ]),
        ListingKind::AgriInput => Ok(vec![]),
    });
    backend
}

fn configure(cfg: &mut ServiceConfig) {
    cfg.app_data(web::Data::new(CatalogApi::new(catalog_backend())))
        .service(health)
        .service(CatalogRoute::<MockBackend>::new())
        .service(CatalogByCategoryRoute::<MockBackend>::new())
        .service(CatalogSellersRoute::<MockBackend>::new());
}

#[actix_web::test]
async fn health_check() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(TestRequest::get().uri("/health"), None, configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn catalog_is_public() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(TestRequest::get().uri("/catalog/product"), None, configure).await;
    assert_eq!(status, StatusCode::OK);
    let listings: Vec<Listing> = serde_json::from_str(&body).unwrap();
    assert_eq!(listings.len(), 3);
    assert_eq!(listings[0].name, "Cauliflower");

    let (status, body) = send_request(TestRequest::get().uri("/catalog/agriinput"), None, configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn unknown_listing_kind() {
    let _ = env_logger::try_init().ok();
    let (status, _) = send_request(TestRequest::get().uri("/catalog/livestock"), None, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn sellers_are_ranked_by_listing_count() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(TestRequest::get().uri("/catalog/product/sellers"), None, configure).await;
    assert_eq!(status, StatusCode::OK);
    let sellers: Vec<SellerSummary> = serde_json::from_str(&body).unwrap();
    assert_eq!(sellers.len(), 2);
    assert_eq!(sellers[0].seller_email, FARMER);
    assert_eq!(sellers[0].listing_count, 2);
    assert_eq!(sellers[0].sample.name, "Potatoes");
    assert_eq!(sellers[1].seller_email, OTHER_FARMER);
}

#[actix_web::test]
async fn categories_leave_out_empty_groups() {
    let _ = env_logger::try_init().ok();
    let (status, body) = send_request(TestRequest::get().uri("/catalog/product/categories"), None, configure).await;
    assert_eq!(status, StatusCode::OK);
    let groups: Vec<CategoryGroup> = serde_json::from_str(&body).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].listings.len(), 3);
}

#[actix_web::test]
async fn one_sellers_listings() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_listings_by_seller()
        .withf(|kind, email| *kind == ListingKind::Product && email == FARMER)
        .times(1)
        .returning(|_, _| Ok(vec![listing(2, FARMER, "Potatoes", 60, 100), listing(1, FARMER, "Tomatoes", 120, 40)]));
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(CatalogApi::new(backend))).service(CatalogForSellerRoute::<MockBackend>::new());
    };
    let uri = format!("/catalog/product/sellers/{FARMER}");
    let (status, body) = send_request(TestRequest::get().uri(&uri), None, configure).await;
    assert_eq!(status, StatusCode::OK);
    let groups: Vec<CategoryGroup> = serde_json::from_str(&body).unwrap();
    assert_eq!(groups[0].listings.iter().map(|l| l.id).collect::<Vec<_>>(), vec![2, 1]);
}

#[actix_web::test]
async fn missing_listing() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_listing().returning(|id| Ok((id == 1).then(|| listing(1, FARMER, "Tomatoes", 120, 40))));
    let configure = move |cfg: &mut ServiceConfig| {
        cfg.app_data(web::Data::new(InventoryApi::new(backend))).service(ListingRoute::<MockBackend>::new());
    };
    let (status, body) = send_request(TestRequest::get().uri("/listings/9"), None, configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("\"error\""));
}
