use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use agromart_common::Secret;
use agromart_engine::{
    db_types::{Transaction, TransactionStatus},
    events::EventProducers,
    payment_objects::GatewayConfig,
    PaymentApi,
};
use serde_json::json;

use super::{
    helpers::{send_request, transaction, BUYER, FARMER},
    mocks::MockBackend,
};
use crate::{
    auth::Role,
    config::ServerOptions,
    errors::PAYMENT_VERIFICATION_FAILED,
    routes::{DeleteTransactionRoute, MyTransactionsRoute, PaymentFailureRoute, PaymentSuccessRoute},
};

fn configure_with(backend: MockBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let config = GatewayConfig::new(Secret::new("8gBm/:&EnhH.1/q".to_string()), "EPAYTEST");
        cfg.app_data(web::Data::new(PaymentApi::new(backend, EventProducers::default(), config)))
            .app_data(web::Data::new(ServerOptions::default()))
            .service(PaymentSuccessRoute::<MockBackend>::new())
            .service(PaymentFailureRoute::<MockBackend>::new())
            .service(MyTransactionsRoute::<MockBackend>::new())
            .service(DeleteTransactionRoute::<MockBackend>::new());
    }
}

#[actix_web::test]
async fn forged_callbacks_are_not_recorded() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_payment_draft().returning(|_| Ok(None));
    backend.expect_fetch_transaction_by_uuid().returning(|_| Ok(None));
    backend.expect_record_unmatched_payment().never();
    backend.expect_settle_payment().never();
    let uri = "/payments/success?transaction_code=000AE01&total_amount=500.00&transaction_uuid=agromart-1&\
               product_code=EPAYTEST&signed_field_names=total_amount,transaction_uuid,product_code&signature=Zm9yZ2Vk";
    let req = TestRequest::get().uri(uri);
    let (status, body) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": PAYMENT_VERIFICATION_FAILED }).to_string());
}

#[actix_web::test]
async fn replayed_callbacks_return_the_transaction() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_payment_draft().returning(|_| Ok(None));
    backend.expect_fetch_transaction_by_uuid().returning(|uuid| {
        let mut tx = transaction(3, BUYER);
        tx.transaction_uuid = uuid.to_string();
        Ok(Some(tx))
    });
    backend.expect_record_unmatched_payment().never();
    let uri = "/payments/success?transaction_code=000AE01&total_amount=250.00&transaction_uuid=agromart-3";
    let req = TestRequest::get().uri(uri);
    let (status, body) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);
    let result: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["replayed"], json!(true));
    assert_eq!(result["transaction"]["transactionUuid"], json!("agromart-3"));
}

#[actix_web::test]
async fn failed_payments_keep_the_cart() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_payment_draft().never();
    let req = TestRequest::get().uri("/payments/failure?transaction_uuid=agromart-1");
    let (status, body) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("agromart-1"), "{body}");
    assert!(body.contains("\"success\":false"), "{body}");
}

#[actix_web::test]
async fn transaction_history() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_transactions_for_email()
        .withf(|email| email == FARMER)
        .times(1)
        .returning(|_| Ok(vec![transaction(2, BUYER), transaction(1, BUYER)]));
    let req = TestRequest::get().uri("/transactions");
    let (status, body) = send_request(req, Some((FARMER, Role::Farmer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);
    let transactions: Vec<Transaction> = serde_json::from_str(&body).unwrap();
    assert_eq!(transactions.len(), 2);
    assert!(transactions.iter().all(|t| t.status == TransactionStatus::Completed));
}

#[actix_web::test]
async fn buyers_delete_their_own_transactions() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_transaction().returning(|id| Ok(Some(transaction(id, BUYER))));
    backend.expect_delete_transaction().withf(|id| *id == 1).times(1).returning(|_| Ok(()));
    let req = TestRequest::delete().uri("/transactions/1");
    let (status, _) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::OK);

    let mut backend = MockBackend::new();
    backend.expect_fetch_transaction().returning(|id| Ok(Some(transaction(id, "shyam@buyer.np"))));
    backend.expect_delete_transaction().never();
    let req = TestRequest::delete().uri("/transactions/2");
    let (status, _) = send_request(req, Some((BUYER, Role::Buyer)), configure_with(backend)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
