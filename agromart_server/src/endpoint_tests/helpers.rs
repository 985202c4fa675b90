use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use agromart_engine::db_types::{
    Cart,
    CartLine,
    Category,
    Listing,
    ListingKind,
    Money,
    NewOrder,
    Order,
    OrderId,
    OrderStatusType,
    PaymentMethod,
    Transaction,
    TransactionStatus,
    Unit,
};
use chrono::{DateTime, TimeZone, Utc};
use log::debug;

use crate::auth::{IdentityMiddlewareFactory, Role, USER_EMAIL_HEADER, USER_ROLE_HEADER};

pub const BUYER: &str = "hari@buyer.np";
pub const FARMER: &str = "ram@farm.np";
pub const OTHER_FARMER: &str = "gita@farm.np";
pub const SUPPLIER: &str = "sita@inputs.np";
pub const ADMIN: &str = "admin@agromart.np";

/// Sends `req` to an app configured by `configure`, as the given caller, and returns the status and body of the
/// response. Errors raised by middleware are rendered the same way actix renders them for a live server.
pub async fn send_request<F>(req: TestRequest, caller: Option<(&str, Role)>, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let req = match caller {
        Some((email, role)) => {
            req.insert_header((USER_EMAIL_HEADER, email)).insert_header((USER_ROLE_HEADER, role.to_string()))
        },
        None => req,
    };
    let app = App::new().wrap(IdentityMiddlewareFactory).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => res.into_parts().1.map_into_boxed_body(),
        Err(e) => e.error_response(),
    };
    let status = res.status();
    let body = res.into_body().try_into_bytes().map(|b| String::from_utf8_lossy(&b).into_owned()).unwrap_or_default();
    (status, body)
}

pub fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap()
}

pub fn listing(id: i64, seller: &str, name: &str, rupees: i64, quantity: i64) -> Listing {
    Listing {
        id,
        kind: ListingKind::Product,
        name: name.to_string(),
        price: Money::from_rupees(rupees),
        category: Category::Vegetables,
        quantity,
        unit: Unit::Kg,
        description: String::new(),
        image: format!("uploads/{id}.jpg"),
        seller_email: seller.to_string(),
        created_at: timestamp(),
        updated_at: timestamp(),
    }
}

pub fn cart(cart_id: &str, buyer: &str) -> Cart {
    Cart {
        cart_id: cart_id.to_string(),
        buyer_email: buyer.to_string(),
        created_at: timestamp(),
        updated_at: timestamp(),
    }
}

pub fn cart_line(listing_id: i64, seller: &str, rupees: i64, quantity: i64) -> CartLine {
    CartLine {
        listing_id,
        kind: ListingKind::Product,
        name: format!("Listing {listing_id}"),
        image: format!("uploads/{listing_id}.jpg"),
        category: Category::Vegetables,
        seller_email: seller.to_string(),
        unit_price: Money::from_rupees(rupees),
        cart_quantity: quantity,
    }
}

/// The order a backend would return after storing `order`
pub fn stored(order: NewOrder, id: i64) -> Order {
    Order {
        id,
        order_id: order.order_id,
        items: order.items,
        subtotal: order.subtotal,
        delivery_fee: order.delivery_fee,
        total_amount: order.total_amount,
        buyer_email: order.buyer_email,
        seller_email: order.seller_email,
        order_type: order.order_type,
        delivery_address: order.delivery.delivery_address,
        phone_number: order.delivery.phone_number,
        payment_method: order.payment_method,
        transaction_id: order.transaction_id,
        status: OrderStatusType::Pending,
        created_at: order.created_at,
        updated_at: order.created_at,
    }
}

pub fn order(order_id: &str, seller: &str, status: OrderStatusType) -> Order {
    Order {
        id: 1,
        order_id: OrderId::from(order_id),
        items: vec![],
        subtotal: Money::from_rupees(200),
        delivery_fee: Money::from_rupees(50),
        total_amount: Money::from_rupees(250),
        buyer_email: BUYER.to_string(),
        seller_email: seller.to_string(),
        order_type: ListingKind::Product,
        delivery_address: "Ward 4, Bharatpur".to_string(),
        phone_number: "9800000000".to_string(),
        payment_method: PaymentMethod::Cash,
        transaction_id: None,
        status,
        created_at: timestamp(),
        updated_at: timestamp(),
    }
}

pub fn transaction(id: i64, buyer: &str) -> Transaction {
    Transaction {
        id,
        transaction_id: "000AE01".to_string(),
        transaction_uuid: format!("agromart-1717200000000-{id}"),
        amount: Money::from_rupees(250),
        status: TransactionStatus::Completed,
        payment_method: PaymentMethod::Online,
        buyer_email: buyer.to_string(),
        seller_email: Some(FARMER.to_string()),
        order_details: Some("ORD-1".to_string()),
        needs_review: false,
        date: timestamp(),
    }
}
