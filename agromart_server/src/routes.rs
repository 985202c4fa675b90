//! Request handler definitions
//!
//! Define each route and its handler here. Handlers should do little more than pick the caller's identity and the
//! request data apart, call into the engine APIs, and shape the response. Business rules live in `agromart_engine`.
//!
//! Every handler is async. Database work must never block the worker thread, since each worker serves its requests
//! one at a time.
//!
//! Catalog and listing reads are public. Everything under `/api` needs an identity, and most routes are further
//! restricted to the roles named in their `route!` definition.
use std::{collections::HashMap, str::FromStr};

use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use agromart_engine::{
    catalog_api::group_by_category,
    db_types::{ListingKind, OrderId},
    order_objects::{CheckoutRequest, OrderQueryFilter},
    payment_objects::PaymentInitiation,
    traits::{CartManagement, CatalogManagement, InventoryManagement, OrderManagement, PaymentManagement},
    CartApi,
    CatalogApi,
    InventoryApi,
    OrderFlowApi,
    PaymentApi,
};
use log::*;

use crate::{
    auth::{Role, UserIdentity},
    config::ServerOptions,
    data_objects::{
        AddToCartRequest,
        CartQuantityRequest,
        IdempotencyParams,
        JsonResponse,
        NewListingRequest,
        OrderSearchParams,
        StatusUpdateRequest,
        StockChangeRequest,
    },
    errors::ServerError,
    helpers::get_remote_ip,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

fn parse_kind(kind: &str) -> Result<ListingKind, ServerError> {
    ListingKind::from_str(kind).map_err(|e| ServerError::InvalidRequest(e.to_string()))
}

/// The kind of listing the caller may sell. Buyers and admins cannot list anything.
fn seller_kind(identity: &UserIdentity) -> Result<ListingKind, ServerError> {
    identity
        .role
        .sells()
        .ok_or_else(|| ServerError::InsufficientPermissions(format!("A {} cannot sell listings", identity.role)))
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Catalog  ----------------------------------------------------
route!(catalog => Get "/catalog/{kind}" impl CatalogManagement);
/// All listings of a kind (`product` or `agriinput`), newest first.
pub async fn catalog<B: CatalogManagement>(
    path: web::Path<String>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let kind = parse_kind(&path.into_inner())?;
    trace!("💻️ GET catalog of {kind}");
    let listings = api.listings(kind).await?;
    Ok(HttpResponse::Ok().json(listings))
}

route!(catalog_by_category => Get "/catalog/{kind}/categories" impl CatalogManagement);
/// Listings of a kind, grouped by category in display order. Empty categories are left out.
pub async fn catalog_by_category<B: CatalogManagement>(
    path: web::Path<String>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let kind = parse_kind(&path.into_inner())?;
    trace!("💻️ GET catalog categories of {kind}");
    let listings = api.listings(kind).await?;
    Ok(HttpResponse::Ok().json(group_by_category(listings)))
}

route!(catalog_sellers => Get "/catalog/{kind}/sellers" impl CatalogManagement);
pub async fn catalog_sellers<B: CatalogManagement>(
    path: web::Path<String>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let kind = parse_kind(&path.into_inner())?;
    trace!("💻️ GET sellers of {kind}");
    let sellers = api.sellers_with_listings(kind).await?;
    Ok(HttpResponse::Ok().json(sellers))
}

route!(catalog_for_seller => Get "/catalog/{kind}/sellers/{email}" impl CatalogManagement);
pub async fn catalog_for_seller<B: CatalogManagement>(
    path: web::Path<(String, String)>,
    api: web::Data<CatalogApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (kind, seller) = path.into_inner();
    let kind = parse_kind(&kind)?;
    trace!("💻️ GET {kind} listings of {seller}");
    let listings = api.listings_by_seller(kind, &seller).await?;
    Ok(HttpResponse::Ok().json(listings))
}

//----------------------------------------------   Listings  ----------------------------------------------------
route!(listing => Get "/listings/{id}" impl InventoryManagement);
pub async fn listing<B: InventoryManagement>(
    path: web::Path<i64>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let listing = api.listing(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(listing))
}

route!(create_listing => Post "/listings" impl InventoryManagement where requires [Role::Farmer, Role::Supplier]);
/// Lists an item for sale. Farmers list produce and suppliers list agri-inputs.
pub async fn create_listing<B: InventoryManagement>(
    identity: UserIdentity,
    body: web::Json<NewListingRequest>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let kind = seller_kind(&identity)?;
    debug!("💻️ POST new {kind} listing for {}", identity.email);
    let listing = body.into_inner().into_listing(kind, &identity.email)?;
    let listing = api.create_listing(listing).await?;
    Ok(HttpResponse::Created().json(listing))
}

route!(delete_listing => Delete "/listings/{id}" impl InventoryManagement where requires [Role::Farmer, Role::Supplier]);
pub async fn delete_listing<B: InventoryManagement>(
    identity: UserIdentity,
    path: web::Path<i64>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ DELETE listing #{id} for {}", identity.email);
    let listing = api.delete_listing(id, &identity.email).await?;
    Ok(HttpResponse::Ok().json(listing))
}

route!(adjust_stock => Post "/listings/{id}/stock" impl InventoryManagement where requires [Role::Farmer, Role::Supplier]);
/// Restocks or writes off units of the caller's own listing.
pub async fn adjust_stock<B: InventoryManagement>(
    identity: UserIdentity,
    path: web::Path<i64>,
    body: web::Json<StockChangeRequest>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let adjustment = body.into_inner().into_adjustment(id, &identity.email);
    debug!("💻️ POST stock {} of {} on listing #{id}", adjustment.direction, adjustment.delta);
    let listing = api.adjust_stock(adjustment).await?;
    Ok(HttpResponse::Ok().json(listing))
}

//----------------------------------------------   Carts  ----------------------------------------------------
route!(create_cart => Post "/carts" impl CartManagement where requires [Role::Buyer]);
pub async fn create_cart<B: CartManagement>(
    identity: UserIdentity,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST new cart for {}", identity.email);
    let cart = api.create_cart(&identity.email).await?;
    Ok(HttpResponse::Created().json(cart))
}

route!(cart => Get "/carts/{cart_id}" impl CartManagement where requires [Role::Buyer]);
pub async fn cart<B: CartManagement>(
    identity: UserIdentity,
    path: web::Path<String>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let cart = api.cart(&path.into_inner(), &identity.email).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(add_to_cart => Post "/carts/{cart_id}/lines" impl CartManagement where requires [Role::Buyer]);
/// Adds units of a listing to the cart, reserving them from stock.
pub async fn add_to_cart<B: CartManagement>(
    identity: UserIdentity,
    path: web::Path<String>,
    body: web::Json<AddToCartRequest>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let cart_id = path.into_inner();
    let AddToCartRequest { listing_id, quantity, idempotency_key } = body.into_inner();
    debug!("💻️ POST {quantity} of listing #{listing_id} to cart {cart_id}");
    let cart = api.add_to_cart(&cart_id, &identity.email, listing_id, quantity, idempotency_key).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(update_cart_quantity => Put "/carts/{cart_id}/lines/{listing_id}" impl CartManagement where requires [Role::Buyer]);
/// Sets the quantity of a cart line. Stock is reserved or released by the difference.
pub async fn update_cart_quantity<B: CartManagement>(
    identity: UserIdentity,
    path: web::Path<(String, i64)>,
    body: web::Json<CartQuantityRequest>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (cart_id, listing_id) = path.into_inner();
    let CartQuantityRequest { quantity, idempotency_key } = body.into_inner();
    debug!("💻️ PUT quantity {quantity} for listing #{listing_id} in cart {cart_id}");
    let cart = api.update_quantity(&cart_id, &identity.email, listing_id, quantity, idempotency_key).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(remove_from_cart => Delete "/carts/{cart_id}/lines/{listing_id}" impl CartManagement where requires [Role::Buyer]);
pub async fn remove_from_cart<B: CartManagement>(
    identity: UserIdentity,
    path: web::Path<(String, i64)>,
    query: web::Query<IdempotencyParams>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let (cart_id, listing_id) = path.into_inner();
    debug!("💻️ DELETE listing #{listing_id} from cart {cart_id}");
    let cart = api.remove_from_cart(&cart_id, &identity.email, listing_id, query.into_inner().idempotency_key).await?;
    Ok(HttpResponse::Ok().json(cart))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(checkout => Post "/checkout" impl OrderManagement, CartManagement where requires [Role::Buyer]);
/// Checks out a cash-on-delivery cart into one order per seller.
///
/// If some seller orders were stored before a later one failed, the response is `207 Multi-Status` with the stored
/// orders and the lines that are still in the cart.
pub async fn checkout<B: OrderManagement + CartManagement>(
    identity: UserIdentity,
    body: web::Json<CheckoutRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST checkout of cart {} for {}", request.cart_id, identity.email);
    let orders = api.checkout(&identity.email, request).await?;
    Ok(HttpResponse::Created().json(orders))
}

route!(my_orders => Get "/orders" impl OrderManagement, CartManagement where requires [Role::Buyer]);
pub async fn my_orders<B: OrderManagement + CartManagement>(
    identity: UserIdentity,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET orders for buyer {}", identity.email);
    let orders = api.orders_for_buyer(&identity.email).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(seller_orders => Get "/orders/seller" impl OrderManagement, CartManagement where requires [Role::Farmer, Role::Supplier]);
pub async fn seller_orders<B: OrderManagement + CartManagement>(
    identity: UserIdentity,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET orders for seller {}", identity.email);
    let orders = api.orders_for_seller(&identity.email).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_timeline => Get "/orders/{order_id}/timeline" impl OrderManagement, CartManagement where requires [Role::Buyer, Role::Farmer, Role::Supplier]);
/// The time the order entered each status it has reached. Skipped statuses carry synthetic times.
pub async fn order_timeline<B: OrderManagement + CartManagement>(
    identity: UserIdentity,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ GET timeline of order [{order_id}] for {}", identity.email);
    let timeline = api.status_timeline(&identity.email, &order_id).await?;
    Ok(HttpResponse::Ok().json(timeline))
}

route!(update_order_status => Put "/orders/{order_id}/status" impl OrderManagement, CartManagement where requires [Role::Farmer, Role::Supplier]);
pub async fn update_order_status<B: OrderManagement + CartManagement>(
    identity: UserIdentity,
    path: web::Path<OrderId>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let StatusUpdateRequest { status, occurred_at } = body.into_inner();
    debug!("💻️ PUT status {status} on order [{order_id}] by {}", identity.email);
    let order = api.update_status(&identity.email, &order_id, status, occurred_at).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Delete "/orders/{order_id}" impl OrderManagement, CartManagement where requires [Role::Buyer]);
/// Cancels a pending order and returns its items to stock. The order is kept with status `Cancelled`.
pub async fn cancel_order<B: OrderManagement + CartManagement>(
    identity: UserIdentity,
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ DELETE order [{order_id}] by {}", identity.email);
    let order = api.cancel_order(&identity.email, &order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(search_orders => Get "/search/orders" impl OrderManagement, CartManagement where requires [Role::Admin]);
pub async fn search_orders<B: OrderManagement + CartManagement>(
    query: web::Query<OrderSearchParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let filter = OrderQueryFilter::from(query.into_inner());
    debug!("💻️ GET orders search for [{filter}]");
    let orders = api.search_orders(filter).await?;
    Ok(HttpResponse::Ok().json(orders))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(initiate_payment => Post "/payments/initiate" impl PaymentManagement, CartManagement where requires [Role::Buyer]);
/// Stages the cart for online payment and returns the signed form to post to the payment gateway.
pub async fn initiate_payment<B: PaymentManagement + CartManagement>(
    identity: UserIdentity,
    body: web::Json<PaymentInitiation>,
    api: web::Data<PaymentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST payment for cart {} by {}", request.cart_id, identity.email);
    let form = api.initiate_payment(&identity.email, request).await?;
    Ok(HttpResponse::Ok().json(form))
}

route!(payment_success => Get "/payments/success" impl PaymentManagement, CartManagement where requires [Role::Buyer]);
/// The gateway's success redirect, relayed by the buyer's browser with the gateway's query parameters intact.
pub async fn payment_success<B: PaymentManagement + CartManagement>(
    req: HttpRequest,
    identity: UserIdentity,
    query: web::Query<HashMap<String, String>>,
    options: web::Data<ServerOptions>,
    api: web::Data<PaymentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let ip = get_remote_ip(&req, options.use_x_forwarded_for);
    info!("💻️ Payment success callback for {} from {ip:?}", identity.email);
    let result = api.reconcile(&identity.email, &query.into_inner()).await.map_err(|e| {
        warn!("💻️ Payment callback for {} from {ip:?} was rejected. {e}", identity.email);
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(result))
}

route!(payment_failure => Get "/payments/failure" impl PaymentManagement, CartManagement where requires [Role::Buyer]);
/// The gateway's failure redirect. Nothing is recorded, and the cart is left as it was.
pub async fn payment_failure<B: PaymentManagement + CartManagement>(
    identity: UserIdentity,
    query: web::Query<HashMap<String, String>>,
    api: web::Data<PaymentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let uuid = api.payment_failed(&identity.email, &query.into_inner()).await;
    let message = match uuid {
        Some(uuid) => format!("Payment {uuid} was not completed. Your cart has been kept."),
        None => "Payment was not completed. Your cart has been kept.".to_string(),
    };
    Ok(HttpResponse::Ok().json(JsonResponse::failure(message)))
}

route!(my_transactions => Get "/transactions" impl PaymentManagement, CartManagement where requires [Role::Buyer, Role::Farmer, Role::Supplier]);
/// Transactions where the caller is the buyer or the seller, newest first.
pub async fn my_transactions<B: PaymentManagement + CartManagement>(
    identity: UserIdentity,
    api: web::Data<PaymentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET transactions for {}", identity.email);
    let transactions = api.transactions_for_email(&identity.email).await?;
    Ok(HttpResponse::Ok().json(transactions))
}

route!(delete_transaction => Delete "/transactions/{id}" impl PaymentManagement, CartManagement where requires [Role::Buyer]);
pub async fn delete_transaction<B: PaymentManagement + CartManagement>(
    identity: UserIdentity,
    path: web::Path<i64>,
    api: web::Data<PaymentApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ DELETE transaction #{id} by {}", identity.email);
    api.delete_transaction(&identity.email, id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Transaction {id} deleted"))))
}
