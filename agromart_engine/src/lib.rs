//! AgroMart fulfilment engine
//!
//! This library holds the order-fulfilment core of the AgroMart agricultural marketplace: stock reservation, splitting
//! carts into seller orders, the order status machine, and reconciliation of online payments. It is independent of
//! the HTTP layer.
//!
//! The library is divided into three main sections:
//! 1. Backend contracts ([`mod@traits`]) and the SQLite backend ([`SqliteDatabase`]). You should never need to access
//!    the database directly. The exception is the data types stored in the database, which are defined in the
//!    [`db_types`] module and are public.
//! 2. The public API ([`market_api`]), which provides the fulfilment flows on top of any backend that implements the
//!    traits.
//! 3. Events ([`mod@events`]). The APIs publish an event after each committed order, status change and payment, and
//!    callers can hook into these with async handlers.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod market_api;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use market_api::{
    cart_api::CartApi,
    catalog_api,
    catalog_api::CatalogApi,
    inventory_api::InventoryApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    order_splitter,
    payment_api::PaymentApi,
    payment_objects,
    status_timeline,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
