//! # AgroMart fulfilment public API
//!
//! The `market_api` module exposes the programmatic API of the fulfilment engine. The API is modular, so that clients
//! pick the parts they need:
//!
//! * [`inventory_api`] creates and deletes listings and applies stock adjustments.
//! * [`cart_api`] manages server-owned carts. Cart lines reserve stock as they are added.
//! * [`order_flow_api`] checks carts out into seller orders and moves orders through their statuses.
//! * [`payment_api`] runs the online payment round trip through the payment gateway.
//! * [`catalog_api`] provides read-only discovery views.
//!
//! The other submodules hold the pure parts of the flows ([`order_splitter`], [`status_timeline`]) and the request
//! and response types.
//!
//! # API usage
//!
//! Every API is created by supplying a database backend that implements the backend traits the API needs.
//!
//! ```rust,ignore
//! use agromart_engine::{events::EventProducers, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/agromart.db", 25).await?;
//! // SqliteDatabase implements OrderManagement and CartManagement
//! let api = OrderFlowApi::new(db, EventProducers::default());
//! let orders = api.orders_for_buyer("buyer@example.com").await?;
//! ```
pub mod cart_api;
pub mod catalog_api;
pub mod inventory_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod order_splitter;
pub mod payment_api;
pub mod payment_objects;
pub mod status_timeline;
