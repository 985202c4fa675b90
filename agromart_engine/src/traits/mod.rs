//! # Backend contracts
//!
//! This module defines the behaviour that a database backend needs to expose in order to be used by the AgroMart
//! fulfilment engine. The public APIs in [`crate::market_api`] are generic over these traits, so that they can be
//! driven by SQLite in production and by mocks in tests.
//!
//! ## Traits
//! * [`InventoryManagement`] owns listings and their stock counters. It is the only place where stock is mutated.
//! * [`CartManagement`] holds server-side carts. Every cart mutation reserves or releases stock in the same database
//!   transaction as the cart change.
//! * [`OrderManagement`] persists seller orders, their status history, and performs status compare-and-swap updates.
//! * [`PaymentManagement`] stages payment drafts and settles gateway payments into orders and transactions.
//! * [`CatalogManagement`] provides read-only listing queries for discovery.
mod cart_management;
mod catalog_management;
mod inventory_management;
mod order_management;
mod payment_management;

mod data_objects;

pub use cart_management::{CartError, CartManagement};
pub use catalog_management::{CatalogError, CatalogManagement};
pub use data_objects::{SettledPayment, UnmatchedPayment};
pub use inventory_management::{InventoryError, InventoryManagement};
pub use order_management::{OrderFlowError, OrderManagement};
pub use payment_management::{PaymentError, PaymentManagement};
