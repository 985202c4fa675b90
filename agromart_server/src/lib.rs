//! # AgroMart server
//! This crate hosts the HTTP server for the AgroMart marketplace. It is responsible for:
//! * Reading the caller's identity from the headers set by the upstream identity proxy.
//! * Checking the caller's role against each route's access list.
//! * Translating requests into calls on the `agromart_engine` APIs, and engine errors into HTTP responses.
//! * Periodically purging payment drafts that were never settled.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! Public routes:
//! * `GET /health`: A health check route that returns a 200 OK response.
//! * `GET /catalog/{kind}`, `/catalog/{kind}/categories`, `/catalog/{kind}/sellers`, `/catalog/{kind}/sellers/{email}`
//! * `GET /listings/{id}`
//!
//! Routes under `/api` need the `ams_user_email` and `ams_user_role` headers:
//! * Listings: `POST /listings`, `DELETE /listings/{id}`, `POST /listings/{id}/stock` (farmers and suppliers)
//! * Carts: `POST /carts`, `GET /carts/{id}`, `POST /carts/{id}/lines`, `PUT` and `DELETE /carts/{id}/lines/{listing}`
//! * Orders: `POST /checkout`, `GET /orders`, `GET /orders/seller`, `GET /orders/{id}/timeline`,
//!   `PUT /orders/{id}/status`, `DELETE /orders/{id}`, `GET /search/orders` (admins)
//! * Payments: `POST /payments/initiate`, `GET /payments/success`, `GET /payments/failure`, `GET /transactions`,
//!   `DELETE /transactions/{id}`

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
