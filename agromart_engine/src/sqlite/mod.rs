//! SQLite backend for the AgroMart fulfilment engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
