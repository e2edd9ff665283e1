//! SQLite-backed key-value persistence.

mod connection;
mod migrations;
pub mod repositories;

pub use connection::Database;
