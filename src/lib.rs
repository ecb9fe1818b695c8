//! dapi - a schema-driven REST interface over SQLite
//!
//! Every table in the database gets CRUD endpoints built from its catalog
//! entry. Requests become parameterized statements; a batch endpoint replays
//! several requests inside one transaction.

pub mod api;
pub mod batch;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod http_server;
pub mod observability;
pub mod query;

pub use error::{DapiError, DapiResult};
