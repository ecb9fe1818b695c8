//! # dapi HTTP Server Module
//!
//! Serves the CRUD dispatcher and the batch endpoint over axum.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `{prefix}/transaction` - Atomic batches
//! - everything else - CRUD dispatcher, with or without `{prefix}`

mod routes;
mod server;

pub use routes::AppState;
pub use server::HttpServer;
