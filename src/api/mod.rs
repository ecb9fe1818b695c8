//! API Layer for dapi
//!
//! Routes (method, path) pairs to CRUD handlers that run against any
//! execution context and write into any response sink.
//!
//! # Routes
//!
//! - `GET /` - index of available paths
//! - `GET /crud/_meta` - metadata for every table
//! - `GET /crud/{table}/_meta` - metadata for one table
//! - `GET /crud/{table}` - list rows
//! - `POST /crud/{table}` - insert a row
//! - `PUT /crud/{table}[/{id}]` - update by primary key
//! - `DELETE /crud/{table}` - delete with a limit

mod handler;
mod meta;
mod params;
mod request;
mod response;
mod router;
mod sink;

pub use handler::{ApiHandlers, HandlerFn};
pub use meta::{Meta, Property};
pub use params::ListParams;
pub use request::HandlerRequest;
pub use response::{AffectedResponse, HealthResponse, InsertResponse};
pub use router::{BoundDispatcher, Dispatcher};
pub use sink::{write_json, CaptureSink, HttpSink, ResponseSink, JSON_CONTENT_TYPE};
