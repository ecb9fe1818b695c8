//! # Atomic Batches
//!
//! `POST /transaction` replays CRUD sub-requests inside one database
//! transaction and reports every captured step in a single envelope.
//!
//! ```text
//! {"outcome":"committed","responses":[{"status":200,"body":{...}}]}
//! {"outcome":"rolled_back","failed_step":1,"error":"...","responses":[...]}
//! ```

mod coordinator;
mod types;

pub use coordinator::{BatchOptions, TransactionCoordinator};
pub use types::{BatchOutcome, BatchRequest, BatchResult, SubRequest, SubResponse};
