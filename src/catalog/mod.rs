//! Catalog: table and column metadata
//!
//! The catalog is the only trusted source of identifiers. Statement text
//! never contains a table or column name that did not come from here.

mod loader;
mod types;

pub use loader::CatalogLoader;
pub use types::{Catalog, Column, Table};
