//! # Query Composition
//!
//! Builds parameterized statements (insert, update, delete, select) from a
//! catalog table plus ordered assignment lists.

mod statement;
mod value;

pub use statement::{quote_ident, ComposedStatement, OrderBy, Statement};
pub use value::{assignments_from_object, json_to_sql, sql_to_json, Assignments};
