//! Conversions between JSON payload values and SQL values

use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Number, Value};

/// Ordered `(column, value)` pairs.
///
/// Payloads arrive as unordered maps; everything that reaches the composer
/// is one of these so placeholder order is fixed by construction.
pub type Assignments = Vec<(String, SqlValue)>;

/// Convert a JSON value to the value bound for a placeholder.
///
/// Arrays and objects are stored as their JSON text.
pub fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                SqlValue::Text(n.to_string())
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Convert a column value read from the store into JSON
pub fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Assignments from a JSON object, sorted by key
pub fn assignments_from_object(object: &Map<String, Value>) -> Assignments {
    let mut pairs: Assignments = object
        .iter()
        .map(|(k, v)| (k.clone(), json_to_sql(v)))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}
