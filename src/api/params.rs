//! # List Parameter Parser
//!
//! Splits a list request's query string into reserved keys (`limit`,
//! `offset`, `order`) and equality filters.

use rusqlite::types::Value as SqlValue;

use crate::error::{DapiError, DapiResult};
use crate::query::{Assignments, OrderBy};

/// Parsed list parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListParams {
    /// Equality filters in query-string order; unknown columns are dropped later
    pub filters: Assignments,

    pub order: Vec<OrderBy>,

    /// Number of rows to return (None = all)
    pub limit: Option<i64>,

    /// Number of rows to skip; ignored without a limit
    pub offset: Option<i64>,
}

impl ListParams {
    /// Parse query pairs. When a key repeats, the first occurrence wins.
    pub fn parse(pairs: &[(String, String)]) -> DapiResult<Self> {
        let mut result = ListParams::default();
        let mut seen: Vec<&str> = Vec::new();

        for (key, value) in pairs {
            if seen.contains(&key.as_str()) {
                continue;
            }
            seen.push(key);

            match key.as_str() {
                "limit" => result.limit = Some(parse_count("limit", value)?),
                "offset" => result.offset = Some(parse_count("offset", value)?),
                "order" => result.order = parse_order(value)?,
                _ => result
                    .filters
                    .push((key.clone(), SqlValue::Text(value.clone()))),
            }
        }

        Ok(result)
    }
}

/// Parse order parameter (comma-separated `column[.asc|.desc]`)
fn parse_order(value: &str) -> DapiResult<Vec<OrderBy>> {
    let mut orders = Vec::new();

    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let order = match part.rsplit_once('.') {
            Some((column, direction)) => match direction.to_ascii_lowercase().as_str() {
                "asc" => OrderBy::asc(column),
                "desc" => OrderBy::desc(column),
                _ => {
                    return Err(DapiError::MalformedQuery(format!(
                        "invalid order direction: {}",
                        direction
                    )))
                }
            },
            None => OrderBy::asc(part),
        };
        orders.push(order);
    }

    Ok(orders)
}

/// Non-negative integer for `limit` / `offset`
fn parse_count(name: &str, value: &str) -> DapiResult<i64> {
    match value.trim().parse::<i64>() {
        Ok(n) if n >= 0 => Ok(n),
        _ => Err(DapiError::MalformedQuery(format!(
            "invalid {}: {}",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_reserved_and_filters() {
        let params = ListParams::parse(&pairs(&[
            ("name", "jack"),
            ("limit", "10"),
            ("offset", "5"),
        ]))
        .unwrap();

        assert_eq!(params.limit, Some(10));
        assert_eq!(params.offset, Some(5));
        assert_eq!(
            params.filters,
            vec![("name".to_string(), SqlValue::Text("jack".to_string()))]
        );
    }

    #[test]
    fn test_parse_order() {
        let params = ListParams::parse(&pairs(&[("order", "name.desc, id,email.ASC")])).unwrap();
        assert_eq!(
            params.order,
            vec![OrderBy::desc("name"), OrderBy::asc("id"), OrderBy::asc("email")]
        );

        let bad = ListParams::parse(&pairs(&[("order", "name.sideways")]));
        assert!(matches!(bad, Err(DapiError::MalformedQuery(_))));
    }

    #[test]
    fn test_invalid_counts() {
        for (key, value) in [("limit", "ten"), ("limit", "-1"), ("offset", "1.5")] {
            let result = ListParams::parse(&pairs(&[(key, value)]));
            assert!(matches!(result, Err(DapiError::MalformedQuery(_))));
        }
    }

    #[test]
    fn test_first_duplicate_wins() {
        let params =
            ListParams::parse(&pairs(&[("name", "jack"), ("name", "jill"), ("limit", "1")]))
                .unwrap();
        assert_eq!(params.filters.len(), 1);
        assert_eq!(params.filters[0].1, SqlValue::Text("jack".to_string()));
    }
}
