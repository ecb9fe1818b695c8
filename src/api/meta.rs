//! Discovery documents
//!
//! One [`Meta`] per (table, verb) describing where the endpoint lives, which
//! properties it accepts and which of them are required.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::Table;

/// Verbs documented for every table, in output order
pub const DOCUMENTED_METHODS: [&str; 4] = ["GET", "POST", "PUT", "DELETE"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    #[serde(rename = "type")]
    pub data_type: String,
    pub description: String,
}

impl Property {
    fn new(data_type: &str, description: &str) -> Self {
        Self {
            data_type: data_type.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meta {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub schema_type: String,
    pub location: String,
    /// Primary-key column, empty when the table has none
    pub primary: String,
    pub properties: BTreeMap<String, Property>,
    pub required: Vec<String>,
    pub method: String,
    pub notes: String,
}

impl Meta {
    pub fn generate(table: &Table, location: &str, method: &str) -> Self {
        let primary = table
            .primary_key()
            .map(|c| c.name.clone())
            .unwrap_or_default();

        let mut properties = BTreeMap::new();
        let mut required = Vec::new();

        for column in &table.columns {
            properties.insert(
                column.name.clone(),
                Property::new(&column.data_type, &column.comment),
            );

            // The key is generated on insert and not needed to read
            let key_optional = matches!(method, "GET" | "POST") && column.name == primary;
            if !column.nullable && !key_optional {
                required.push(column.name.clone());
            }
        }

        // PUT locates its row by primary key
        if method == "PUT" && !primary.is_empty() && !required.contains(&primary) {
            required.push(primary.clone());
        }

        let notes = match method {
            "GET" => {
                properties.insert(
                    "limit".to_string(),
                    Property::new("int", "Used to limit the number of results returned"),
                );
                properties.insert(
                    "offset".to_string(),
                    Property::new("int", "Used to offset results returned"),
                );
                "Query-string keys matching columns filter rows; order=col[.asc|.desc] sorts"
            }
            "PUT" => "The primary key is taken from the path segment when present, otherwise from the body",
            "DELETE" => {
                properties.insert(
                    "limit".to_string(),
                    Property::new("int", "Used to limit the number of records deleted"),
                );
                required.push("limit".to_string());
                "Body keys other than limit filter the rows to delete"
            }
            _ => "",
        };

        Self {
            title: table.name.clone(),
            description: format!("Table {}", table.name),
            schema_type: "object".to_string(),
            location: location.to_string(),
            primary,
            properties,
            required,
            method: method.to_string(),
            notes: notes.to_string(),
        }
    }

    /// Documents for every verb on one table
    pub fn for_table(table: &Table, location: &str) -> Vec<Meta> {
        DOCUMENTED_METHODS
            .iter()
            .map(|method| Meta::generate(table, location, method))
            .collect()
    }
}
