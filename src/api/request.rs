//! Handler input
//!
//! A transport-neutral request: the live server builds one from the axum
//! request parts, the batch coordinator from each sub-request.

use std::collections::BTreeMap;

use axum::extract::Query;
use axum::http::{Method, Uri};
use serde_json::{Map, Value};

use crate::error::{DapiError, DapiResult};

#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub method: Method,
    /// Path without query string, as received
    pub path: String,
    /// Query-string pairs in the order given
    pub query: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Filled in by the dispatcher from `{name}` segments
    pub params: BTreeMap<String, String>,
}

impl HandlerRequest {
    pub fn new(method: Method, uri: &Uri, body: Vec<u8>) -> DapiResult<Self> {
        let query = match uri.query() {
            Some(_) => {
                let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
                    .map_err(|e| DapiError::MalformedQuery(e.to_string()))?;
                pairs
            }
            None => Vec::new(),
        };

        Ok(Self {
            method,
            path: uri.path().to_string(),
            query,
            body,
            params: BTreeMap::new(),
        })
    }

    /// Build from a method name and a URL string such as `/crud/user?id=1`
    pub fn from_parts(method: &str, url: &str, body: Vec<u8>) -> DapiResult<Self> {
        let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| DapiError::MalformedBody(format!("invalid method ({})", method)))?;
        let uri: Uri = url
            .parse()
            .map_err(|_| DapiError::MalformedBody(format!("invalid url ({})", url)))?;
        Self::new(method, &uri, body)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// The body as a flat JSON object; an empty body is an empty object
    pub fn json_object(&self) -> DapiResult<Map<String, Value>> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        match serde_json::from_slice(&self.body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(DapiError::MalformedBody(
                "expected a JSON object".to_string(),
            )),
            Err(e) => Err(DapiError::MalformedBody(e.to_string())),
        }
    }
}
