//! CRUD handlers
//!
//! One handler per verb. Each resolves its table from the catalog, builds a
//! statement, applies it through whatever [`ExecutionContext`] it is given
//! and writes the outcome to the sink. Errors are returned to the
//! dispatcher, which records them on the sink.

use std::sync::Arc;

use axum::http::StatusCode;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

use super::meta::Meta;
use super::params::ListParams;
use super::request::HandlerRequest;
use super::response::{AffectedResponse, InsertResponse};
use super::sink::{write_json, ResponseSink};
use crate::catalog::{Catalog, Table};
use crate::context::ExecutionContext;
use crate::error::{DapiError, DapiResult};
use crate::query::{assignments_from_object, json_to_sql, Statement};

/// Signature shared by every routed handler
pub type HandlerFn = fn(
    &ApiHandlers,
    &dyn ExecutionContext,
    &HandlerRequest,
    &mut dyn ResponseSink,
) -> DapiResult<()>;

/// Shared state for the CRUD handlers
#[derive(Debug, Clone)]
pub struct ApiHandlers {
    catalog: Arc<Catalog>,
    /// Path prefix the live server mounts CRUD routes under
    prefix: String,
    allow_unfiltered_delete: bool,
}

impl ApiHandlers {
    pub fn new(catalog: Arc<Catalog>, prefix: impl Into<String>) -> Self {
        Self {
            catalog,
            prefix: prefix.into(),
            allow_unfiltered_delete: false,
        }
    }

    /// Permit DELETE with only a limit and no filter
    pub fn allow_unfiltered_delete(mut self, allow: bool) -> Self {
        self.allow_unfiltered_delete = allow;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn table(&self, req: &HandlerRequest) -> DapiResult<&Table> {
        let name = req
            .param("table")
            .ok_or_else(|| DapiError::Internal("route has no table segment".to_string()))?;
        self.catalog.table(name)
    }

    fn location(&self, table: &str) -> String {
        format!("{}/crud/{}", self.prefix, table)
    }

    /// `GET /`
    pub fn index(
        &self,
        _ctx: &dyn ExecutionContext,
        _req: &HandlerRequest,
        sink: &mut dyn ResponseSink,
    ) -> DapiResult<()> {
        let text = format!(
            "Root. Available paths: {p}/crud/_meta, {p}/crud/:table, {p}/crud/:table/_meta, {p}/transaction",
            p = self.prefix
        );
        sink.set_status(StatusCode::OK);
        sink.set_content_type("text/plain; charset=utf-8");
        sink.write_body(text.as_bytes());
        Ok(())
    }

    /// `GET /crud/{table}`
    pub fn list(
        &self,
        ctx: &dyn ExecutionContext,
        req: &HandlerRequest,
        sink: &mut dyn ResponseSink,
    ) -> DapiResult<()> {
        let table = self.table(req)?;
        let params = ListParams::parse(&req.query)?;

        let statement = Statement::select(
            table,
            params.filters,
            params.limit,
            params.offset,
            params.order,
        );
        let rows = ctx.query(&statement)?;
        write_json(sink, StatusCode::OK, &rows)
    }

    /// `POST /crud/{table}`
    pub fn insert(
        &self,
        ctx: &dyn ExecutionContext,
        req: &HandlerRequest,
        sink: &mut dyn ResponseSink,
    ) -> DapiResult<()> {
        let table = self.table(req)?;
        let body = req.json_object()?;

        let outcome = ctx.exec(&Statement::insert(table, assignments_from_object(&body)))?;

        // last_insert_rowid() is untouched by WITHOUT ROWID inserts
        let inserted_id = if table.without_rowid {
            table
                .primary_key()
                .and_then(|key| body.get(&key.name))
                .cloned()
                .unwrap_or(Value::Null)
        } else {
            Value::from(outcome.last_insert_id)
        };
        write_json(sink, StatusCode::OK, &InsertResponse::success(inserted_id))
    }

    /// `PUT /crud/{table}` and `PUT /crud/{table}/{id}`
    pub fn update(
        &self,
        ctx: &dyn ExecutionContext,
        req: &HandlerRequest,
        sink: &mut dyn ResponseSink,
    ) -> DapiResult<()> {
        let table = self.table(req)?;
        let key = table.primary_key().ok_or_else(|| {
            DapiError::MissingPrimaryKey(format!("table ({}) has no primary key", table.name))
        })?;

        let mut body = req.json_object()?;
        let from_body = body.remove(&key.name).filter(|v| !v.is_null());

        let key_value = match (req.param("id"), from_body) {
            (Some(id), _) => path_value(id),
            (None, Some(value)) => json_to_sql(&value),
            (None, None) => {
                return Err(DapiError::MissingPrimaryKey(format!(
                    "no value for ({}) on table ({})",
                    key.name, table.name
                )))
            }
        };

        let statement = Statement::update(
            table,
            assignments_from_object(&body),
            vec![(key.name.clone(), key_value)],
        );
        let outcome = ctx.exec(&statement)?;
        write_json(
            sink,
            StatusCode::OK,
            &AffectedResponse::success(outcome.rows_affected),
        )
    }

    /// `DELETE /crud/{table}`
    pub fn delete(
        &self,
        ctx: &dyn ExecutionContext,
        req: &HandlerRequest,
        sink: &mut dyn ResponseSink,
    ) -> DapiResult<()> {
        let table = self.table(req)?;
        let mut body = req.json_object()?;

        let limit = match body.remove("limit") {
            None | Some(Value::Null) => return Err(DapiError::MissingLimit),
            Some(value) => value.as_i64().ok_or_else(|| {
                DapiError::MalformedBody(format!("limit must be an integer, got {}", value))
            })?,
        };
        if limit <= 0 {
            return Err(DapiError::MissingLimit);
        }

        let predicate = assignments_from_object(&body);
        if predicate.is_empty() && !self.allow_unfiltered_delete {
            return Err(DapiError::UnfilteredDelete(table.name.clone()));
        }

        let outcome = ctx.exec(&Statement::delete(table, predicate, limit))?;
        write_json(
            sink,
            StatusCode::OK,
            &AffectedResponse::success(outcome.rows_affected),
        )
    }

    /// `GET /crud/{table}/_meta`
    pub fn table_meta(
        &self,
        _ctx: &dyn ExecutionContext,
        req: &HandlerRequest,
        sink: &mut dyn ResponseSink,
    ) -> DapiResult<()> {
        let table = self.table(req)?;
        let metas = Meta::for_table(table, &self.location(&table.name));
        write_json(sink, StatusCode::OK, &metas)
    }

    /// `GET /crud/_meta`
    pub fn database_meta(
        &self,
        _ctx: &dyn ExecutionContext,
        _req: &HandlerRequest,
        sink: &mut dyn ResponseSink,
    ) -> DapiResult<()> {
        let metas: Vec<Meta> = self
            .catalog
            .tables()
            .flat_map(|table| Meta::for_table(table, &self.location(&table.name)))
            .collect();
        write_json(sink, StatusCode::OK, &metas)
    }
}

/// Path segments are text; integral ones bind as integers
fn path_value(segment: &str) -> SqlValue {
    match segment.parse::<i64>() {
        Ok(n) => SqlValue::Integer(n),
        Err(_) => SqlValue::Text(segment.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::sink::CaptureSink;
    use crate::catalog::{CatalogLoader, Column};
    use crate::context::{ConnectionPool, DatabaseTarget, PoolContext, PoolOptions};
    use serde_json::json;

    fn setup(allow_unfiltered: bool) -> (ApiHandlers, PoolContext) {
        let pool =
            ConnectionPool::open(DatabaseTarget::parse(":memory:"), PoolOptions::default()).unwrap();
        pool.checkout()
            .unwrap()
            .execute_batch(
                "CREATE TABLE user (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT);
                 CREATE TABLE tag (a TEXT, b TEXT, PRIMARY KEY (a, b));",
            )
            .unwrap();

        let catalog = Catalog::from_tables(vec![
            Table::new(
                "user",
                vec![
                    Column::new("id", 1, "integer").primary(),
                    Column::new("name", 2, "text").not_null(),
                    Column::new("email", 3, "text"),
                ],
            ),
            Table::new(
                "tag",
                vec![Column::new("a", 1, "text"), Column::new("b", 2, "text")],
            ),
        ]);
        let handlers = ApiHandlers::new(Arc::new(catalog), "/api/v1")
            .allow_unfiltered_delete(allow_unfiltered);
        (handlers, PoolContext::new(pool))
    }

    fn request(method: &str, url: &str, body: Value, params: &[(&str, &str)]) -> HandlerRequest {
        let body = if body.is_null() {
            Vec::new()
        } else {
            serde_json::to_vec(&body).unwrap()
        };
        let mut req = HandlerRequest::from_parts(method, url, body).unwrap();
        for (k, v) in params {
            req.params.insert(k.to_string(), v.to_string());
        }
        req
    }

    fn run(
        handler: HandlerFn,
        handlers: &ApiHandlers,
        ctx: &PoolContext,
        req: &HandlerRequest,
    ) -> DapiResult<Value> {
        let mut sink = CaptureSink::new();
        handler(handlers, ctx, req, &mut sink)?;
        Ok(sink.into_sub_response().body)
    }

    fn insert_jack(handlers: &ApiHandlers, ctx: &PoolContext) -> i64 {
        let req = request(
            "POST",
            "/crud/user",
            json!({"name": "jack", "email": "jack@example.com"}),
            &[("table", "user")],
        );
        let body = run(ApiHandlers::insert, handlers, ctx, &req).unwrap();
        body["inserted_id"].as_i64().unwrap()
    }

    #[test]
    fn test_insert_then_list() {
        let (handlers, ctx) = setup(false);
        let id = insert_jack(&handlers, &ctx);

        let req = request("GET", "/crud/user?name=jack", Value::Null, &[("table", "user")]);
        let rows = run(ApiHandlers::list, &handlers, &ctx, &req).unwrap();
        assert_eq!(rows[0]["id"], id);
        assert_eq!(rows[0]["email"], "jack@example.com");
    }

    #[test]
    fn test_list_unknown_table() {
        let (handlers, ctx) = setup(false);
        let req = request("GET", "/crud/ghost", Value::Null, &[("table", "ghost")]);
        let result = run(ApiHandlers::list, &handlers, &ctx, &req);
        assert_eq!(result, Err(DapiError::UnknownTable("ghost".to_string())));
    }

    #[test]
    fn test_update_key_from_body_or_path() {
        let (handlers, ctx) = setup(false);
        let id = insert_jack(&handlers, &ctx);

        let req = request(
            "PUT",
            "/crud/user",
            json!({"id": id, "email": "new@example.com"}),
            &[("table", "user")],
        );
        let body = run(ApiHandlers::update, &handlers, &ctx, &req).unwrap();
        assert_eq!(body["rows_affected"], 1);

        let id_text = id.to_string();
        let req = request(
            "PUT",
            &format!("/crud/user/{}", id),
            json!({"name": "jill"}),
            &[("table", "user"), ("id", id_text.as_str())],
        );
        let body = run(ApiHandlers::update, &handlers, &ctx, &req).unwrap();
        assert_eq!(body["rows_affected"], 1);
    }

    #[test]
    fn test_update_requires_key() {
        let (handlers, ctx) = setup(false);

        let req = request("PUT", "/crud/user", json!({"name": "x"}), &[("table", "user")]);
        let result = run(ApiHandlers::update, &handlers, &ctx, &req);
        assert!(matches!(result, Err(DapiError::MissingPrimaryKey(_))));

        let req = request("PUT", "/crud/tag", json!({"a": "x"}), &[("table", "tag")]);
        let result = run(ApiHandlers::update, &handlers, &ctx, &req);
        assert!(matches!(result, Err(DapiError::MissingPrimaryKey(_))));
    }

    #[test]
    fn test_delete_limit_rules() {
        let (handlers, ctx) = setup(false);
        insert_jack(&handlers, &ctx);

        let cases = vec![
            (json!({"name": "jack"}), DapiError::MissingLimit),
            (json!({"name": "jack", "limit": 0}), DapiError::MissingLimit),
            (json!({"limit": 1}), DapiError::UnfilteredDelete("user".to_string())),
        ];
        for (body, expected) in cases {
            let req = request("DELETE", "/crud/user", body, &[("table", "user")]);
            assert_eq!(run(ApiHandlers::delete, &handlers, &ctx, &req), Err(expected));
        }

        let req = request(
            "DELETE",
            "/crud/user",
            json!({"name": "jack", "limit": "1"}),
            &[("table", "user")],
        );
        assert!(matches!(
            run(ApiHandlers::delete, &handlers, &ctx, &req),
            Err(DapiError::MalformedBody(_))
        ));

        let req = request(
            "DELETE",
            "/crud/user",
            json!({"name": "jack", "limit": 1}),
            &[("table", "user")],
        );
        let body = run(ApiHandlers::delete, &handlers, &ctx, &req).unwrap();
        assert_eq!(body["rows_affected"], 1);
    }

    #[test]
    fn test_unfiltered_delete_when_allowed() {
        let (handlers, ctx) = setup(true);
        insert_jack(&handlers, &ctx);
        insert_jack(&handlers, &ctx);

        let req = request("DELETE", "/crud/user", json!({"limit": 10}), &[("table", "user")]);
        let body = run(ApiHandlers::delete, &handlers, &ctx, &req).unwrap();
        assert_eq!(body["rows_affected"], 2);
    }

    #[test]
    fn test_without_rowid_insert_and_delete() {
        let pool =
            ConnectionPool::open(DatabaseTarget::parse(":memory:"), PoolOptions::default()).unwrap();
        let conn = pool.checkout().unwrap();
        conn.execute_batch(
            "CREATE TABLE tag (name TEXT PRIMARY KEY, v TEXT) WITHOUT ROWID;
             CREATE TABLE edge (src INTEGER, dst INTEGER, PRIMARY KEY (src, dst)) WITHOUT ROWID;",
        )
        .unwrap();
        let catalog = CatalogLoader::load(&conn).unwrap();
        drop(conn);
        let handlers = ApiHandlers::new(Arc::new(catalog), "/api/v1");
        let ctx = PoolContext::new(pool);

        for name in ["a", "b"] {
            let req = request("POST", "/crud/tag", json!({"name": name, "v": "x"}), &[("table", "tag")]);
            let body = run(ApiHandlers::insert, &handlers, &ctx, &req).unwrap();
            assert_eq!(body["inserted_id"], name);
        }

        let req = request("DELETE", "/crud/tag", json!({"name": "a", "limit": 1}), &[("table", "tag")]);
        let body = run(ApiHandlers::delete, &handlers, &ctx, &req).unwrap();
        assert_eq!(body["rows_affected"], 1);

        let req = request("GET", "/crud/tag", Value::Null, &[("table", "tag")]);
        let rows = run(ApiHandlers::list, &handlers, &ctx, &req).unwrap();
        assert_eq!(rows, json!([{"name": "b", "v": "x"}]));

        // composite key: no single id to report, rows still bounded by key
        for dst in [1, 2, 3] {
            let req = request("POST", "/crud/edge", json!({"src": 1, "dst": dst}), &[("table", "edge")]);
            let body = run(ApiHandlers::insert, &handlers, &ctx, &req).unwrap();
            assert_eq!(body["inserted_id"], Value::Null);
        }
        let req = request("DELETE", "/crud/edge", json!({"src": 1, "limit": 2}), &[("table", "edge")]);
        let body = run(ApiHandlers::delete, &handlers, &ctx, &req).unwrap();
        assert_eq!(body["rows_affected"], 2);
    }

    #[test]
    fn test_meta_documents() {
        let (handlers, ctx) = setup(false);

        let req = request("GET", "/crud/user/_meta", Value::Null, &[("table", "user")]);
        let body = run(ApiHandlers::table_meta, &handlers, &ctx, &req).unwrap();
        assert_eq!(body.as_array().unwrap().len(), 4);
        assert_eq!(body[0]["location"], "/api/v1/crud/user");

        let req = request("GET", "/crud/_meta", Value::Null, &[]);
        let body = run(ApiHandlers::database_meta, &handlers, &ctx, &req).unwrap();
        assert_eq!(body.as_array().unwrap().len(), 8);
    }
}
