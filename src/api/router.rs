//! Dispatcher
//!
//! A single route table mapping (method, path pattern) to a handler. The live
//! server and the batch coordinator both resolve through it, each binding it
//! to their own execution context. Routes match in registration order, so
//! literal segments must be registered before patterns that would shadow them.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::http::Method;

use super::handler::{ApiHandlers, HandlerFn};
use super::request::HandlerRequest;
use super::sink::ResponseSink;
use crate::context::ExecutionContext;
use crate::error::{DapiError, DapiResult};
use crate::observability::{log_event_with_fields, Event};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(&'static str),
    Param(&'static str),
}

struct Route {
    method: Method,
    pattern: Vec<Segment>,
    handler: HandlerFn,
}

impl Route {
    fn new(method: Method, pattern: &'static str, handler: HandlerFn) -> Self {
        let pattern = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(name) => Segment::Param(name),
                None => Segment::Literal(s),
            })
            .collect();
        Self {
            method,
            pattern,
            handler,
        }
    }

    fn matches(&self, segments: &[&str]) -> Option<BTreeMap<String, String>> {
        if self.pattern.len() != segments.len() {
            return None;
        }
        let mut params = BTreeMap::new();
        for (expected, actual) in self.pattern.iter().zip(segments) {
            match expected {
                Segment::Literal(lit) if lit == actual => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.to_string(), actual.to_string());
                }
            }
        }
        Some(params)
    }
}

pub struct Dispatcher {
    handlers: ApiHandlers,
    routes: Vec<Route>,
}

impl Dispatcher {
    /// Dispatcher with the CRUD route table
    pub fn new(handlers: ApiHandlers) -> Self {
        let routes = vec![
            Route::new(Method::GET, "/", ApiHandlers::index),
            Route::new(Method::GET, "/crud/_meta", ApiHandlers::database_meta),
            Route::new(Method::GET, "/crud/{table}/_meta", ApiHandlers::table_meta),
            Route::new(Method::GET, "/crud/{table}", ApiHandlers::list),
            Route::new(Method::POST, "/crud/{table}", ApiHandlers::insert),
            Route::new(Method::PUT, "/crud/{table}", ApiHandlers::update),
            Route::new(Method::PUT, "/crud/{table}/{id}", ApiHandlers::update),
            Route::new(Method::DELETE, "/crud/{table}", ApiHandlers::delete),
        ];
        Self { handlers, routes }
    }

    pub fn handlers(&self) -> &ApiHandlers {
        &self.handlers
    }

    /// Find the handler for a request, with its path parameters
    pub fn resolve(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(HandlerFn, BTreeMap<String, String>)> {
        let relative = self.strip_prefix(path);
        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();

        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| route.matches(&segments).map(|p| (route.handler, p)))
    }

    /// Paths are accepted with or without the configured prefix
    fn strip_prefix<'p>(&self, path: &'p str) -> &'p str {
        let prefix = self.handlers.prefix().trim_end_matches('/');
        if prefix.is_empty() {
            return path;
        }
        match path.strip_prefix(prefix) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
            _ => path,
        }
    }

    pub fn bind<'a>(&'a self, ctx: &'a dyn ExecutionContext) -> BoundDispatcher<'a> {
        BoundDispatcher {
            dispatcher: self,
            ctx,
        }
    }
}

/// Dispatcher tied to one execution context
pub struct BoundDispatcher<'a> {
    dispatcher: &'a Dispatcher,
    ctx: &'a dyn ExecutionContext,
}

impl BoundDispatcher<'_> {
    /// Route and run one request.
    ///
    /// Handler failures are written to the sink. Only an unmatched path is
    /// returned as an error, since no handler ever saw the request.
    pub fn serve(&self, mut req: HandlerRequest, sink: &mut dyn ResponseSink) -> DapiResult<()> {
        let started = Instant::now();
        let (handler, params) = match self.dispatcher.resolve(&req.method, &req.path) {
            Some(found) => found,
            None => {
                let err = DapiError::unknown_path(req.method.as_str(), &req.path);
                log_event_with_fields(
                    Event::RequestFailed,
                    &[
                        ("error", &err.to_string()),
                        ("method", req.method.as_str()),
                        ("path", &req.path),
                    ],
                );
                return Err(err);
            }
        };
        req.params = params;

        if let Err(err) = handler(&self.dispatcher.handlers, self.ctx, &req, sink) {
            sink.error(&err);
            log_event_with_fields(
                Event::RequestFailed,
                &[
                    ("error", &err.to_string()),
                    ("method", req.method.as_str()),
                    ("path", &req.path),
                    ("status", sink.status().as_str()),
                ],
            );
            return Ok(());
        }

        log_event_with_fields(
            Event::RequestComplete,
            &[
                ("duration_us", &started.elapsed().as_micros().to_string()),
                ("method", req.method.as_str()),
                ("path", &req.path),
                ("status", sink.status().as_str()),
            ],
        );
        Ok(())
    }
}
