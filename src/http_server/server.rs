//! # HTTP Server
//!
//! Opens the pool, loads the catalog and serves the axum router.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::routes::{dispatch_handler, health_handler, transaction_handler, AppState};
use crate::api::{ApiHandlers, Dispatcher};
use crate::batch::TransactionCoordinator;
use crate::catalog::{Catalog, CatalogLoader};
use crate::config::DapiConfig;
use crate::context::{ConnectionPool, DatabaseTarget};
use crate::error::DapiResult;
use crate::observability::{log_event_with_fields, Event};

pub struct HttpServer {
    config: DapiConfig,
    state: Arc<AppState>,
    catalog: Arc<Catalog>,
}

impl HttpServer {
    /// Open the configured database and introspect its tables
    pub fn bootstrap(config: DapiConfig) -> DapiResult<Self> {
        let target = DatabaseTarget::parse(&config.database);
        let pool = ConnectionPool::open(target, config.pool_options())?;
        let catalog = {
            let conn = pool.checkout()?;
            CatalogLoader::load(&conn)?
        };
        Ok(Self::with_catalog(config, pool, catalog))
    }

    /// Assemble from an already open pool and catalog
    pub fn with_catalog(config: DapiConfig, pool: ConnectionPool, catalog: Catalog) -> Self {
        let catalog = Arc::new(catalog);
        let handlers = ApiHandlers::new(catalog.clone(), config.prefix())
            .allow_unfiltered_delete(config.allow_unfiltered_delete);
        let dispatcher = Arc::new(Dispatcher::new(handlers));
        let coordinator =
            TransactionCoordinator::new(pool.clone(), dispatcher.clone(), config.batch_options());

        let state = Arc::new(AppState {
            pool,
            dispatcher,
            coordinator,
        });
        Self {
            config,
            state,
            catalog,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    fn cors(&self) -> CorsLayer {
        if self.config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = self
                .config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }

    /// Build the router (also used directly by tests)
    ///
    /// The batch endpoint is reachable with or without the prefix, the same
    /// way the dispatcher resolves CRUD paths.
    pub fn router(&self) -> Router {
        let mut transaction_paths = vec!["/transaction".to_string()];
        let prefixed = format!("{}/transaction", self.config.prefix());
        if !transaction_paths.contains(&prefixed) {
            transaction_paths.push(prefixed);
        }

        let mut router = Router::new().route("/health", get(health_handler));
        for path in &transaction_paths {
            router = router.route(path, post(transaction_handler));
        }
        router
            .fallback(dispatch_handler)
            .layer(self.cors())
            .with_state(self.state.clone())
    }

    pub async fn start(self) -> io::Result<()> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid listen address {}: {}", self.config.socket_addr(), e),
            )
        })?;

        let listener = TcpListener::bind(addr).await?;
        log_event_with_fields(
            Event::ServerListening,
            &[
                ("addr", &addr.to_string()),
                ("prefix", self.config.prefix()),
                ("tables", &self.catalog.len().to_string()),
            ],
        );

        axum::serve(listener, self.router()).await
    }
}
