use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderName, HeaderValue},
    middleware,
    routing::{get, post},
};
use gatehouse_storage::UserStore;
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::{
    cache::Cache,
    config::AppConfig,
    directory::UserDirectory,
    forwarder::ProcessingForwarder,
    handlers,
    health::{DependencyProber, HealthAggregator},
    middleware as app_middleware,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<UserDirectory>,
    pub health: Arc<HealthAggregator>,
    pub forwarder: ProcessingForwarder,
}

impl AppState {
    /// Wire the components from explicitly constructed clients.
    pub fn new(
        cfg: &AppConfig,
        store: Arc<dyn UserStore>,
        cache: Arc<dyn Cache>,
        http: reqwest::Client,
    ) -> Self {
        let directory = UserDirectory::new(store.clone(), cache.clone(), cfg.cache.users_ttl());
        let prober = DependencyProber::new(
            http.clone(),
            &cfg.processing.base_url,
            cfg.processing.health_timeout(),
        );
        let forwarder = ProcessingForwarder::new(
            http,
            &cfg.processing.base_url,
            cfg.processing.request_timeout(),
        );

        Self {
            directory: Arc::new(directory),
            health: Arc::new(HealthAggregator::new(store, cache, prober)),
            forwarder,
        }
    }
}

pub struct GatehouseServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(state: AppState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/api/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route("/api/process-with-python", post(handlers::process))
        // Only matched routes carry a MatchedPath for the route label
        .route_layer(middleware::from_fn(app_middleware::track_metrics))
        .fallback(handlers::not_found)
        // Known path with an unsupported method answers like an unknown route
        .method_not_allowed_fallback(handlers::not_found)
        .with_state(state)
        // Middleware stack, innermost first: panic recovery -> security headers -> cors -> trace -> request id -> body limit
        .layer(CatchPanicLayer::custom(app_middleware::catch_panic))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let req_id = req
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = tracing::field::Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Connect the store and cache, then assemble the router.
    pub async fn build(self) -> anyhow::Result<GatehouseServer> {
        let store = crate::create_user_store(&self.config.storage).await?;
        let cache = crate::create_cache_backend(&self.config.redis).await;
        tracing::info!(
            store = store.backend_name(),
            cache = cache.mode(),
            "backends initialized"
        );

        let http = reqwest::Client::builder()
            .user_agent(concat!("gatehouse/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let state = AppState::new(&self.config, store, Arc::new(cache), http);
        let app = build_app(state, &self.config);

        Ok(GatehouseServer {
            addr: self.addr,
            app,
        })
    }
}

impl GatehouseServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
