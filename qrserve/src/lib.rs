//! # qrserve
//!
//! A small HTTP service that turns text into QR code images and reads QR codes back out of
//! uploaded pictures, with a two-tab browser client embedded in the binary.
//!
//! ## Overview
//!
//! - **Generation** (`POST /generate`): text plus optional colors, size and error-correction
//!   level → a PNG stored on disk under a fresh UUID, fetched via `GET /download/{filename}`
//! - **Decoding** (`POST /decode`): multipart image → every QR payload found, returned inline.
//!   Decoding is a cargo feature (`decode`, on by default) and can also be switched off in config.
//! - **Uploads** (`POST /upload`, `GET /uploads/{filename}`): extension-checked image storage
//! - **Client** (`/`): static page served from embedded assets
//!
//! Nothing is kept in memory between requests: the only shared state is the immutable
//! [`AppState`]. Stored files can optionally be expired by a background sweeper
//! (see [`retention`]).
//!
//! ## Running
//!
//! ```bash
//! qrserve -f config.yaml
//! QRSERVE_PORT=8080 QRSERVE_DECODE__ENABLED=false qrserve
//! ```
//!
//! ## Library usage
//!
//! ```no_run
//! use qrserve::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.ok();
//!     })
//!     .await
//! }
//! ```
//!
//! See [`config`] for the configuration layout and [`api`] for the endpoints.

pub mod api;
pub mod config;
pub mod errors;
pub mod openapi;
pub mod qr;
pub mod retention;
mod static_assets;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
mod test;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use config::CorsOrigin;
use storage::Storage;
use tokio::net::TcpListener;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    api::handlers::{qr as qr_handlers, static_assets as assets, uploads},
    openapi::ApiDoc,
};

/// State shared by all request handlers.
///
/// ```ignore
/// let state = AppState::builder().config(config).storage(storage).build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub storage: Storage,
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors = &config.cors;

    let allow_origin = if cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Origins never carry a path, but Url always renders one
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut layer = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if let Some(max_age) = cors.max_age {
        layer = layer.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(layer)
}

/// Builds the router: API routes, docs, embedded client, and the CORS, metrics and tracing layers.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let router = Router::new()
        .route("/", get(assets::serve_index))
        .route("/healthz", get(|| async { "OK" }))
        .route("/generate", post(qr_handlers::generate))
        .route("/download/{filename}", get(qr_handlers::download))
        .route("/decode", post(qr_handlers::decode))
        .route("/upload", post(uploads::upload))
        .route("/uploads/{filename}", get(uploads::get_upload))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .layer(DefaultBodyLimit::max(state.config.limits.max_body_size))
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .fallback(assets::serve_embedded_asset);

    let mut router = router.layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Tasks running alongside the HTTP server.
///
/// Dropping this cancels the tasks via `drop_guard`; [`BackgroundServices::shutdown`] also waits
/// for them to finish.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<DropGuard>,
}

impl BackgroundServices {
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }

    pub fn task_count(&self) -> usize {
        self.background_tasks.len()
    }
}

fn setup_background_services(storage: &Storage, config: &Config, shutdown_token: CancellationToken) -> BackgroundServices {
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    if let Some(handle) = retention::spawn_sweeper(storage.clone(), &config.retention, shutdown_token.clone()) {
        background_tasks.push(handle);
    } else {
        debug!("Retention disabled, stored files are kept indefinitely");
    }

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// Owns the router, shared state and background tasks for one server instance.
///
/// 1. [`Application::new`] creates the storage directories, starts background tasks and builds the router
/// 2. [`Application::serve`] binds and serves until the shutdown future resolves, then stops the
///    background tasks and flushes telemetry
pub struct Application {
    router: Router,
    config: Config,
    bg_services: BackgroundServices,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting qrserve with configuration: {:#?}", config);

        if !config.decode.is_available() {
            info!(
                enabled = config.decode.enabled,
                compiled = cfg!(feature = "decode"),
                "QR decoding is unavailable, /decode will answer 501"
            );
        }

        let storage = Storage::init(&config.storage).await?;
        let bg_services = setup_background_services(&storage, &config, CancellationToken::new());

        let app_state = AppState::builder().config(config.clone()).storage(storage).build();
        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            config,
            bg_services,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router).expect("Failed to create test server");
        (server, self.bg_services)
    }

    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("qrserve listening on http://{}, available at http://localhost:{}", bind_addr, self.config.port);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        self.bg_services.shutdown().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
