//! # medscan: prescription scanning backend
//!
//! `medscan` accepts photographs of handwritten or printed prescriptions, recognises the text with
//! an OCR engine, and extracts the medicines they mention (name, dosage, duration) so a patient can
//! review them and keep a list of what they take.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for accounts and saved medicines.
//!
//! The **upload pipeline** ([`pipeline`]) is the core. For each `POST /upload` it writes the image
//! to the upload directory, runs OCR on it, normalizes the recognised text, hands that to the
//! entity extractor (an external script or the built-in rules), and parses the result. The
//! stored image is deleted before the response is sent on every path, including failures and
//! abandoned requests. The pipeline never writes to the database; the client saves reviewed
//! candidates through the medicines API.
//!
//! The **authentication layer** ([`auth`]) issues signed JWT session tokens on login and accepts
//! them as a bearer header or session cookie. The **database layer** ([`db`]) wraps each table in
//! a repository.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use medscan::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = medscan::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     medscan::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! Migrations run automatically on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
//! medscan::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod pipeline;
pub mod telemetry;
mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{config::CorsOrigin, openapi::ApiDoc, pipeline::Pipeline};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{get, patch, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
pub use types::{MedicineId, UserId};

/// Shared state handed to every handler.
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub pipeline: Arc<Pipeline>,
}

/// Get the medscan database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Connect to PostgreSQL with the configured pool settings and run migrations.
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let settings = &config.database.pool;
    info!(max_connections = settings.max_connections, "Connecting to database");

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .max_lifetime(settings.max_lifetime)
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;
    Ok(pool)
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.security.cors;

    // tower-http rejects "*" inside an origin list, so the wildcard gets its own policy
    let allow_origin = if cors_config.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Url serializes a bare origin with a trailing slash, which browsers never send
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::PATCH, http::Method::DELETE])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(cors_config.allow_credentials);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// - Authentication routes under `/authentication`
/// - User and medicine routes under `/api/v1`
/// - `POST /upload`, with a body limit of the configured file size plus multipart overhead
/// - OpenAPI docs at `/docs`
/// - Optional Prometheus metrics at `/internal/metrics`
/// - CORS and request tracing
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let upload_limit = usize::try_from(state.config.uploads.max_file_size)?.saturating_add(api::handlers::upload::MULTIPART_OVERHEAD);

    let auth_routes = Router::new()
        .route("/register", post(api::handlers::auth::register))
        .route("/login", post(api::handlers::auth::login))
        .route("/logout", post(api::handlers::auth::logout));

    let api_routes = Router::new()
        .route("/users/current", get(api::handlers::users::get_current_user))
        .route(
            "/medicines",
            get(api::handlers::medicines::list_medicines).post(api::handlers::medicines::create_medicine),
        )
        .route(
            "/medicines/{id}",
            patch(api::handlers::medicines::update_medicine).delete(api::handlers::medicines::delete_medicine),
        );

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route(
            "/upload",
            post(api::handlers::upload::upload_prescription).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .nest("/authentication", auth_routes)
        .nest("/api/v1", api_routes)
        .with_state(state.clone())
        .route("/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

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

pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Connect to the database, prepare the upload directory and build the router.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = setup_database(&config).await?;
        Self::new_with_pool(config, pool).await
    }

    /// Build the application around an existing pool. Migrations are not run.
    pub async fn new_with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        debug!("Starting medscan with configuration: {:#?}", config);

        let pipeline = Pipeline::from_config(&config)?;
        pipeline::DiskArtifactStore::new(&config.uploads.dir).ensure_root().await?;

        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .pipeline(Arc::new(pipeline))
            .build();

        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("medscan listening on http://{}", bind_addr);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
