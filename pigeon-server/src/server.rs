use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router, middleware, serve};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use shared::config::{Config, LogFormat};
use shared::config::server::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, fmt};

use crate::app_state::AppState;
use crate::handlers;
use crate::middleware::auth::auth_middleware;
use crate::middleware::request_context::{self, RequestIdState};
use crate::openapi::openapi_routes;
use crate::routes;
use crate::services::media::PassthroughMediaStorage;
use crate::services::pg_message_store::PgMessageStore;
use crate::services::presence::PresenceRegistry;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn metrics_handle() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn metrics_endpoint(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        handle.render(),
    )
}

/// Initializes the tracing subscriber from the logging configuration and
/// returns the effective level.
pub fn initialize_tracing(config: &Config) -> String {
    let env_filter = build_env_filter(config);

    let fmt_builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    if matches!(config.logging.format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).init();
    } else {
        fmt_builder.with_ansi(true).init();
    }

    config.logging.level.clone()
}

fn build_env_filter(config: &Config) -> EnvFilter {
    let default_level = config
        .logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}

/// Creates a database connection pool from the database configuration.
///
/// # Errors
/// Returns an error if the connection pool cannot be created.
pub async fn create_database_pool(db: &DatabaseConfig) -> Result<sqlx::PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(db.max_connections)
        .connect(&db.url)
        .await?;
    metrics::gauge!("pigeon_db_pool_max_connections").set(f64::from(db.max_connections));
    Ok(pool)
}

pub fn create_cors_layer(config: &Config) -> CorsLayer {
    use axum::http::Method;

    let methods = vec![Method::GET, Method::POST, Method::OPTIONS];

    let mut cors = CorsLayer::new()
        .allow_methods(AllowMethods::list(methods))
        .allow_headers(AllowHeaders::any())
        .max_age(Duration::from_secs(config.server.cors.max_age_seconds));

    if config.server.cors.allowed_origins.is_empty() {
        cors = cors.allow_origin(AllowOrigin::any());
    } else {
        let origins = config
            .server
            .cors
            .allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect::<Vec<_>>();
        cors = cors
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(config.server.cors.allow_credentials);
    }

    cors
}

/// Assembles the full application router: authenticated API routes, the
/// push stream, health probes, metrics, and OpenAPI documents.
pub fn create_app_router(
    state: Arc<AppState>,
    config: Arc<Config>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let api_router = handlers::messages::routes()
        .route("/api/stream", get(handlers::stream::stream_events))
        .route_layer(middleware::from_fn(auth_middleware));

    let cors = create_cors_layer(&config);
    let request_id_state = RequestIdState::from_config(&config);

    Router::new()
        .merge(api_router)
        .merge(routes::health::create_health_router())
        .route("/metrics", get(metrics_endpoint))
        .merge(openapi_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn_with_state(
            request_id_state,
            request_context::assign_request_id,
        ))
        .layer(Extension(state))
        .layer(Extension(config))
        .layer(Extension(metrics_handle))
}

/// Resolves when a shutdown signal is received.
pub async fn create_shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutting down...");
}

/// Starts the server: connects the database, ensures the schema, and binds
/// the listener.
///
/// # Errors
/// Returns an error if startup fails. Once serving, the process never dies
/// from a message-path error; the worst outcome is a stale view that heals
/// on the next fetch or reconnect.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    initialize_tracing(&config);
    info!("Starting server...");

    let metrics_handle = metrics_handle();
    let config = Arc::new(config);

    let pool = create_database_pool(&config.db).await?;
    PgMessageStore::ensure_schema(&pool).await?;

    let state = Arc::new(AppState::new(
        Arc::new(PgMessageStore::new(pool)),
        Arc::new(PresenceRegistry::new(config.stream.channel_capacity)),
        Arc::new(PassthroughMediaStorage),
    ));

    let app = create_app_router(state, config.clone(), metrics_handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    serve(listener, app)
        .with_graceful_shutdown(create_shutdown_signal())
        .await?;

    Ok(())
}
