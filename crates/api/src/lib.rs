//! Emotion Recognition API Server
//!
//! REST API serving the emotion ensemble: per-session frame analysis,
//! smoothing control, pattern analysis and Prometheus metrics.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use ensemble::FusionEngine;
use event_sync::EventPublisher;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower::ServiceBuilder;
use tower_governor::GovernorLayer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
mod error;
pub mod rate_limit;
pub mod routes;
mod state;

pub use config::{AppConfig, ServerConfig};
pub use error::ApiError;
pub use rate_limit::{create_governor_config, RateLimitConfig};
pub use state::{mock_engine, AppState, SessionHandle, SessionLimits, SessionStore};

/// State handle passed to every handler
pub type SharedState = Arc<AppState>;

/// Create the application router
///
/// `rate_limit` applies to the frame route only.
pub fn create_router(
    state: SharedState,
    rate_limit: &RateLimitConfig,
    max_body_bytes: usize,
) -> Router {
    let mut frame_routes =
        Router::new().route("/api/v1/sessions/:id/frame", post(routes::sessions::post_frame));
    if let Some(governor) = create_governor_config(rate_limit) {
        frame_routes = frame_routes.layer(GovernorLayer { config: governor });
    } else if rate_limit.enabled {
        warn!("Invalid rate limit settings {:?}, frame route is not limited", rate_limit);
    }

    Router::new()
        .route("/api/v1/health", get(routes::health::get_health))
        .route("/api/v1/ensemble", get(routes::ensemble::get_info))
        .route("/api/v1/sessions/:id/reset", post(routes::sessions::post_reset))
        .route("/api/v1/sessions/:id/analysis", get(routes::sessions::get_analysis))
        .route("/api/v1/sessions/:id", delete(routes::sessions::delete_session))
        .route("/metrics", get(routes::health::get_metrics))
        .merge(frame_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .with_state(state)
}

/// Initialize logging
pub fn init_logging(level: &str, json: bool) -> Result<(), String> {
    let level: Level = level.parse().unwrap_or(Level::INFO);

    let result = if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };

    result.map_err(|e| format!("Failed to set tracing subscriber: {}", e))
}

/// Build the shared state from configuration: engine, detector, metrics, MQTT
pub async fn build_state(config: &AppConfig) -> Result<SharedState, ApiError> {
    let engine = if config.mock_models {
        mock_engine(&config.ensemble)?
    } else {
        FusionEngine::from_spec(&config.ensemble)?
    };
    let detector = config.detector.build()?;

    let mut state = AppState::new(Arc::new(engine), Arc::from(detector))
        .with_timeout(Duration::from_millis(config.server.request_timeout_ms))
        .with_smoothing_default(config.server.smoothing_default)
        .with_session_limits(SessionLimits {
            max_sessions: config.server.max_sessions,
            idle_timeout: Duration::from_secs(config.server.session_idle_secs),
        });

    if config.server.metrics {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| ApiError::Internal(format!("metrics recorder: {}", e)))?;
        state = state.with_metrics(handle);
    }

    if let Some(mqtt) = &config.mqtt {
        let mut publisher = EventPublisher::new(mqtt.clone());
        match publisher.connect().await {
            Ok(()) => state = state.with_publisher(publisher),
            Err(e) => warn!("MQTT publishing disabled: {}", e),
        }
    }

    Ok(Arc::new(state))
}

/// Run the server until ctrl-c
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(&config).await?;
    let app = create_router(state, &config.rate_limit, config.server.max_body_bytes);

    info!("Starting API server on {}", config.server.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
