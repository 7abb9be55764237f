// MailGuard API server
//
// Ingests mailbox sensor events, serves cached dashboard/settings reads, and
// fans notifications out to a consumer task that delivers asynchronously.

mod common;
mod dashboard;
mod devices;
mod error;
mod ingest;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use mailguard_core::ReadCache;
use mailguard_notify::{
    HttpMailer, InProcessTopic, Mailer, MailerConfig, NoopMailer, NotificationConsumer,
    NotificationDispatcher,
};
use mailguard_storage::{Database, StorageConfig};

use crate::common::ListResponse;

const DEFAULT_CACHE_TTL_SECS: u64 = 30;
const DEFAULT_BIND: &str = "0.0.0.0:9000";

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    mailer: String,
    cache_ttl_secs: u64,
}

/// State for health endpoint
#[derive(Clone)]
struct HealthState {
    mailer: String,
    cache_ttl_secs: u64,
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        mailer: state.mailer.clone(),
        cache_ttl_secs: state.cache_ttl_secs,
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        ingest::ingest_event,
        devices::get_settings,
        devices::update_settings,
        devices::heartbeat,
        devices::list_events,
        devices::list_notifications,
        dashboard::get_dashboard,
    ),
    components(
        schemas(
            ingest::IotEventRequest,
            ingest::EventData,
            ingest::IotEventResponse,
            ingest::WeightData,
            devices::UpdateSettingsRequest,
            devices::HeartbeatRequest,
            devices::EventDto,
            devices::NotificationDto,
            ListResponse<devices::EventDto>,
            ListResponse<devices::NotificationDto>,
        )
    ),
    tags(
        (name = "ingestion", description = "Device-facing event ingestion"),
        (name = "devices", description = "Device settings, heartbeat, and last-N reads"),
        (name = "dashboard", description = "Cached per-user dashboard aggregate")
    ),
    info(
        title = "MailGuard API",
        version = "0.2.0",
        description = "Mailbox sensor event ingestion, classification, and notification fan-out",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailguard_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("mailguard-api starting...");

    // Connect and bootstrap the store (bootstrap is skipped when the schema
    // is externally managed)
    let storage_config = StorageConfig::from_env()?;
    let db = Database::connect(&storage_config)
        .await
        .context("Failed to connect to database")?;
    db.bootstrap(&storage_config).await?;
    tracing::info!(
        pool_size = storage_config.max_connections,
        "Connected to database"
    );

    let db = Arc::new(db);
    let cache = Arc::new(ReadCache::new());
    let cache_ttl = cache_ttl_from_env();

    // Wire the fan-out topic: dispatcher publishes, the consumer task
    // delivers. The ingesting request never waits on the consumer.
    let (topic, receiver) = InProcessTopic::channel();
    let dispatcher = Arc::new(NotificationDispatcher::new(
        db.as_ref().clone(),
        Arc::new(topic),
    ));

    let (mailer, mailer_mode): (Box<dyn Mailer>, &str) = match MailerConfig::from_env() {
        Ok(config) => {
            tracing::info!(api_url = %config.api_url, "Mail provider configured");
            (Box::new(HttpMailer::new(config)), "http")
        }
        Err(e) => {
            tracing::warn!(
                "Mail provider not configured ({e}). Deliveries will be logged and dropped."
            );
            (Box::new(NoopMailer), "noop")
        }
    };
    let consumer = NotificationConsumer::new(db.as_ref().clone(), mailer);
    tokio::spawn(consumer.run(receiver));

    // Module states
    let ingest_state = ingest::AppState {
        db: db.clone(),
        cache: cache.clone(),
        dispatcher: dispatcher.clone(),
    };
    let devices_state = devices::AppState {
        db: db.clone(),
        cache: cache.clone(),
        dispatcher: dispatcher.clone(),
        cache_ttl,
    };
    let dashboard_state = dashboard::AppState {
        db: db.clone(),
        cache: cache.clone(),
        cache_ttl,
    };
    let health_state = HealthState {
        mailer: mailer_mode.to_string(),
        cache_ttl_secs: cache_ttl.as_secs(),
    };

    let app = Router::new()
        .route("/health", get(health).with_state(health_state))
        .merge(ingest::routes(ingest_state))
        .merge(devices::routes(devices_state))
        .merge(dashboard::routes(dashboard_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

    // CORS only when the dashboard frontend is served from another origin
    let cors_origins: Vec<HeaderValue> = std::env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .filter(|s| !s.is_empty())
        .map(|s| s.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();

    let app = if cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
        app
    } else {
        tracing::info!(origins = ?cors_origins, "CORS origins configured");
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins))
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN]),
        )
    };

    let app = app.layer(TraceLayer::new_for_http());

    let addr = std::env::var("MAILGUARD_BIND").unwrap_or_else(|_| DEFAULT_BIND.into());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn cache_ttl_from_env() -> Duration {
    let secs = std::env::var("MAILGUARD_CACHE_TTL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_CACHE_TTL_SECS);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_ok() {
        let state = HealthState {
            mailer: "noop".into(),
            cache_ttl_secs: 30,
        };
        let app = Router::new().route("/health", get(health).with_state(state));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["mailer"], "noop");
    }
}
