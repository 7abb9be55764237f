// Per-user dashboard aggregate, cached for the TTL window

use axum::{
    extract::{Path, State},
    response::Response,
    routing::get,
    Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use mailguard_core::{CacheKey, ReadCache};
use mailguard_storage::Database;

use crate::common::cached_response;
use crate::error::ApiError;

const RECENT_EVENT_LIMIT: i64 = 10;

/// App state for the dashboard route
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub cache: Arc<ReadCache>,
    pub cache_ttl: Duration,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/dashboard/:owner_id", get(get_dashboard))
        .with_state(state)
}

/// GET /v1/dashboard/{owner_id} - Cached dashboard aggregate
#[utoipa::path(
    get,
    path = "/v1/dashboard/{owner_id}",
    params(("owner_id" = String, Path, description = "Owning user identity")),
    responses(
        (status = 200, description = "Dashboard aggregate (X-Cache header reports hit/miss)")
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Response, ApiError> {
    let db = state.db.clone();
    let owner = owner_id.clone();

    let lookup = state
        .cache
        .get_or_compute(
            CacheKey::Dashboard { owner_id },
            state.cache_ttl,
            || async move { compute_dashboard(&db, &owner).await },
        )
        .await?;

    Ok(cached_response(lookup))
}

/// Aggregate the owner's devices, counts, and recent events into one
/// snapshot. An owner with no devices gets an empty dashboard, not a 404.
async fn compute_dashboard(
    db: &Database,
    owner_id: &str,
) -> mailguard_core::Result<serde_json::Value> {
    let devices = db.list_devices_for_owner(owner_id).await?;
    let device_ids: Vec<i64> = devices.iter().map(|d| d.id).collect();

    let (event_count, notification_count, recent_events) = if device_ids.is_empty() {
        (0, 0, Vec::new())
    } else {
        (
            db.count_events_for_devices(&device_ids).await?,
            db.count_notifications_for_devices(&device_ids).await?,
            db.recent_events_for_devices(&device_ids, RECENT_EVENT_LIMIT)
                .await?,
        )
    };

    Ok(json!({
        "device_count": devices.len(),
        "devices": devices.iter().map(|d| json!({
            "id": d.id,
            "name": d.name,
            "serial": d.serial,
            "location": d.location,
            "is_active": d.is_active,
            "last_seen": d.last_seen,
            "battery_level": d.battery_level,
            "signal_strength": d.signal_strength,
        })).collect::<Vec<_>>(),
        "event_count": event_count,
        "notification_count": notification_count,
        "recent_events": recent_events.iter().map(|e| json!({
            "id": e.id,
            "device_id": e.device_id,
            "event_type": e.event_type,
            "occurred_at": e.occurred_at,
        })).collect::<Vec<_>>(),
    }))
}
