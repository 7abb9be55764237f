// Device settings, heartbeat, and last-N read endpoints

use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use mailguard_core::{CacheKey, MailGuardError, ReadCache};
use mailguard_notify::{category, NotificationDispatcher};
use mailguard_storage::{
    Database, DeviceRow, DeviceTelemetry, EventRow, NotificationRow, UpdateDeviceSettings,
};

use crate::common::{cached_response, ListResponse};
use crate::error::ApiError;

const DEFAULT_LIST_LIMIT: i64 = 20;

/// App state for device routes
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub cache: Arc<ReadCache>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub cache_ttl: Duration,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/v1/devices/:device_id/settings",
            get(get_settings).put(update_settings),
        )
        .route("/v1/devices/:device_id/heartbeat", post(heartbeat))
        .route("/v1/devices/:device_id/events", get(list_events))
        .route(
            "/v1/devices/:device_id/notifications",
            get(list_notifications),
        )
        .with_state(state)
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerQuery {
    pub owner_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Request to update device settings. Only provided fields change.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateSettingsRequest {
    pub owner_id: String,
    #[serde(default)]
    pub mail_delivered_notify: Option<bool>,
    #[serde(default)]
    pub mailbox_opened_notify: Option<bool>,
    #[serde(default)]
    pub mail_removed_notify: Option<bool>,
    #[serde(default)]
    pub battery_low_notify: Option<bool>,
    #[serde(default)]
    pub email_notifications: Option<bool>,
    #[serde(default)]
    pub check_interval: Option<i32>,
    #[serde(default)]
    pub battery_threshold: Option<i32>,
    #[serde(default)]
    pub weight_threshold: Option<f64>,
    #[serde(default)]
    pub capture_on_open: Option<bool>,
    #[serde(default)]
    pub capture_on_delivery: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub battery_level: Option<i32>,
    #[serde(default)]
    pub signal_strength: Option<i32>,
    #[serde(default)]
    pub firmware_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventDto {
    pub id: i64,
    pub device_id: i64,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_detected: Option<bool>,
}

impl From<EventRow> for EventDto {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            device_id: row.device_id,
            event_type: row.event_type,
            occurred_at: row.occurred_at,
            previous_weight: row.previous_weight,
            new_weight: row.new_weight,
            item_detected: row.item_detected,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NotificationDto {
    pub id: i64,
    pub device_id: i64,
    pub notification_type: String,
    pub sent_at: DateTime<Utc>,
}

impl From<NotificationRow> for NotificationDto {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            device_id: row.device_id,
            notification_type: row.notification_type,
            sent_at: row.sent_at,
        }
    }
}

/// The cacheable settings snapshot
pub(crate) fn settings_snapshot(device: &DeviceRow) -> Value {
    json!({
        "mail_delivered_notify": device.mail_delivered_notify,
        "mailbox_opened_notify": device.mailbox_opened_notify,
        "mail_removed_notify": device.mail_removed_notify,
        "battery_low_notify": device.battery_low_notify,
        "email_notifications": device.email_notifications,
        "check_interval": device.check_interval,
        "battery_threshold": device.battery_threshold,
        "weight_threshold": device.weight_threshold,
        "capture_on_open": device.capture_on_open,
        "capture_on_delivery": device.capture_on_delivery,
    })
}

/// GET /v1/devices/{device_id}/settings - Cached settings snapshot
#[utoipa::path(
    get,
    path = "/v1/devices/{device_id}/settings",
    params(
        ("device_id" = i64, Path, description = "Device ID"),
        ("owner_id" = String, Query, description = "Owning user identity")
    ),
    responses(
        (status = 200, description = "Settings snapshot (X-Cache header reports hit/miss)"),
        (status = 404, description = "Device not found for this owner")
    ),
    tag = "devices"
)]
pub async fn get_settings(
    State(state): State<AppState>,
    Path(device_id): Path<i64>,
    Query(query): Query<OwnerQuery>,
) -> Result<Response, ApiError> {
    let db = state.db.clone();
    let owner_id = query.owner_id.clone();

    let lookup = state
        .cache
        .get_or_compute(
            CacheKey::DeviceSettings {
                device_id,
                owner_id: query.owner_id.clone(),
            },
            state.cache_ttl,
            || async move {
                let device = db
                    .get_device_settings(device_id, &owner_id)
                    .await?
                    .ok_or_else(|| MailGuardError::not_found(format!("device {device_id}")))?;
                Ok(settings_snapshot(&device))
            },
        )
        .await?;

    Ok(cached_response(lookup))
}

/// PUT /v1/devices/{device_id}/settings - Partial settings update
#[utoipa::path(
    put,
    path = "/v1/devices/{device_id}/settings",
    params(("device_id" = i64, Path, description = "Device ID")),
    request_body = UpdateSettingsRequest,
    responses(
        (status = 200, description = "Updated settings snapshot"),
        (status = 404, description = "Device not found for this owner")
    ),
    tag = "devices"
)]
pub async fn update_settings(
    State(state): State<AppState>,
    Path(device_id): Path<i64>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<Value>, ApiError> {
    let update = UpdateDeviceSettings {
        mail_delivered_notify: req.mail_delivered_notify,
        mailbox_opened_notify: req.mailbox_opened_notify,
        mail_removed_notify: req.mail_removed_notify,
        battery_low_notify: req.battery_low_notify,
        email_notifications: req.email_notifications,
        check_interval: req.check_interval,
        battery_threshold: req.battery_threshold,
        weight_threshold: req.weight_threshold,
        capture_on_open: req.capture_on_open,
        capture_on_delivery: req.capture_on_delivery,
    };

    let device = state
        .db
        .update_device_settings(device_id, &req.owner_id, update)
        .await?
        .ok_or_else(|| MailGuardError::not_found(format!("device {device_id}")))?;

    // Targeted invalidation: this device's settings and the owner's dashboard
    state
        .cache
        .invalidate(&CacheKey::DeviceSettings {
            device_id,
            owner_id: device.owner_id.clone(),
        })
        .await;
    state.cache.invalidate_for_owner(&device.owner_id).await;

    Ok(Json(settings_snapshot(&device)))
}

/// POST /v1/devices/{device_id}/heartbeat - Liveness and telemetry update
#[utoipa::path(
    post,
    path = "/v1/devices/{device_id}/heartbeat",
    params(("device_id" = i64, Path, description = "Device ID")),
    request_body = HeartbeatRequest,
    responses(
        (status = 200, description = "Heartbeat recorded"),
        (status = 404, description = "Device not found")
    ),
    tag = "devices"
)]
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(device_id): Path<i64>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<Value>, ApiError> {
    let telemetry = DeviceTelemetry {
        battery_level: req.battery_level,
        signal_strength: req.signal_strength,
        firmware_version: req.firmware_version,
    };

    let device = state
        .db
        .record_heartbeat(device_id, telemetry)
        .await?
        .ok_or_else(|| MailGuardError::not_found(format!("device {device_id}")))?;

    if let Some(level) = req.battery_level {
        if level <= device.battery_threshold {
            let mut conn = state.db.acquire().await?;
            state
                .dispatcher
                .create_and_publish(&mut conn, device.id, category::BATTERY_LOW)
                .await?;
        }
    }

    Ok(Json(json!({
        "status": "ok",
        "last_seen": device.last_seen,
        "battery_level": device.battery_level,
    })))
}

/// GET /v1/devices/{device_id}/events - Most recent events, newest first
#[utoipa::path(
    get,
    path = "/v1/devices/{device_id}/events",
    params(
        ("device_id" = i64, Path, description = "Device ID"),
        ("limit" = Option<i64>, Query, description = "Max rows, default 20")
    ),
    responses((status = 200, description = "Recent events", body = ListResponse<EventDto>)),
    tag = "devices"
)]
pub async fn list_events(
    State(state): State<AppState>,
    Path(device_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ListResponse<EventDto>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 100);
    let rows = state.db.list_events(device_id, limit).await?;
    Ok(Json(
        rows.into_iter().map(EventDto::from).collect::<Vec<_>>().into(),
    ))
}

/// GET /v1/devices/{device_id}/notifications - Most recent notifications
#[utoipa::path(
    get,
    path = "/v1/devices/{device_id}/notifications",
    params(
        ("device_id" = i64, Path, description = "Device ID"),
        ("limit" = Option<i64>, Query, description = "Max rows, default 20")
    ),
    responses((status = 200, description = "Recent notifications", body = ListResponse<NotificationDto>)),
    tag = "devices"
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Path(device_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ListResponse<NotificationDto>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, 100);
    let rows = state.db.list_notifications(device_id, limit).await?;
    Ok(Json(
        rows.into_iter()
            .map(NotificationDto::from)
            .collect::<Vec<_>>()
            .into(),
    ))
}
