// Device-facing ingestion endpoint
//
// One pooled connection is leased per request and dropped on every exit
// path. Notification delivery is never awaited here: the dispatcher records
// the row and publishes to the fan-out topic, and the consumer does the rest
// on its own task.

use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use mailguard_core::{
    classify, DeviceBaseline, MailGuardError, ReadCache, SensorReading, WeightSummary,
};
use mailguard_notify::{category, NotificationDispatcher};
use mailguard_storage::{CreateEvent, Database, DeviceRow, DeviceTelemetry};

use crate::error::ApiError;

/// App state for the ingestion route
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub cache: Arc<ReadCache>,
    pub dispatcher: Arc<NotificationDispatcher>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/iot/events", post(ingest_event))
        .with_state(state)
}

/// Raw sensor payload carried inside an ingestion request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EventData {
    /// Reed switch state (true = door open)
    #[serde(default)]
    pub reed_sensor: Option<bool>,
    /// Explicit event tag, if the firmware classified locally
    #[serde(default)]
    pub event_type: Option<String>,
    /// Current weight reading in grams
    #[serde(default)]
    pub weight_value: Option<f64>,
    /// Detection threshold in grams; falls back to the device default
    #[serde(default)]
    pub weight_threshold: Option<f64>,
}

/// Ingestion request from a device (or the transport bridge in front of it)
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IotEventRequest {
    /// Internal device id
    #[serde(default)]
    pub device_id: Option<i64>,
    /// External serial alias, resolved when no id is given
    #[serde(default)]
    pub serial: Option<String>,
    pub event_data: EventData,
    #[serde(default)]
    pub battery_level: Option<i32>,
    #[serde(default)]
    pub signal_strength: Option<i32>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    /// Client-side occurrence timestamp; server time when absent
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Weight summary echoed back when the payload carried a weight reading
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WeightData {
    pub current_weight: f64,
    pub last_weight: Option<f64>,
    pub weight_change: f64,
    pub item_detected: bool,
    pub threshold_used: f64,
}

impl From<WeightSummary> for WeightData {
    fn from(w: WeightSummary) -> Self {
        Self {
            current_weight: w.current_weight,
            last_weight: w.last_weight,
            weight_change: w.weight_change,
            item_detected: w.item_detected,
            threshold_used: w.threshold_used,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IotEventResponse {
    pub event_id: i64,
    pub device_id: i64,
    pub event_type: String,
    pub detection_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_data: Option<WeightData>,
    pub processed_at: DateTime<Utc>,
}

/// POST /v1/iot/events - Ingest a sensor event from a device
#[utoipa::path(
    post,
    path = "/v1/iot/events",
    request_body = IotEventRequest,
    responses(
        (status = 201, description = "Event classified and recorded", body = IotEventResponse),
        (status = 400, description = "Payload asserts neither reed_sensor nor event_type"),
        (status = 404, description = "Device identifier does not resolve"),
        (status = 503, description = "Store unavailable")
    ),
    tag = "ingestion"
)]
pub async fn ingest_event(
    State(state): State<AppState>,
    Json(req): Json<IotEventRequest>,
) -> Result<(StatusCode, Json<IotEventResponse>), ApiError> {
    let mut conn = state.db.acquire().await?;

    let device = resolve_device(&state.db, &mut conn, &req).await?;

    let reading = SensorReading {
        reed_sensor: req.event_data.reed_sensor,
        event_type: req.event_data.event_type.clone(),
        weight_value: req.event_data.weight_value,
        weight_threshold: req.event_data.weight_threshold,
    };
    let baseline = DeviceBaseline {
        last_weight: device.last_weight,
        weight_threshold: device.weight_threshold,
    };
    let classification = classify(&reading, &baseline)?;

    tracing::info!(
        device_id = device.id,
        event_type = %classification.event_type,
        detection_method = classification.detection_method.as_str(),
        "event classified"
    );

    let weight = classification.weight.clone();
    let event = state
        .db
        .create_event(
            &mut conn,
            CreateEvent {
                device_id: device.id,
                event_type: classification.event_type.as_str().to_string(),
                occurred_at: req.timestamp,
                previous_weight: weight.as_ref().and_then(|w| w.last_weight),
                new_weight: weight.as_ref().map(|w| w.current_weight),
                weight_threshold: weight.as_ref().map(|w| w.threshold_used),
                item_detected: weight.as_ref().map(|w| w.item_detected),
            },
        )
        .await?;

    let telemetry = DeviceTelemetry {
        battery_level: req.battery_level,
        signal_strength: req.signal_strength,
        firmware_version: req.firmware_version.clone(),
    };
    state
        .db
        .apply_event_effects(
            &mut conn,
            device.id,
            weight.as_ref().map(|w| w.current_weight),
            &telemetry,
        )
        .await?;

    // The owner's dashboard snapshot now misrepresents counts and recency
    state.cache.invalidate_for_owner(&device.owner_id).await;

    if let Some(notification_type) = category::for_event(classification.event_type) {
        state
            .dispatcher
            .create_and_publish(&mut conn, device.id, notification_type)
            .await?;
    }

    if let Some(level) = req.battery_level {
        if level <= device.battery_threshold {
            state
                .dispatcher
                .create_and_publish(&mut conn, device.id, category::BATTERY_LOW)
                .await?;
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(IotEventResponse {
            event_id: event.id,
            device_id: device.id,
            event_type: classification.event_type.as_str().to_string(),
            detection_method: classification.detection_method.as_str().to_string(),
            weight_data: weight.map(WeightData::from),
            processed_at: Utc::now(),
        }),
    ))
}

async fn resolve_device(
    db: &Database,
    conn: &mut sqlx::PgConnection,
    req: &IotEventRequest,
) -> Result<DeviceRow, ApiError> {
    let device = match (req.device_id, req.serial.as_deref()) {
        (Some(id), _) => db.get_device(conn, id).await?,
        (None, Some(serial)) => db.get_device_by_serial(conn, serial).await?,
        (None, None) => {
            return Err(MailGuardError::validation("device_id or serial required").into())
        }
    };

    device
        .ok_or_else(|| MailGuardError::not_found("device not registered").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_accepts_minimal_device_payload() {
        let req: IotEventRequest = serde_json::from_value(json!({
            "serial": "SN001234567",
            "event_data": { "reed_sensor": true }
        }))
        .unwrap();

        assert_eq!(req.serial.as_deref(), Some("SN001234567"));
        assert_eq!(req.event_data.reed_sensor, Some(true));
        assert!(req.timestamp.is_none());
    }

    #[test]
    fn response_omits_weight_data_when_absent() {
        let response = IotEventResponse {
            event_id: 1,
            device_id: 2,
            event_type: "removal".into(),
            detection_method: "explicit".into(),
            weight_data: None,
            processed_at: Utc::now(),
        };

        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("weight_data").is_none());
        assert_eq!(value["event_type"], "removal");
    }

    #[test]
    fn response_includes_weight_data_when_present() {
        let response = IotEventResponse {
            event_id: 1,
            device_id: 2,
            event_type: "delivery".into(),
            detection_method: "weight_sensor".into(),
            weight_data: Some(WeightData {
                current_weight: 205.0,
                last_weight: Some(25.0),
                weight_change: 180.0,
                item_detected: true,
                threshold_used: 50.0,
            }),
            processed_at: Utc::now(),
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["weight_data"]["weight_change"], 180.0);
        assert_eq!(value["weight_data"]["item_detected"], true);
    }
}
