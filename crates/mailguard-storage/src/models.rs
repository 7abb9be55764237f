// Database models (internal, may differ from public DTOs)

use chrono::{DateTime, Utc};
use sqlx::FromRow;

// ============================================
// Device models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct DeviceRow {
    pub id: i64,
    pub owner_id: String,
    pub serial: String,
    pub email: String,
    pub name: String,
    pub location: Option<String>,
    pub is_active: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_weight: Option<f64>,
    pub mail_delivered_notify: bool,
    pub mailbox_opened_notify: bool,
    pub mail_removed_notify: bool,
    pub battery_low_notify: bool,
    pub email_notifications: bool,
    pub check_interval: i32,
    pub battery_threshold: i32,
    pub weight_threshold: f64,
    pub capture_on_open: bool,
    pub capture_on_delivery: bool,
    pub battery_level: Option<i32>,
    pub signal_strength: Option<i32>,
    pub firmware_version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for the external registration collaborator
#[derive(Debug, Clone)]
pub struct CreateDevice {
    pub owner_id: String,
    pub serial: String,
    pub email: String,
    pub name: String,
    pub location: Option<String>,
}

/// Partial settings update; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateDeviceSettings {
    pub mail_delivered_notify: Option<bool>,
    pub mailbox_opened_notify: Option<bool>,
    pub mail_removed_notify: Option<bool>,
    pub battery_low_notify: Option<bool>,
    pub email_notifications: Option<bool>,
    pub check_interval: Option<i32>,
    pub battery_threshold: Option<i32>,
    pub weight_threshold: Option<f64>,
    pub capture_on_open: Option<bool>,
    pub capture_on_delivery: Option<bool>,
}

/// Telemetry carried by heartbeats and event reports
#[derive(Debug, Clone, Default)]
pub struct DeviceTelemetry {
    pub battery_level: Option<i32>,
    pub signal_strength: Option<i32>,
    pub firmware_version: Option<String>,
}

// ============================================
// Event models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: i64,
    pub device_id: i64,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub previous_weight: Option<f64>,
    pub new_weight: Option<f64>,
    pub weight_threshold: Option<f64>,
    pub item_detected: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct CreateEvent {
    pub device_id: i64,
    pub event_type: String,
    /// Client timestamp when supplied; otherwise the insert defaults to now()
    pub occurred_at: Option<DateTime<Utc>>,
    pub previous_weight: Option<f64>,
    pub new_weight: Option<f64>,
    pub weight_threshold: Option<f64>,
    pub item_detected: Option<bool>,
}

// ============================================
// Notification models
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct NotificationRow {
    pub id: i64,
    pub device_id: i64,
    pub notification_type: String,
    pub sent_at: DateTime<Utc>,
}

/// Recipient contact and preference flags, resolved at delivery time
#[derive(Debug, Clone, FromRow)]
pub struct RecipientRow {
    pub email: String,
    pub name: String,
    pub email_notifications: bool,
    pub mail_delivered_notify: bool,
    pub mailbox_opened_notify: bool,
    pub mail_removed_notify: bool,
    pub battery_low_notify: bool,
}
