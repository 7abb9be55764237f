//! Domain types for mailbox events.
//!
//! `EventType` is the closed set of canonical event types stored in
//! `mailbox_events`. Devices in the field report a handful of legacy
//! aliases (`opened`, `mail_delivered`, ...) which are normalized here.

use serde::{Deserialize, Serialize};

/// Canonical mailbox event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Open,
    Close,
    Delivery,
    Removal,
    ItemDetected,
    WeightChange,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Open => "open",
            EventType::Close => "close",
            EventType::Delivery => "delivery",
            EventType::Removal => "removal",
            EventType::ItemDetected => "item_detected",
            EventType::WeightChange => "weight_change",
        }
    }

    /// Parse an explicit event tag, accepting the aliases legacy firmware
    /// still sends. Returns `None` for tags outside the closed set.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        match tag.to_lowercase().as_str() {
            "open" | "opened" => Some(EventType::Open),
            "close" | "closed" => Some(EventType::Close),
            "delivery" | "mail_delivered" => Some(EventType::Delivery),
            "removal" | "mail_removed" => Some(EventType::Removal),
            "item_detected" => Some(EventType::ItemDetected),
            "weight_change" => Some(EventType::WeightChange),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the classifier decided the event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// The payload carried an explicit recognized tag
    Explicit,
    /// Derived from the reed-switch boolean alone
    ReedSensor,
    /// Reed state disambiguated by the weight delta
    WeightSensor,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Explicit => "explicit",
            DetectionMethod::ReedSensor => "reed_sensor",
            DetectionMethod::WeightSensor => "weight_sensor",
        }
    }
}

/// Raw sensor payload as reported by a device
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorReading {
    /// Reed switch state (true = door open)
    pub reed_sensor: Option<bool>,
    /// Explicit event tag, if the firmware classified locally
    pub event_type: Option<String>,
    /// Current weight reading in grams
    pub weight_value: Option<f64>,
    /// Per-report detection threshold in grams; falls back to the device default
    pub weight_threshold: Option<f64>,
}

/// Device-side context the classifier compares a reading against
#[derive(Debug, Clone)]
pub struct DeviceBaseline {
    /// Last known weight reading, if the device has reported one
    pub last_weight: Option<f64>,
    /// Device-default detection threshold in grams
    pub weight_threshold: f64,
}

/// Weight-delta summary attached to a classification when weight data exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSummary {
    pub current_weight: f64,
    pub last_weight: Option<f64>,
    pub weight_change: f64,
    pub item_detected: bool,
    pub threshold_used: f64,
}

/// Classifier output
#[derive(Debug, Clone)]
pub struct Classification {
    pub event_type: EventType,
    pub detection_method: DetectionMethod,
    pub weight: Option<WeightSummary>,
}
