//! Event classifier.
//!
//! Turns a raw device payload into one canonical event type plus, when a
//! weight reading is present, a weight-delta summary. Payloads from
//! low-bandwidth devices are partial and ambiguous: some carry an explicit
//! tag, most carry only the reed-switch state, and a few add a weight
//! reading that lets open/delivery (and close/removal) be told apart.

use crate::error::{MailGuardError, Result};
use crate::event::{
    Classification, DetectionMethod, DeviceBaseline, EventType, SensorReading, WeightSummary,
};

/// Classify a sensor reading against the device's last known state.
///
/// Rules, in order:
/// 1. An explicit tag from the closed set is honored directly.
/// 2. Otherwise the reed switch decides the family: true is open/delivery,
///    false is close/removal, with the weight delta disambiguating when
///    one was supplied.
/// 3. A weight summary is computed whenever a weight reading is present,
///    independent of how the type was decided.
/// 4. A payload asserting neither a tag nor a reed state is rejected.
pub fn classify(reading: &SensorReading, baseline: &DeviceBaseline) -> Result<Classification> {
    let weight = reading.weight_value.map(|current| {
        let last = baseline.last_weight;
        // Missing baseline treats the delta as the full reading
        let change = current - last.unwrap_or(0.0);
        let threshold = reading.weight_threshold.unwrap_or(baseline.weight_threshold);
        WeightSummary {
            current_weight: current,
            last_weight: last,
            weight_change: change,
            // Inclusive boundary: a delta of exactly the threshold counts
            item_detected: change.abs() >= threshold,
            threshold_used: threshold,
        }
    });

    if let Some(tag) = reading.event_type.as_deref() {
        if let Some(event_type) = EventType::parse_tag(tag) {
            return Ok(Classification {
                event_type,
                detection_method: DetectionMethod::Explicit,
                weight,
            });
        }
        // Unrecognized tag: fall through to the reed switch
    }

    let Some(reed_open) = reading.reed_sensor else {
        return Err(MailGuardError::validation(
            "event_data must carry reed_sensor or event_type",
        ));
    };

    let detected_change = weight
        .as_ref()
        .filter(|w| w.item_detected)
        .map(|w| w.weight_change);

    let (event_type, detection_method) = match (reed_open, detected_change) {
        (true, Some(change)) if change > 0.0 => (EventType::Delivery, DetectionMethod::WeightSensor),
        (false, Some(change)) if change < 0.0 => (EventType::Removal, DetectionMethod::WeightSensor),
        (true, _) => (EventType::Open, DetectionMethod::ReedSensor),
        (false, _) => (EventType::Close, DetectionMethod::ReedSensor),
    };

    Ok(Classification {
        event_type,
        detection_method,
        weight,
    })
}
