//! Notification categories and the per-device preference flag each one is
//! gated by.

use mailguard_core::EventType;
use mailguard_storage::RecipientRow;

pub const MAILBOX_OPENED: &str = "mailbox_opened";
pub const MAIL_DELIVERED: &str = "mail_delivered";
pub const MAIL_REMOVED: &str = "mail_removed";
pub const ITEM_DETECTED: &str = "item_detected";
pub const WEIGHT_CHANGE: &str = "weight_change";
pub const BATTERY_LOW: &str = "battery_low";

/// Notification category for a classified event. Plain door closes are
/// recorded as events but never notified.
pub fn for_event(event_type: EventType) -> Option<&'static str> {
    match event_type {
        EventType::Open => Some(MAILBOX_OPENED),
        EventType::Close => None,
        EventType::Delivery => Some(MAIL_DELIVERED),
        EventType::Removal => Some(MAIL_REMOVED),
        EventType::ItemDetected => Some(ITEM_DETECTED),
        EventType::WeightChange => Some(WEIGHT_CHANGE),
    }
}

/// Whether the device's preference flags enable delivery for this category.
/// Unknown categories default to enabled.
pub fn enabled_for(recipient: &RecipientRow, notification_type: &str) -> bool {
    match notification_type {
        MAILBOX_OPENED => recipient.mailbox_opened_notify,
        MAIL_DELIVERED | ITEM_DETECTED | WEIGHT_CHANGE => recipient.mail_delivered_notify,
        MAIL_REMOVED => recipient.mail_removed_notify,
        BATTERY_LOW => recipient.battery_low_notify,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient() -> RecipientRow {
        RecipientRow {
            email: "owner@example.com".into(),
            name: "Front Door".into(),
            email_notifications: true,
            mail_delivered_notify: true,
            mailbox_opened_notify: false,
            mail_removed_notify: true,
            battery_low_notify: false,
        }
    }

    #[test]
    fn close_events_are_not_notified() {
        assert_eq!(for_event(EventType::Close), None);
        assert_eq!(for_event(EventType::Open), Some(MAILBOX_OPENED));
        assert_eq!(for_event(EventType::Delivery), Some(MAIL_DELIVERED));
        assert_eq!(for_event(EventType::Removal), Some(MAIL_REMOVED));
    }

    #[test]
    fn categories_map_to_their_flags() {
        let r = recipient();
        assert!(!enabled_for(&r, MAILBOX_OPENED));
        assert!(enabled_for(&r, MAIL_DELIVERED));
        assert!(enabled_for(&r, ITEM_DETECTED));
        assert!(enabled_for(&r, WEIGHT_CHANGE));
        assert!(enabled_for(&r, MAIL_REMOVED));
        assert!(!enabled_for(&r, BATTERY_LOW));
    }

    #[test]
    fn unknown_categories_default_to_enabled() {
        assert!(enabled_for(&recipient(), "firmware_update"));
    }
}
