//! Target schema: idempotent create-if-absent statements, applied in
//! dependency order so foreign keys resolve.

pub(crate) const DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS devices (
        id BIGSERIAL PRIMARY KEY,
        owner_id TEXT NOT NULL,
        serial TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL,
        name TEXT NOT NULL,
        location TEXT,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        last_seen TIMESTAMPTZ,
        last_weight DOUBLE PRECISION,
        mail_delivered_notify BOOLEAN NOT NULL DEFAULT TRUE,
        mailbox_opened_notify BOOLEAN NOT NULL DEFAULT TRUE,
        mail_removed_notify BOOLEAN NOT NULL DEFAULT TRUE,
        battery_low_notify BOOLEAN NOT NULL DEFAULT TRUE,
        email_notifications BOOLEAN NOT NULL DEFAULT TRUE,
        check_interval INT NOT NULL DEFAULT 15,
        battery_threshold INT NOT NULL DEFAULT 20,
        weight_threshold DOUBLE PRECISION NOT NULL DEFAULT 50,
        capture_on_open BOOLEAN NOT NULL DEFAULT TRUE,
        capture_on_delivery BOOLEAN NOT NULL DEFAULT TRUE,
        battery_level INT,
        signal_strength INT,
        firmware_version TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_devices_owner_id ON devices(owner_id)",
    r#"
    CREATE TABLE IF NOT EXISTS mailbox_events (
        id BIGSERIAL PRIMARY KEY,
        device_id BIGINT NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
        event_type TEXT NOT NULL,
        occurred_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        previous_weight DOUBLE PRECISION,
        new_weight DOUBLE PRECISION,
        weight_threshold DOUBLE PRECISION,
        item_detected BOOLEAN
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_events_device_id ON mailbox_events(device_id)",
    "CREATE INDEX IF NOT EXISTS idx_events_event_type ON mailbox_events(event_type)",
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id BIGSERIAL PRIMARY KEY,
        device_id BIGINT NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
        notification_type TEXT NOT NULL,
        sent_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_notifs_device_id ON notifications(device_id)",
    "CREATE INDEX IF NOT EXISTS idx_notifs_type ON notifications(notification_type)",
];
