// Repository layer for database operations
//
// The pool is a fixed-size resource set: acquisition fails with
// DatabaseUnavailable when exhausted instead of growing. The ingestion path
// leases exactly one connection per request via `acquire` and passes it to
// the `&mut PgConnection` methods below; leases release on drop on every
// exit path. Simple reads go through the pool directly.

use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres};

use mailguard_core::{MailGuardError, Result};

use crate::config::StorageConfig;
use crate::models::*;
use crate::schema;

const BOOTSTRAP_ATTEMPTS: u32 = 5;
const BOOTSTRAP_RETRY_DELAY: Duration = Duration::from_secs(2);

const DEVICE_COLUMNS: &str = "id, owner_id, serial, email, name, location, is_active, last_seen, \
     last_weight, mail_delivered_notify, mailbox_opened_notify, mail_removed_notify, \
     battery_low_notify, email_notifications, check_interval, battery_threshold, \
     weight_threshold, capture_on_open, capture_on_delivery, battery_level, signal_strength, \
     firmware_version, created_at, updated_at";

const EVENT_COLUMNS: &str = "id, device_id, event_type, occurred_at, previous_weight, \
     new_weight, weight_threshold, item_detected";

/// Bounded iterative retry around the schema-apply step. Exhaustion is
/// terminal for the process and surfaces as DatabaseUnavailable.
async fn retry_bootstrap<F, Fut>(attempts: u32, delay: Duration, mut apply: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = sqlx::Result<()>>,
{
    let mut last_err = String::new();
    for attempt in 1..=attempts {
        match apply().await {
            Ok(()) => {
                tracing::info!(attempt, "schema bootstrap complete");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "schema bootstrap attempt failed");
                last_err = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(MailGuardError::unavailable(format!(
        "schema bootstrap failed after {attempts} attempts: {last_err}"
    )))
}

/// Map sqlx failures onto the pipeline taxonomy. Pool exhaustion and
/// transport failures surface as DatabaseUnavailable; everything else is
/// internal.
fn store_err(e: sqlx::Error) -> MailGuardError {
    match &e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            MailGuardError::unavailable(e.to_string())
        }
        _ => MailGuardError::Internal(anyhow::Error::new(e)),
    }
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build the fixed-size pool from configuration
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(store_err)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Lease one connection; released on drop
    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>> {
        self.pool.acquire().await.map_err(store_err)
    }

    // ============================================
    // Schema bootstrap
    // ============================================

    /// Ensure the target schema exists, retrying a fixed number of times
    /// with a fixed delay before giving up. Called once per process; skipped
    /// entirely when the schema is externally managed.
    pub async fn bootstrap(&self, config: &StorageConfig) -> Result<()> {
        if !config.init_schema {
            tracing::info!("schema externally managed, skipping bootstrap");
            return Ok(());
        }

        retry_bootstrap(BOOTSTRAP_ATTEMPTS, BOOTSTRAP_RETRY_DELAY, || {
            self.apply_schema()
        })
        .await
    }

    async fn apply_schema(&self) -> sqlx::Result<()> {
        let mut conn = self.pool.acquire().await?;
        for stmt in schema::DDL {
            sqlx::query(stmt).execute(&mut *conn).await?;
        }
        Ok(())
    }

    // ============================================
    // Devices
    // ============================================

    /// Seam for the external registration collaborator; the ingestion
    /// pipeline itself never creates devices.
    pub async fn create_device(&self, input: CreateDevice) -> Result<DeviceRow> {
        let row = sqlx::query_as::<_, DeviceRow>(&format!(
            r#"
            INSERT INTO devices (owner_id, serial, email, name, location)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {DEVICE_COLUMNS}
            "#
        ))
        .bind(&input.owner_id)
        .bind(&input.serial)
        .bind(&input.email)
        .bind(&input.name)
        .bind(&input.location)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row)
    }

    pub async fn get_device(
        &self,
        conn: &mut PgConnection,
        id: i64,
    ) -> Result<Option<DeviceRow>> {
        let row = sqlx::query_as::<_, DeviceRow>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(store_err)?;

        Ok(row)
    }

    /// Serial numbers are an external lookup alias for the internal id
    pub async fn get_device_by_serial(
        &self,
        conn: &mut PgConnection,
        serial: &str,
    ) -> Result<Option<DeviceRow>> {
        let row = sqlx::query_as::<_, DeviceRow>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE serial = $1"
        ))
        .bind(serial)
        .fetch_optional(conn)
        .await
        .map_err(store_err)?;

        Ok(row)
    }

    pub async fn get_device_settings(
        &self,
        device_id: i64,
        owner_id: &str,
    ) -> Result<Option<DeviceRow>> {
        let row = sqlx::query_as::<_, DeviceRow>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE id = $1 AND owner_id = $2"
        ))
        .bind(device_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row)
    }

    pub async fn update_device_settings(
        &self,
        device_id: i64,
        owner_id: &str,
        input: UpdateDeviceSettings,
    ) -> Result<Option<DeviceRow>> {
        let row = sqlx::query_as::<_, DeviceRow>(&format!(
            r#"
            UPDATE devices
            SET
                mail_delivered_notify = COALESCE($3, mail_delivered_notify),
                mailbox_opened_notify = COALESCE($4, mailbox_opened_notify),
                mail_removed_notify = COALESCE($5, mail_removed_notify),
                battery_low_notify = COALESCE($6, battery_low_notify),
                email_notifications = COALESCE($7, email_notifications),
                check_interval = COALESCE($8, check_interval),
                battery_threshold = COALESCE($9, battery_threshold),
                weight_threshold = COALESCE($10, weight_threshold),
                capture_on_open = COALESCE($11, capture_on_open),
                capture_on_delivery = COALESCE($12, capture_on_delivery),
                updated_at = now()
            WHERE id = $1 AND owner_id = $2
            RETURNING {DEVICE_COLUMNS}
            "#
        ))
        .bind(device_id)
        .bind(owner_id)
        .bind(input.mail_delivered_notify)
        .bind(input.mailbox_opened_notify)
        .bind(input.mail_removed_notify)
        .bind(input.battery_low_notify)
        .bind(input.email_notifications)
        .bind(input.check_interval)
        .bind(input.battery_threshold)
        .bind(input.weight_threshold)
        .bind(input.capture_on_open)
        .bind(input.capture_on_delivery)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row)
    }

    pub async fn record_heartbeat(
        &self,
        device_id: i64,
        telemetry: DeviceTelemetry,
    ) -> Result<Option<DeviceRow>> {
        let row = sqlx::query_as::<_, DeviceRow>(&format!(
            r#"
            UPDATE devices
            SET
                last_seen = now(),
                is_active = TRUE,
                battery_level = COALESCE($2, battery_level),
                signal_strength = COALESCE($3, signal_strength),
                firmware_version = COALESCE($4, firmware_version),
                updated_at = now()
            WHERE id = $1
            RETURNING {DEVICE_COLUMNS}
            "#
        ))
        .bind(device_id)
        .bind(telemetry.battery_level)
        .bind(telemetry.signal_strength)
        .bind(&telemetry.firmware_version)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row)
    }

    /// Post-ingestion device update: last seen, last known weight, telemetry
    pub async fn apply_event_effects(
        &self,
        conn: &mut PgConnection,
        device_id: i64,
        new_weight: Option<f64>,
        telemetry: &DeviceTelemetry,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE devices
            SET
                last_seen = now(),
                is_active = TRUE,
                last_weight = COALESCE($2, last_weight),
                battery_level = COALESCE($3, battery_level),
                signal_strength = COALESCE($4, signal_strength),
                firmware_version = COALESCE($5, firmware_version),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(device_id)
        .bind(new_weight)
        .bind(telemetry.battery_level)
        .bind(telemetry.signal_strength)
        .bind(&telemetry.firmware_version)
        .execute(conn)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    pub async fn list_devices_for_owner(&self, owner_id: &str) -> Result<Vec<DeviceRow>> {
        let rows = sqlx::query_as::<_, DeviceRow>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE owner_id = $1 ORDER BY created_at"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows)
    }

    // ============================================
    // Events (immutable after creation)
    // ============================================

    pub async fn create_event(
        &self,
        conn: &mut PgConnection,
        input: CreateEvent,
    ) -> Result<EventRow> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            INSERT INTO mailbox_events
                (device_id, event_type, occurred_at, previous_weight, new_weight,
                 weight_threshold, item_detected)
            VALUES ($1, $2, COALESCE($3, now()), $4, $5, $6, $7)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(input.device_id)
        .bind(&input.event_type)
        .bind(input.occurred_at)
        .bind(input.previous_weight)
        .bind(input.new_weight)
        .bind(input.weight_threshold)
        .bind(input.item_detected)
        .fetch_one(conn)
        .await
        .map_err(store_err)?;

        Ok(row)
    }

    pub async fn list_events(&self, device_id: i64, limit: i64) -> Result<Vec<EventRow>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM mailbox_events
            WHERE device_id = $1
            ORDER BY occurred_at DESC
            LIMIT $2
            "#
        ))
        .bind(device_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows)
    }

    pub async fn recent_events_for_devices(
        &self,
        device_ids: &[i64],
        limit: i64,
    ) -> Result<Vec<EventRow>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM mailbox_events
            WHERE device_id = ANY($1)
            ORDER BY occurred_at DESC
            LIMIT $2
            "#
        ))
        .bind(device_ids)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows)
    }

    pub async fn count_events_for_devices(&self, device_ids: &[i64]) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM mailbox_events WHERE device_id = ANY($1)")
                .bind(device_ids)
                .fetch_one(&self.pool)
                .await
                .map_err(store_err)?;

        Ok(count)
    }

    // ============================================
    // Notifications
    // ============================================

    pub async fn create_notification(
        &self,
        conn: &mut PgConnection,
        device_id: i64,
        notification_type: &str,
    ) -> Result<NotificationRow> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            INSERT INTO notifications (device_id, notification_type)
            VALUES ($1, $2)
            RETURNING id, device_id, notification_type, sent_at
            "#,
        )
        .bind(device_id)
        .bind(notification_type)
        .fetch_one(conn)
        .await
        .map_err(store_err)?;

        Ok(row)
    }

    pub async fn list_notifications(
        &self,
        device_id: i64,
        limit: i64,
    ) -> Result<Vec<NotificationRow>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, device_id, notification_type, sent_at
            FROM notifications
            WHERE device_id = $1
            ORDER BY sent_at DESC
            LIMIT $2
            "#,
        )
        .bind(device_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows)
    }

    pub async fn count_notifications_for_devices(&self, device_ids: &[i64]) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE device_id = ANY($1)")
                .bind(device_ids)
                .fetch_one(&self.pool)
                .await
                .map_err(store_err)?;

        Ok(count)
    }

    /// Recipient contact and preference flags for the async consumer.
    /// Resolved at delivery time, so contact or preference changes made
    /// after publish still take effect for undelivered messages.
    pub async fn notification_recipient(&self, device_id: i64) -> Result<Option<RecipientRow>> {
        let row = sqlx::query_as::<_, RecipientRow>(
            r#"
            SELECT email, name, email_notifications, mail_delivered_notify,
                   mailbox_opened_notify, mail_removed_notify, battery_low_notify
            FROM devices
            WHERE id = $1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row)
    }
}
