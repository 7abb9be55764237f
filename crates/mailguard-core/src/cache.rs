//! TTL read-cache for expensive aggregate reads.
//!
//! Memoizes per-user dashboard and per-device settings snapshots for a short
//! fixed window so read-heavy frontends do not hit the store on every
//! request. Invalidation is explicit and targeted; expiry is checked lazily
//! at read time, so no background sweep runs. Concurrent misses for the same
//! key may race to recompute; correctness does not depend on single-flight.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::Result;

/// Cache key: (resource kind, owner/device identity)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Per-user dashboard aggregate
    Dashboard { owner_id: String },
    /// Per-device settings snapshot, scoped to the owner so a warm entry
    /// can never leak across identities
    DeviceSettings { device_id: i64, owner_id: String },
}

/// Whether a lookup was served from the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Result of a cached read
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub value: Value,
    pub status: CacheStatus,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// Process-wide read cache with per-entry expiry.
///
/// Shared via `Arc` and passed explicitly to every component that needs it;
/// there is deliberately no ambient singleton.
#[derive(Debug, Default)]
pub struct ReadCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl ReadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live entry for `key`, or invoke `compute`, store the
    /// result with `now + ttl` as expiry, and return it. Compute errors are
    /// propagated and never cached.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<CacheLookup>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&key) {
                if now < entry.expires_at {
                    return Ok(CacheLookup {
                        value: entry.value.clone(),
                        status: CacheStatus::Hit,
                        expires_at: entry.expires_at,
                    });
                }
            }
        }

        // Miss or expired; recompute without holding the lock
        let value = compute().await?;
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());

        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                value: value.clone(),
                expires_at,
            },
        );

        Ok(CacheLookup {
            value,
            status: CacheStatus::Miss,
            expires_at,
        })
    }

    /// Drop the entry for a specific key, if present
    pub async fn invalidate(&self, key: &CacheKey) {
        if self.entries.write().await.remove(key).is_some() {
            tracing::debug!(?key, "cache entry invalidated");
        }
    }

    /// Drop the dashboard snapshot for an owner
    pub async fn invalidate_for_owner(&self, owner_id: &str) {
        self.invalidate(&CacheKey::Dashboard {
            owner_id: owner_id.to_string(),
        })
        .await;
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MailGuardError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(30);

    fn settings_key(device_id: i64) -> CacheKey {
        CacheKey::DeviceSettings {
            device_id,
            owner_id: "user_a".into(),
        }
    }

    #[tokio::test]
    async fn second_read_within_ttl_is_a_hit() {
        let cache = ReadCache::new();
        let computations = Arc::new(AtomicUsize::new(0));

        for expected in [CacheStatus::Miss, CacheStatus::Hit] {
            let computations = computations.clone();
            let lookup = cache
                .get_or_compute(settings_key(1), TTL, || async move {
                    computations.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({"battery_threshold": 20}))
                })
                .await
                .unwrap();
            assert_eq!(lookup.status, expected);
            assert_eq!(lookup.value, json!({"battery_threshold": 20}));
        }

        assert_eq!(computations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_treated_as_absent() {
        let cache = ReadCache::new();

        let first = cache
            .get_or_compute(settings_key(1), Duration::ZERO, || async {
                Ok(json!({"v": 1}))
            })
            .await
            .unwrap();
        assert_eq!(first.status, CacheStatus::Miss);

        // Zero TTL expires immediately; the next read recomputes
        let second = cache
            .get_or_compute(settings_key(1), TTL, || async { Ok(json!({"v": 2})) })
            .await
            .unwrap();
        assert_eq!(second.status, CacheStatus::Miss);
        assert_eq!(second.value, json!({"v": 2}));
    }

    #[tokio::test]
    async fn invalidate_forces_next_read_to_miss() {
        let cache = ReadCache::new();
        let key = settings_key(7);

        cache
            .get_or_compute(key.clone(), TTL, || async { Ok(json!({"threshold": 20})) })
            .await
            .unwrap();

        cache.invalidate(&key).await;

        let lookup = cache
            .get_or_compute(key, TTL, || async { Ok(json!({"threshold": 35})) })
            .await
            .unwrap();
        assert_eq!(lookup.status, CacheStatus::Miss);
        assert_eq!(lookup.value, json!({"threshold": 35}));
    }

    #[tokio::test]
    async fn invalidation_is_targeted_not_a_flush() {
        let cache = ReadCache::new();

        cache
            .get_or_compute(settings_key(1), TTL, || async { Ok(json!(1)) })
            .await
            .unwrap();
        cache
            .get_or_compute(settings_key(2), TTL, || async { Ok(json!(2)) })
            .await
            .unwrap();
        cache
            .get_or_compute(
                CacheKey::Dashboard {
                    owner_id: "user_a".into(),
                },
                TTL,
                || async { Ok(json!({"devices": []})) },
            )
            .await
            .unwrap();

        cache.invalidate(&settings_key(1)).await;
        cache.invalidate_for_owner("user_a").await;

        assert_eq!(cache.len().await, 1);
        let untouched = cache
            .get_or_compute(settings_key(2), TTL, || async { Ok(json!(99)) })
            .await
            .unwrap();
        assert_eq!(untouched.status, CacheStatus::Hit);
        assert_eq!(untouched.value, json!(2));
    }

    #[tokio::test]
    async fn invalidate_for_owner_ignores_other_owners() {
        let cache = ReadCache::new();
        let key = CacheKey::Dashboard {
            owner_id: "user_b".into(),
        };
        cache
            .get_or_compute(key.clone(), TTL, || async { Ok(json!({"devices": 3})) })
            .await
            .unwrap();

        cache.invalidate_for_owner("user_a").await;

        let lookup = cache
            .get_or_compute(key, TTL, || async { Ok(json!(null)) })
            .await
            .unwrap();
        assert_eq!(lookup.status, CacheStatus::Hit);
    }

    #[tokio::test]
    async fn settings_entries_do_not_leak_across_owners() {
        let cache = ReadCache::new();

        // The real owner warms the entry for device 5
        cache
            .get_or_compute(
                CacheKey::DeviceSettings {
                    device_id: 5,
                    owner_id: "alice".into(),
                },
                TTL,
                || async { Ok(json!({"battery_threshold": 20})) },
            )
            .await
            .unwrap();

        // A different owner asking about the same device misses, so the
        // ownership check in the compute path still runs
        let err = cache
            .get_or_compute(
                CacheKey::DeviceSettings {
                    device_id: 5,
                    owner_id: "mallory".into(),
                },
                TTL,
                || async { Err(MailGuardError::not_found("device 5")) },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MailGuardError::NotFound(_)));
    }

    #[tokio::test]
    async fn compute_errors_are_not_cached() {
        let cache = ReadCache::new();
        let key = settings_key(404);

        let err = cache
            .get_or_compute(key.clone(), TTL, || async {
                Err(MailGuardError::not_found("device 404"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MailGuardError::NotFound(_)));
        assert_eq!(cache.len().await, 0);

        let lookup = cache
            .get_or_compute(key, TTL, || async { Ok(json!({"ok": true})) })
            .await
            .unwrap();
        assert_eq!(lookup.status, CacheStatus::Miss);
    }
}
