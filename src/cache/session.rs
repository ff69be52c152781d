use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::traits::SessionStorage;
use crate::types::Identity;

/// Stored form of the session cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedIdentity {
    pub data: Option<Identity>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Best-effort cache of the last known identity.
///
/// Only a rendering hint: never consult it for access decisions. Every
/// storage failure degrades to "empty".
pub struct SessionCache {
    storage: Arc<dyn SessionStorage>,
    clock: Arc<dyn Clock>,
    key: String,
    ttl: Duration,
}

impl SessionCache {
    #[must_use]
    pub fn new(
        storage: Arc<dyn SessionStorage>,
        clock: Arc<dyn Clock>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            storage,
            clock,
            key: config.cache_key.clone(),
            ttl: config.session_ttl,
        }
    }

    /// Cached identity if present and younger than the TTL.
    pub fn read(&self) -> Option<Identity> {
        let raw = match self.storage.get(&self.key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::debug!(error = %e, "Session cache read failed");
                return None;
            }
        };

        let entry: CachedIdentity = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "Discarding unreadable session cache entry");
                return None;
            }
        };

        let age = self.clock.now() - entry.timestamp;
        // Negative age means the entry claims to come from the future.
        if age < Duration::ZERO || age >= self.ttl {
            return None;
        }
        entry.data
    }

    /// Store `identity` stamped with the current time.
    pub fn write(&self, identity: Option<&Identity>) {
        let entry = CachedIdentity {
            data: identity.cloned(),
            timestamp: self.clock.now(),
        };
        let result = serde_json::to_string(&entry)
            .map_err(|e| crate::Error::Storage(e.to_string()))
            .and_then(|json| self.storage.set(&self.key, json));
        if let Err(e) = result {
            tracing::debug!(error = %e, "Session cache write failed");
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.remove(&self.key) {
            tracing::debug!(error = %e, "Session cache clear failed");
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
