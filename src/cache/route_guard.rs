use std::sync::Arc;

use parking_lot::Mutex;
use time::{Duration, OffsetDateTime};

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::error::Error;
use crate::traits::SessionBackend;
use crate::types::Identity;

#[derive(Debug, Clone)]
struct RouteGuardEntry {
    user: Identity,
    timestamp: OffsetDateTime,
}

#[derive(Debug, Default)]
struct GuardState {
    entry: Option<RouteGuardEntry>,
    /// Bumped by every `invalidate()`; a check that straddles a bump is not stored.
    epoch: u64,
}

/// Outcome of a guarded navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow(Identity),
    /// Send the user to the login surface; `location` preserves the requested path.
    Redirect { location: String },
}

/// Short-lived identity cache consulted by navigation guards.
///
/// Independent of [`SessionCache`](super::SessionCache): it has its own storage
/// and a shorter TTL because it gates access. Share one instance per
/// application (`Arc<RouteGuardCache<_>>`).
pub struct RouteGuardCache<B> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    config: SessionConfig,
    state: Mutex<GuardState>,
}

impl<B: SessionBackend> RouteGuardCache<B> {
    #[must_use]
    pub fn new(backend: Arc<B>, clock: Arc<dyn Clock>, config: SessionConfig) -> Self {
        Self {
            backend,
            clock,
            ttl: config.guard_ttl,
            config,
            state: Mutex::new(GuardState::default()),
        }
    }

    /// Identity for a guarded route.
    ///
    /// Served from the entry while it is younger than the TTL; otherwise asks
    /// the backend directly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] when no identity can be established,
    /// including when an `invalidate()` happened while the backend call was in
    /// flight.
    pub async fn check(&self) -> Result<Identity, Error> {
        let epoch = {
            let state = self.state.lock();
            if let Some(entry) = &state.entry {
                let age = self.clock.now() - entry.timestamp;
                if age >= Duration::ZERO && age < self.ttl {
                    return Ok(entry.user.clone());
                }
            }
            state.epoch
        };

        let result = self.backend.current_user().await;

        let mut state = self.state.lock();
        if state.epoch != epoch {
            tracing::debug!("Route guard invalidated during check");
            return Err(Error::Unauthenticated);
        }
        match result {
            Ok(user) => {
                state.entry = Some(RouteGuardEntry {
                    user: user.clone(),
                    timestamp: self.clock.now(),
                });
                Ok(user)
            }
            Err(e) => {
                state.entry = None;
                tracing::debug!(error = %e, "Route guard found no session");
                Err(Error::Unauthenticated)
            }
        }
    }

    /// Drop the entry. The next `check()` always reaches the backend.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.entry = None;
        state.epoch = state.epoch.wrapping_add(1);
    }

    /// Guard navigation to `requested_path`.
    pub async fn guard(&self, requested_path: &str) -> GuardDecision {
        match self.check().await {
            Ok(user) => GuardDecision::Allow(user),
            Err(_) => GuardDecision::Redirect {
                location: self.config.login_redirect_for(requested_path),
            },
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
