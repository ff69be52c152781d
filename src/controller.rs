use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::bridge::IdentityBridge;
use crate::cache::{DependentCacheBridge, GuardDecision, RouteGuardCache, SessionCache};
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::Error;
use crate::generation::{CommitGate, Generation, GenerationCounter};
use crate::storage::MemoryStorage;
use crate::traits::{IdentityProvider, SessionBackend, SessionStorage};
use crate::types::{Identity, ProviderEvent, ProviderEventKind, ReconciliationResult};

/// Resolved authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No authoritative result yet.
    Initializing,
    Authenticated(Identity),
    Unauthenticated,
}

impl From<ReconciliationResult> for AuthState {
    fn from(result: ReconciliationResult) -> Self {
        match result {
            ReconciliationResult::Authenticated(identity) => Self::Authenticated(identity),
            ReconciliationResult::Unauthenticated => Self::Unauthenticated,
        }
    }
}

/// What the rest of the application observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub state: AuthState,
    /// Cached identity shown while `state` is still `Initializing`.
    pub optimistic: Option<Identity>,
    pub loading: bool,
    /// Generation of the last committed result.
    pub generation: Generation,
}

impl AuthSnapshot {
    fn initial() -> Self {
        Self {
            state: AuthState::Initializing,
            optimistic: None,
            loading: false,
            generation: Generation::default(),
        }
    }

    /// Identity to render: the authoritative one, or the cached hint while
    /// initializing.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            AuthState::Authenticated(identity) => Some(identity),
            AuthState::Initializing => self.optimistic.as_ref(),
            AuthState::Unauthenticated => None,
        }
    }

    /// Backend-confirmed authentication. Cached hints never count.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated(_))
    }
}

struct Shared<B, P> {
    backend: Arc<B>,
    provider: P,
    bridge: IdentityBridge<B>,
    session_cache: SessionCache,
    route_guard: Arc<RouteGuardCache<B>>,
    dependents: Arc<DependentCacheBridge>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    generations: GenerationCounter,
    gate: Mutex<CommitGate>,
    alive: AtomicBool,
    started: AtomicBool,
    subscribed: AtomicBool,
    state_tx: watch::Sender<AuthSnapshot>,
}

/// Owns the resolved identity and keeps the caches coherent with it.
///
/// Resolution chains (startup, [`refetch`](Self::refetch), provider events,
/// [`logout`](Self::logout)) may overlap. Each takes a [`Generation`] when it
/// starts and its result is committed only if no newer generation has
/// committed since. A commit writes the session cache, the route guard and the
/// dependent caches before publishing the new snapshot.
///
/// # Example
///
/// ```rust,ignore
/// let controller = AuthController::builder(HttpBackend::new(config)?, provider)
///     .with_storage(storage)
///     .build();
/// controller.subscribe(provider_events)?;
/// controller.start().await;
///
/// match controller.guard("/materials").await {
///     GuardDecision::Allow(user) => render(user),
///     GuardDecision::Redirect { location } => navigate(&location),
/// }
/// ```
pub struct AuthController<B, P> {
    shared: Arc<Shared<B, P>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

/// Builder for [`AuthController`]. Everything but the backend and provider
/// has a default.
pub struct AuthControllerBuilder<B, P> {
    backend: B,
    provider: P,
    config: SessionConfig,
    storage: Arc<dyn SessionStorage>,
    clock: Arc<dyn Clock>,
    dependents: Arc<DependentCacheBridge>,
}

impl<B: SessionBackend, P: IdentityProvider> AuthControllerBuilder<B, P> {
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_storage(mut self, storage: impl SessionStorage) -> Self {
        self.storage = Arc::new(storage);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Share a dependent-cache bridge the application already registered caches on.
    #[must_use]
    pub fn with_dependents(mut self, dependents: Arc<DependentCacheBridge>) -> Self {
        self.dependents = dependents;
        self
    }

    #[must_use]
    pub fn build(self) -> AuthController<B, P> {
        let backend = Arc::new(self.backend);
        let route_guard = Arc::new(RouteGuardCache::new(
            backend.clone(),
            self.clock.clone(),
            self.config.clone(),
        ));
        let session_cache = SessionCache::new(self.storage, self.clock.clone(), &self.config);
        let (state_tx, _) = watch::channel(AuthSnapshot::initial());

        AuthController {
            shared: Arc::new(Shared {
                bridge: IdentityBridge::new(backend.clone()),
                backend,
                provider: self.provider,
                session_cache,
                route_guard,
                dependents: self.dependents,
                clock: self.clock,
                config: self.config,
                generations: GenerationCounter::default(),
                gate: Mutex::new(CommitGate::default()),
                alive: AtomicBool::new(true),
                started: AtomicBool::new(false),
                subscribed: AtomicBool::new(false),
                state_tx,
            }),
            event_task: Mutex::new(None),
        }
    }
}

impl<B: SessionBackend, P: IdentityProvider> AuthController<B, P> {
    #[must_use]
    pub fn builder(backend: B, provider: P) -> AuthControllerBuilder<B, P> {
        AuthControllerBuilder {
            backend,
            provider,
            config: SessionConfig::default(),
            storage: Arc::new(MemoryStorage::new()),
            clock: Arc::new(SystemClock),
            dependents: Arc::new(DependentCacheBridge::new()),
        }
    }

    /// Run the startup protocol. Only the first call does anything.
    ///
    /// Shows the cached identity (if any) right away, then asks the backend,
    /// falls back to bridging a live provider session, and clears `loading`
    /// once the outcome and all caches are written.
    pub async fn start(&self) {
        let shared = &self.shared;
        if shared.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("Startup already ran");
            return;
        }

        let generation = shared.generations.next();
        let cached = shared.session_cache.read();
        shared.publish_optimistic(cached);
        shared.resolve(generation).await;
        shared.finish_loading();
    }

    /// Re-resolve against the backend, superseding any older in-flight chain.
    pub async fn refetch(&self) {
        let generation = self.shared.generations.next();
        tracing::debug!(generation = %generation, "Refetching identity");
        self.shared.resolve(generation).await;
    }

    /// Consume provider notifications in order, one at a time.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadySubscribed`] on every call after the first.
    pub fn subscribe(&self, mut events: mpsc::UnboundedReceiver<ProviderEvent>) -> Result<(), Error> {
        if self.shared.subscribed.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadySubscribed);
        }

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if !shared.is_alive() {
                    break;
                }
                shared.handle_event(event).await;
            }
            tracing::debug!("Provider event stream ended");
        });
        *self.event_task.lock() = Some(handle);
        Ok(())
    }

    /// Sign out locally, then tell the backend. Returns where to navigate.
    ///
    /// The route guard and session cache are cleared before the first
    /// suspension point, so a guarded navigation racing this call cannot see
    /// the old identity. Backend failure is logged and otherwise ignored.
    pub async fn logout(&self) -> String {
        let shared = &self.shared;
        let generation = shared.generations.next();

        shared.route_guard.invalidate();
        shared.session_cache.clear();
        shared.commit(generation, ReconciliationResult::Unauthenticated);
        shared.finish_loading();

        if let Err(e) = shared.backend.logout().await {
            tracing::warn!(error = %e, "Backend logout failed; local session already cleared");
        }
        tracing::info!("Logged out");
        shared.config.logout_redirect.clone()
    }

    /// Stop all further state mutation. In-flight chains finish their network
    /// calls but their results are dropped.
    pub fn teardown(&self) {
        if self.shared.alive.swap(false, Ordering::SeqCst) {
            tracing::debug!("Auth controller torn down");
        }
        if let Some(handle) = self.event_task.lock().take() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn current_identity(&self) -> Option<Identity> {
        self.shared.state_tx.borrow().identity().cloned()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.shared.state_tx.borrow().loading
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.shared.state_tx.borrow().state.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.shared.state_tx.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthSnapshot> {
        self.shared.state_tx.subscribe()
    }

    /// Guard navigation to `requested_path` through the route-guard cache.
    pub async fn guard(&self, requested_path: &str) -> GuardDecision {
        self.shared.route_guard.guard(requested_path).await
    }

    #[must_use]
    pub fn route_guard(&self) -> Arc<RouteGuardCache<B>> {
        self.shared.route_guard.clone()
    }

    #[must_use]
    pub fn dependents(&self) -> Arc<DependentCacheBridge> {
        self.shared.dependents.clone()
    }

    #[must_use]
    pub fn session_cache(&self) -> &SessionCache {
        &self.shared.session_cache
    }
}

impl<B, P> Drop for AuthController<B, P> {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::SeqCst);
        if let Some(handle) = self.event_task.get_mut().take() {
            handle.abort();
        }
    }
}

// ── Resolution ─────────────────────────────────────────────────────

impl<B: SessionBackend, P: IdentityProvider> Shared<B, P> {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Whether `generation` is still the newest committed one on a live controller.
    fn is_current(&self, generation: Generation) -> bool {
        let gate = self.gate.lock();
        self.is_alive() && gate.committed() == generation
    }

    /// Steps 2 and 3 of startup: backend first, provider bridge as fallback.
    async fn resolve(&self, generation: Generation) {
        match self.backend.current_user().await {
            Ok(identity) => {
                self.commit(generation, ReconciliationResult::Authenticated(identity));
                return;
            }
            Err(e) if e.is_rejection() => {
                tracing::debug!(generation = %generation, "No first-party session");
            }
            // Transport failures and server faults resolve like a missing session.
            Err(e) => {
                tracing::warn!(error = %e, generation = %generation, "Session lookup failed");
            }
        }

        if !self.commit(generation, ReconciliationResult::Unauthenticated) {
            return;
        }

        let now = self.clock.now();
        let Some(session) = self
            .provider
            .current_session()
            .await
            .filter(|session| session.is_live(now))
        else {
            tracing::debug!(generation = %generation, "No live provider session");
            return;
        };

        // The exchange re-establishes the backend session, so a chain overtaken
        // while reading the provider must not run it.
        if !self.is_current(generation) {
            tracing::debug!(generation = %generation, "Skipping bridge for superseded chain");
            return;
        }

        if let Ok(identity) = self.bridge.exchange(&session.access_token).await {
            self.commit(generation, ReconciliationResult::Authenticated(identity));
        }
    }

    async fn handle_event(&self, event: ProviderEvent) {
        if event.kind == ProviderEventKind::SignedOut {
            let generation = self.generations.next();
            tracing::info!(generation = %generation, "Provider signed out");
            self.commit(generation, ReconciliationResult::Unauthenticated);
            return;
        }

        let now = self.clock.now();
        let Some(session) = event.session.filter(|session| session.is_live(now)) else {
            tracing::debug!(kind = ?event.kind, "Provider event without live token ignored");
            return;
        };

        let generation = self.generations.next();
        let result = match self.bridge.exchange(&session.access_token).await {
            Ok(identity) => ReconciliationResult::Authenticated(identity),
            Err(_) => ReconciliationResult::Unauthenticated,
        };
        self.commit(generation, result);
    }

    // ── Commit ─────────────────────────────────────────────────────────

    /// Apply `result` unless torn down or superseded. Returns whether it was applied.
    fn commit(&self, generation: Generation, result: ReconciliationResult) -> bool {
        let mut gate = self.gate.lock();
        if !self.is_alive() {
            tracing::debug!(generation = %generation, "Discarding result after teardown");
            return false;
        }
        if !gate.admit(generation) {
            tracing::debug!(
                generation = %generation,
                committed = %gate.committed(),
                "Discarding superseded result"
            );
            return false;
        }

        let previous = self.state_tx.borrow().state.clone();
        match &result {
            ReconciliationResult::Authenticated(identity) => {
                self.session_cache.write(Some(identity));
                // A guard entry for anyone else must not outlive the switch.
                if previous != AuthState::Authenticated(identity.clone()) {
                    self.route_guard.invalidate();
                }
            }
            ReconciliationResult::Unauthenticated => {
                self.session_cache.clear();
                self.route_guard.invalidate();
            }
        }
        self.dependents.on_identity_change(result.identity());

        let state = AuthState::from(result);
        self.state_tx.send_if_modified(|snapshot| {
            if snapshot.state != state {
                match &state {
                    AuthState::Authenticated(identity) => {
                        tracing::info!(user_id = %identity.id, generation = %generation, "Authenticated");
                    }
                    _ => tracing::info!(generation = %generation, "Unauthenticated"),
                }
            }
            let changed = snapshot.state != state
                || snapshot.optimistic.is_some()
                || snapshot.generation != generation;
            snapshot.state = state;
            snapshot.optimistic = None;
            snapshot.generation = generation;
            changed
        });
        true
    }

    fn publish_optimistic(&self, cached: Option<Identity>) {
        let _gate = self.gate.lock();
        if !self.is_alive() {
            return;
        }
        self.state_tx.send_modify(|snapshot| {
            if snapshot.state == AuthState::Initializing {
                snapshot.loading = cached.is_none();
                snapshot.optimistic = cached;
            }
        });
    }

    fn finish_loading(&self) {
        let _gate = self.gate.lock();
        if !self.is_alive() {
            return;
        }
        self.state_tx.send_if_modified(|snapshot| {
            let was_loading = snapshot.loading;
            snapshot.loading = false;
            was_loading
        });
    }
}
