//! Scripted collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex as StdMutex, OnceLock};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::cache::IdentityScoped;
use crate::error::Error;
use crate::traits::{IdentityProvider, SessionBackend, SessionStorage};
use crate::types::{AccessToken, Identity, ProviderSession};

/// Route `tracing` output through the test harness (honors `RUST_LOG`).
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone)]
enum MeResponse {
    User(Identity),
    NoSession,
    Unreachable,
}

/// Backend whose `/auth/me` answer, accepted tokens and timing are set by the test.
///
/// `current_user` reads its answer after any gate opens, so a test can change
/// the backend state while a call is in flight.
pub(crate) struct ScriptedBackend {
    me: Mutex<MeResponse>,
    me_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    tokens: Mutex<HashMap<String, Identity>>,
    logout_fails: AtomicBool,
    me_calls: AtomicUsize,
    exchange_calls: AtomicUsize,
    logout_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Self {
        Self {
            me: Mutex::new(MeResponse::NoSession),
            me_gates: Mutex::new(VecDeque::new()),
            tokens: Mutex::new(HashMap::new()),
            logout_fails: AtomicBool::new(false),
            me_calls: AtomicUsize::new(0),
            exchange_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_user(&self, identity: Identity) {
        *self.me.lock() = MeResponse::User(identity);
    }

    pub(crate) fn set_no_session(&self) {
        *self.me.lock() = MeResponse::NoSession;
    }

    pub(crate) fn set_unreachable(&self) {
        *self.me.lock() = MeResponse::Unreachable;
    }

    pub(crate) fn accept_token(&self, token: &str, identity: Identity) {
        self.tokens.lock().insert(token.to_owned(), identity);
    }

    pub(crate) fn fail_logout(&self) {
        self.logout_fails.store(true, Ordering::SeqCst);
    }

    /// Hold the next `current_user` call until the returned sender fires.
    pub(crate) fn gate_me(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.me_gates.lock().push_back(rx);
        tx
    }

    pub(crate) async fn wait_for_me_calls(&self, n: usize) {
        while self.me_calls() < n {
            tokio::task::yield_now().await;
        }
    }

    pub(crate) fn me_calls(&self) -> usize {
        self.me_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }
}

impl SessionBackend for ScriptedBackend {
    async fn current_user(&self) -> Result<Identity, Error> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.me_gates.lock().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let response = self.me.lock().clone();
        match response {
            MeResponse::User(identity) => Ok(identity),
            MeResponse::NoSession => Err(Error::NoSession),
            MeResponse::Unreachable => Err(Error::Backend {
                operation: "session lookup",
                status: Some(503),
                detail: "service unavailable".into(),
            }),
        }
    }

    async fn exchange_token(&self, token: &AccessToken) -> Result<Identity, Error> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        let identity = self.tokens.lock().get(token.as_str()).cloned();
        match identity {
            Some(identity) => {
                // The exchange also establishes the first-party session.
                self.set_user(identity.clone());
                Ok(identity)
            }
            None => Err(Error::Backend {
                operation: "token exchange",
                status: Some(401),
                detail: "invalid token".into(),
            }),
        }
    }

    async fn logout(&self) -> Result<(), Error> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if self.logout_fails.load(Ordering::SeqCst) {
            return Err(Error::Backend {
                operation: "logout",
                status: Some(500),
                detail: String::new(),
            });
        }
        self.set_no_session();
        Ok(())
    }
}

/// Provider whose current session is set by the test; reads can be held open.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    session: Mutex<Option<ProviderSession>>,
    session_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    session_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn set_session(&self, session: Option<ProviderSession>) {
        *self.session.lock() = session;
    }

    /// Hold the next `current_session` call until the returned sender fires.
    pub(crate) fn gate_session(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.session_gates.lock().push_back(rx);
        tx
    }

    pub(crate) async fn wait_for_session_calls(&self, n: usize) {
        while self.session_calls.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }
}

impl IdentityProvider for ScriptedProvider {
    async fn current_session(&self) -> Option<ProviderSession> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.session_gates.lock().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.session.lock().clone()
    }
}

/// Storage that fails every operation.
pub(crate) struct FailingStorage;

impl SessionStorage for FailingStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, Error> {
        Err(Error::Storage("quota exceeded".into()))
    }

    fn set(&self, _key: &str, _value: String) -> Result<(), Error> {
        Err(Error::Storage("quota exceeded".into()))
    }

    fn remove(&self, _key: &str) -> Result<(), Error> {
        Err(Error::Storage("quota exceeded".into()))
    }
}

/// Identity-scoped cache that records every propagation.
#[derive(Default)]
pub(crate) struct CountingScope {
    seen: Mutex<Vec<Option<Identity>>>,
}

impl CountingScope {
    pub(crate) fn count(&self) -> usize {
        self.seen.lock().len()
    }

    pub(crate) fn last(&self) -> Option<Option<Identity>> {
        self.seen.lock().last().cloned()
    }
}

impl IdentityScoped for CountingScope {
    fn on_identity_change(&self, identity: Option<&Identity>) {
        self.seen.lock().push(identity.cloned());
    }
}

static ENV_LOCK: OnceLock<StdMutex<()>> = OnceLock::new();

/// Run `test` with `vars` set (`Some`) or removed (`None`), restoring them afterwards.
///
/// Serialized process-wide, since tests share one environment.
pub(crate) fn with_env<T>(vars: &[(&str, Option<&str>)], test: impl FnOnce() -> T) -> T {
    let lock = ENV_LOCK.get_or_init(|| StdMutex::new(()));
    let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let previous: Vec<(&str, Option<String>)> = vars
        .iter()
        .map(|(name, _)| (*name, std::env::var(name).ok()))
        .collect();
    for (name, value) in vars {
        set_or_remove(name, *value);
    }

    let result = test();

    for (name, value) in &previous {
        set_or_remove(name, value.as_deref());
    }
    result
}

fn set_or_remove(name: &str, value: Option<&str>) {
    match value {
        Some(value) => unsafe { std::env::set_var(name, value) },
        None => unsafe { std::env::remove_var(name) },
    }
}
