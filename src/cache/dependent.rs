use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{Identity, UserId};

/// Auxiliary cache whose contents belong to one user.
///
/// Called synchronously from inside an authoritative identity transition;
/// implementations must not block or call back into the controller.
pub trait IdentityScoped: Send + Sync {
    fn on_identity_change(&self, identity: Option<&Identity>);
}

/// Fans identity transitions out to every registered identity-scoped cache.
///
/// Consecutive identical outcomes are propagated once.
#[derive(Default)]
pub struct DependentCacheBridge {
    caches: Mutex<Vec<Arc<dyn IdentityScoped>>>,
    /// `None` until the first propagation.
    last: Mutex<Option<Option<Identity>>>,
}

impl DependentCacheBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, cache: Arc<dyn IdentityScoped>) {
        self.caches.lock().push(cache);
    }

    /// Re-key or invalidate every registered cache for `identity`.
    ///
    /// Returns `false` when the outcome equals the previous one and nothing
    /// was propagated.
    pub fn on_identity_change(&self, identity: Option<&Identity>) -> bool {
        {
            let mut last = self.last.lock();
            if last.as_ref().is_some_and(|prev| prev.as_ref() == identity) {
                return false;
            }
            *last = Some(identity.cloned());
        }

        let caches = self.caches.lock().clone();
        tracing::debug!(
            user_id = ?identity.map(|i| &i.id),
            caches = caches.len(),
            "Propagating identity change"
        );
        for cache in caches {
            cache.on_identity_change(identity);
        }
        true
    }
}

/// Identity-scoped key/value cache, e.g. a user's list of uploaded materials.
///
/// Entries belong to the current owner; reads and writes for any other user
/// are refused, and every identity change empties the cache.
pub struct ScopedCache<K, V> {
    inner: Mutex<Scoped<K, V>>,
}

struct Scoped<K, V> {
    owner: Option<UserId>,
    entries: HashMap<K, V>,
}

impl<K, V> Default for ScopedCache<K, V> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Scoped {
                owner: None,
                entries: HashMap::new(),
            }),
        }
    }
}

impl<K: Eq + Hash, V: Clone> ScopedCache<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, user: &UserId, key: &K) -> Option<V> {
        let inner = self.inner.lock();
        if inner.owner.as_ref() != Some(user) {
            return None;
        }
        inner.entries.get(key).cloned()
    }

    /// Store `value` for `user`. Returns `false` if `user` is not the current owner.
    pub fn insert(&self, user: &UserId, key: K, value: V) -> bool {
        let mut inner = self.inner.lock();
        if inner.owner.as_ref() != Some(user) {
            return false;
        }
        inner.entries.insert(key, value);
        true
    }

    #[must_use]
    pub fn owner(&self) -> Option<UserId> {
        self.inner.lock().owner.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Send, V: Send> IdentityScoped for ScopedCache<K, V> {
    fn on_identity_change(&self, identity: Option<&Identity>) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.owner = identity.map(|i| i.id.clone());
    }
}
