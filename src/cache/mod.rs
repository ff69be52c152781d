//! Identity caches.
//!
//! Two caches with different authorities and lifetimes:
//!
//! - [`SessionCache`]: last known identity for rendering, 5 minute TTL, in
//!   session storage. Never used for access decisions.
//! - [`RouteGuardCache`]: identity for navigation guards, 30 second TTL, held
//!   in memory and invalidated synchronously on logout.
//!
//! [`DependentCacheBridge`] propagates authoritative identity changes to any
//! other cache whose contents belong to one user.

mod dependent;
mod route_guard;
mod session;

pub use dependent::{DependentCacheBridge, IdentityScoped, ScopedCache};
pub use route_guard::{GuardDecision, RouteGuardCache};
pub use session::{CachedIdentity, SessionCache};
