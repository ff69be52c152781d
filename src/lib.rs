#![doc = include_str!("../README.md")]

pub mod backend;
pub mod bridge;
pub mod cache;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod generation;
pub mod storage;
pub mod traits;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use backend::BackendConfig;
#[cfg(feature = "http")]
pub use backend::HttpBackend;
pub use bridge::IdentityBridge;
pub use cache::{
    CachedIdentity, DependentCacheBridge, GuardDecision, IdentityScoped, RouteGuardCache,
    ScopedCache, SessionCache,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SessionConfig;
pub use controller::{AuthController, AuthControllerBuilder, AuthSnapshot, AuthState};
pub use error::{BridgeError, Error};
pub use generation::Generation;
pub use storage::MemoryStorage;
pub use traits::{IdentityProvider, SessionBackend, SessionStorage};
pub use types::{
    AccessToken, Identity, ProviderEvent, ProviderEventKind, ProviderSession,
    ReconciliationResult, UserId,
};
