use std::future::Future;

use crate::error::Error;
use crate::types::{AccessToken, Identity, ProviderSession};

/// Backend session service.
///
/// The first-party credential is an HTTP-only cookie: implementations carry it
/// implicitly (e.g. in a cookie store) and never expose it.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionBackend for MyBackend {
///     async fn current_user(&self) -> Result<Identity, Error> {
///         self.get_json("/auth/me").await
///     }
///
///     async fn exchange_token(&self, token: &AccessToken) -> Result<Identity, Error> {
///         self.post_json("/auth/oauth/callback", token.as_str()).await
///     }
///
///     async fn logout(&self) -> Result<(), Error> {
///         self.post("/auth/logout").await
///     }
/// }
/// ```
pub trait SessionBackend: Send + Sync + 'static {
    /// `GET /auth/me`. Any failure means "no session" to callers.
    fn current_user(&self) -> impl Future<Output = Result<Identity, Error>> + Send;

    /// `POST /auth/oauth/callback`. On success the backend also sets or
    /// refreshes the first-party credential.
    fn exchange_token(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = Result<Identity, Error>> + Send;

    /// Best-effort server-side logout.
    fn logout(&self) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Pull side of the third-party identity provider.
///
/// The push side (session-change notifications) is delivered as
/// [`ProviderEvent`](crate::ProviderEvent) values through a channel handed to
/// [`AuthController::subscribe`](crate::AuthController::subscribe).
pub trait IdentityProvider: Send + Sync + 'static {
    /// Current provider session, if any.
    fn current_session(&self) -> impl Future<Output = Option<ProviderSession>> + Send;
}

/// Key/value storage scoped to the current browsing session.
pub trait SessionStorage: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    fn set(&self, key: &str, value: String) -> Result<(), Error>;

    fn remove(&self, key: &str) -> Result<(), Error>;
}

impl<T: SessionBackend> SessionBackend for std::sync::Arc<T> {
    fn current_user(&self) -> impl Future<Output = Result<Identity, Error>> + Send {
        (**self).current_user()
    }

    fn exchange_token(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = Result<Identity, Error>> + Send {
        (**self).exchange_token(token)
    }

    fn logout(&self) -> impl Future<Output = Result<(), Error>> + Send {
        (**self).logout()
    }
}

impl<T: IdentityProvider> IdentityProvider for std::sync::Arc<T> {
    fn current_session(&self) -> impl Future<Output = Option<ProviderSession>> + Send {
        (**self).current_session()
    }
}
