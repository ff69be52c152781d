use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::traits::SessionBackend;
use crate::types::{AccessToken, Identity};

/// Backend session service endpoints.
///
/// The base URL is a constructor parameter; endpoint paths default to
/// `/auth/me`, `/auth/oauth/callback` and `/auth/logout` under it.
///
/// ```rust,ignore
/// use session_reconciler::BackendConfig;
///
/// let config = BackendConfig::new("https://app.example.com".parse()?)?
///     .with_timeout(std::time::Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct BackendConfig {
    pub(crate) me_url: Url,
    pub(crate) callback_url: Url,
    pub(crate) logout_url: Url,
    pub(crate) timeout: Option<Duration>,
}

impl BackendConfig {
    /// Derive all endpoints from `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `base_url` cannot be a base (e.g. `mailto:`).
    pub fn new(base_url: Url) -> Result<Self, Error> {
        let join = |path: &str| {
            base_url
                .join(path)
                .map_err(|e| Error::Config(format!("{base_url}: {e}")))
        };
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("{base_url} cannot be a base URL")));
        }
        Ok(Self {
            me_url: join("/auth/me")?,
            callback_url: join("/auth/oauth/callback")?,
            logout_url: join("/auth/logout")?,
            timeout: None,
        })
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `AUTH_BACKEND_URL`: base URL of the backend session service
    ///
    /// # Optional env vars
    /// - `AUTH_ME_URL`, `AUTH_CALLBACK_URL`, `AUTH_LOGOUT_URL`: endpoint overrides
    /// - `AUTH_TIMEOUT_SECS`: per-request timeout (unset means no timeout)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is missing or any value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        let base = std::env::var("AUTH_BACKEND_URL")
            .map_err(|_| Error::Config("AUTH_BACKEND_URL is required".into()))?;
        let base: Url = base
            .parse()
            .map_err(|e| Error::Config(format!("AUTH_BACKEND_URL: {e}")))?;

        let mut config = Self::new(base)?;

        if let Some(url) = env_url("AUTH_ME_URL")? {
            config = config.with_me_url(url);
        }
        if let Some(url) = env_url("AUTH_CALLBACK_URL")? {
            config = config.with_callback_url(url);
        }
        if let Some(url) = env_url("AUTH_LOGOUT_URL")? {
            config = config.with_logout_url(url);
        }
        if let Some(timeout) = crate::config::env_secs("AUTH_TIMEOUT_SECS")? {
            config = config.with_timeout(timeout.unsigned_abs());
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_me_url(mut self, url: Url) -> Self {
        self.me_url = url;
        self
    }

    #[must_use]
    pub fn with_callback_url(mut self, url: Url) -> Self {
        self.callback_url = url;
        self
    }

    #[must_use]
    pub fn with_logout_url(mut self, url: Url) -> Self {
        self.logout_url = url;
        self
    }

    /// Bound every backend request. Without it a hung backend call keeps the
    /// controller loading indefinitely.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn me_url(&self) -> &Url {
        &self.me_url
    }

    #[must_use]
    pub fn callback_url(&self) -> &Url {
        &self.callback_url
    }

    #[must_use]
    pub fn logout_url(&self) -> &Url {
        &self.logout_url
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

fn env_url(name: &str) -> Result<Option<Url>, Error> {
    std::env::var(name)
        .ok()
        .map(|raw| {
            raw.parse()
                .map_err(|e| Error::Config(format!("{name}: {e}")))
        })
        .transpose()
}

#[cfg_attr(not(feature = "http"), allow(dead_code))]
#[derive(Serialize)]
struct CallbackRequest<'a> {
    access_token: &'a str,
}

#[cfg_attr(not(feature = "http"), allow(dead_code))]
#[derive(Deserialize)]
struct CallbackResponse {
    user: Identity,
}

/// reqwest-backed [`SessionBackend`].
///
/// Uses a cookie store so the HTTP-only first-party credential set by the
/// callback endpoint is sent on later `/auth/me` calls.
#[cfg(feature = "http")]
pub struct HttpBackend {
    config: BackendConfig,
    http: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpBackend {
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: BackendConfig) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder().cookie_store(true);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    /// Use a custom HTTP client. It must keep a cookie store for the
    /// first-party session to survive between calls.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Backend {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

#[cfg(feature = "http")]
impl SessionBackend for HttpBackend {
    async fn current_user(&self) -> Result<Identity, Error> {
        let response = self.http.get(self.config.me_url.clone()).send().await?;

        let response = match Self::ensure_success(response, "session lookup").await {
            Ok(response) => response,
            Err(Error::Backend {
                status: Some(401 | 403),
                ..
            }) => return Err(Error::NoSession),
            Err(e) => return Err(e),
        };
        response.json::<Identity>().await.map_err(Into::into)
    }

    async fn exchange_token(&self, token: &AccessToken) -> Result<Identity, Error> {
        let response = self
            .http
            .post(self.config.callback_url.clone())
            .json(&CallbackRequest {
                access_token: token.as_str(),
            })
            .send()
            .await?;

        let response = Self::ensure_success(response, "token exchange").await?;
        let body = response.json::<CallbackResponse>().await?;
        Ok(body.user)
    }

    async fn logout(&self) -> Result<(), Error> {
        let response = self.http.post(self.config.logout_url.clone()).send().await?;
        Self::ensure_success(response, "logout").await?;
        Ok(())
    }
}
