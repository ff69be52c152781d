use time::Duration;

use crate::error::Error;

/// Default lifetime of the rendering cache.
pub const DEFAULT_SESSION_TTL: Duration = Duration::minutes(5);
/// Default lifetime of a route-guard entry. Shorter than the session cache
/// because it gates access.
pub const DEFAULT_GUARD_TTL: Duration = Duration::seconds(30);
pub const DEFAULT_CACHE_KEY: &str = "auth_user_cache";

/// Cache and navigation settings.
///
/// All fields have defaults. Override with `with_*` methods, or use
/// [`from_env()`](SessionConfig::from_env).
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SessionConfig {
    pub(crate) session_ttl: Duration,
    pub(crate) guard_ttl: Duration,
    pub(crate) cache_key: String,
    pub(crate) login_path: String,
    pub(crate) redirect_param: String,
    pub(crate) logout_redirect: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_SESSION_TTL,
            guard_ttl: DEFAULT_GUARD_TTL,
            cache_key: DEFAULT_CACHE_KEY.into(),
            login_path: "/login".into(),
            redirect_param: "redirect".into(),
            logout_redirect: "/".into(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `AUTH_SESSION_TTL_SECS`: session cache lifetime in seconds
    /// - `AUTH_GUARD_TTL_SECS`: route-guard cache lifetime in seconds
    /// - `AUTH_CACHE_KEY`: storage key of the session cache entry
    /// - `AUTH_LOGIN_PATH`: login surface guarded routes redirect to
    /// - `AUTH_LOGOUT_REDIRECT`: location returned after logout
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a TTL is not a positive integer.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(ttl) = env_secs("AUTH_SESSION_TTL_SECS")? {
            config = config.with_session_ttl(ttl);
        }
        if let Some(ttl) = env_secs("AUTH_GUARD_TTL_SECS")? {
            config = config.with_guard_ttl(ttl);
        }
        if let Ok(key) = std::env::var("AUTH_CACHE_KEY") {
            config = config.with_cache_key(key);
        }
        if let Ok(path) = std::env::var("AUTH_LOGIN_PATH") {
            config = config.with_login_path(path);
        }
        if let Ok(path) = std::env::var("AUTH_LOGOUT_REDIRECT") {
            config = config.with_logout_redirect(path);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_guard_ttl(mut self, ttl: Duration) -> Self {
        self.guard_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = key.into();
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_redirect_param(mut self, param: impl Into<String>) -> Self {
        self.redirect_param = param.into();
        self
    }

    #[must_use]
    pub fn with_logout_redirect(mut self, path: impl Into<String>) -> Self {
        self.logout_redirect = path.into();
        self
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    #[must_use]
    pub fn guard_ttl(&self) -> Duration {
        self.guard_ttl
    }

    #[must_use]
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn logout_redirect(&self) -> &str {
        &self.logout_redirect
    }

    /// Login location preserving `requested` for the post-login redirect.
    #[must_use]
    pub fn login_redirect_for(&self, requested: &str) -> String {
        let encoded = urlencoding::encode(requested);
        format!("{}?{}={encoded}", self.login_path, self.redirect_param)
    }
}

pub(crate) fn env_secs(name: &str) -> Result<Option<Duration>, Error> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    let secs: u32 = raw
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{name}: {e}")))?;
    if secs == 0 {
        return Err(Error::Config(format!("{name} must be positive")));
    }
    Ok(Some(Duration::seconds(i64::from(secs))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::with_env;

    #[test]
    fn defaults_keep_guard_ttl_shorter() {
        let config = SessionConfig::new();
        assert_eq!(config.session_ttl(), Duration::minutes(5));
        assert_eq!(config.guard_ttl(), Duration::seconds(30));
        assert!(config.guard_ttl() < config.session_ttl());
        assert_eq!(config.cache_key(), "auth_user_cache");
    }

    #[test]
    fn login_redirect_preserves_path() {
        let config = SessionConfig::new();
        assert_eq!(
            config.login_redirect_for("/notes?id=3"),
            "/login?redirect=%2Fnotes%3Fid%3D3"
        );
    }

    #[test]
    fn overrides_apply() {
        let config = SessionConfig::new()
            .with_login_path("/signin")
            .with_redirect_param("next")
            .with_guard_ttl(Duration::seconds(10));

        assert_eq!(config.login_redirect_for("/quiz"), "/signin?next=%2Fquiz");
        assert_eq!(config.guard_ttl(), Duration::seconds(10));
    }

    #[test]
    fn env_secs_parses_positive_seconds() {
        with_env(&[("AUTH_TEST_TTL_SECS", Some(" 45 "))], || {
            assert_eq!(
                env_secs("AUTH_TEST_TTL_SECS").unwrap(),
                Some(Duration::seconds(45))
            );
        });
        with_env(&[("AUTH_TEST_TTL_SECS", None)], || {
            assert_eq!(env_secs("AUTH_TEST_TTL_SECS").unwrap(), None);
        });
    }

    #[test]
    fn env_secs_rejects_zero_and_garbage() {
        for raw in ["0", "soon", "-5"] {
            with_env(&[("AUTH_TEST_TTL_SECS", Some(raw))], || {
                assert!(matches!(
                    env_secs("AUTH_TEST_TTL_SECS"),
                    Err(Error::Config(_))
                ));
            });
        }
    }

    #[test]
    fn from_env_applies_overrides() {
        let vars = [
            ("AUTH_SESSION_TTL_SECS", Some("120")),
            ("AUTH_GUARD_TTL_SECS", Some("15")),
            ("AUTH_CACHE_KEY", Some("who_am_i")),
            ("AUTH_LOGIN_PATH", Some("/signin")),
            ("AUTH_LOGOUT_REDIRECT", Some("/bye")),
        ];
        let config = with_env(&vars, SessionConfig::from_env).unwrap();

        assert_eq!(config.session_ttl(), Duration::minutes(2));
        assert_eq!(config.guard_ttl(), Duration::seconds(15));
        assert_eq!(config.cache_key(), "who_am_i");
        assert_eq!(config.login_redirect_for("/quiz"), "/signin?redirect=%2Fquiz");
        assert_eq!(config.logout_redirect(), "/bye");
    }

    #[test]
    fn from_env_rejects_zero_ttl() {
        let vars = [
            ("AUTH_SESSION_TTL_SECS", Some("0")),
            ("AUTH_GUARD_TTL_SECS", None),
        ];
        let result = with_env(&vars, SessionConfig::from_env);

        assert!(matches!(result, Err(Error::Config(_))));
    }
}
