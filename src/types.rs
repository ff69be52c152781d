use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Backend-assigned user identifier (opaque string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Resolved user record.
///
/// Authoritative only when it came from the backend session service; copies
/// held in caches are rendering hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Identity {
    pub id: UserId,
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    /// Create an identity with only the required `id`.
    #[must_use]
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            email: None,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Identity-provider access token.
///
/// `Debug` never prints the value, so tokens stay out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Session object observed from the third-party identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ProviderSession {
    pub access_token: AccessToken,
    /// `None` when the provider does not report an expiry.
    pub expires_at: Option<OffsetDateTime>,
}

impl ProviderSession {
    #[must_use]
    pub fn new(access_token: AccessToken, expires_at: Option<OffsetDateTime>) -> Self {
        Self {
            access_token,
            expires_at,
        }
    }

    /// A session is live when it carries a token that has not yet expired.
    #[must_use]
    pub fn is_live(&self, now: OffsetDateTime) -> bool {
        !self.access_token.is_empty() && self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// Kind of session-change notification pushed by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    Other,
}

/// One notification from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    pub kind: ProviderEventKind,
    pub session: Option<ProviderSession>,
}

impl ProviderEvent {
    #[must_use]
    pub fn signed_in(session: ProviderSession) -> Self {
        Self {
            kind: ProviderEventKind::SignedIn,
            session: Some(session),
        }
    }

    #[must_use]
    pub fn signed_out() -> Self {
        Self {
            kind: ProviderEventKind::SignedOut,
            session: None,
        }
    }

    #[must_use]
    pub fn token_refreshed(session: Option<ProviderSession>) -> Self {
        Self {
            kind: ProviderEventKind::TokenRefreshed,
            session,
        }
    }
}

/// Outcome of one resolution attempt. Never partially populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationResult {
    Authenticated(Identity),
    Unauthenticated,
}

impl ReconciliationResult {
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            Self::Unauthenticated => None,
        }
    }
}

impl From<Option<Identity>> for ReconciliationResult {
    fn from(identity: Option<Identity>) -> Self {
        identity.map_or(Self::Unauthenticated, Self::Authenticated)
    }
}
