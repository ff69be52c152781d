#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The backend reported no valid first-party session.
    #[error("No first-party session")]
    NoSession,

    /// Provider token could not be exchanged for a first-party session.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Backend answered with a non-success status.
    #[error("{operation} failed (status {status:?}): {detail}")]
    Backend {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider notifications are already subscribed")]
    AlreadySubscribed,

    /// No valid identity could be established for a guarded route.
    #[error("Not authenticated")]
    Unauthenticated,
}

impl Error {
    /// Whether the failure is a definitive auth rejection rather than a
    /// transport problem or server fault.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::NoSession | Self::Unauthenticated => true,
            Self::Backend { status: Some(s), .. } => (400..500).contains(s),
            Self::Bridge(e) => e.is_rejection(),
            _ => false,
        }
    }
}

/// Failure of the provider-token exchange.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Backend refused the token (invalid, expired, revoked).
    #[error("Token exchange rejected (status {status})")]
    Rejected { status: u16 },

    /// Backend could not be reached or returned a server fault.
    #[error("Token exchange unavailable: {0}")]
    Unavailable(String),
}

impl BridgeError {
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}
