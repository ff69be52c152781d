use std::sync::Arc;

use crate::error::{BridgeError, Error};
use crate::traits::SessionBackend;
use crate::types::{AccessToken, Identity};

/// Converts an identity-provider session into a first-party session.
///
/// Stateless: repeated exchanges of the same token either re-confirm the same
/// identity or fail the same way. Failures are never retried here.
pub struct IdentityBridge<B> {
    backend: Arc<B>,
}

// Manual Clone: avoid derive adding a `B: Clone` bound.
impl<B> Clone for IdentityBridge<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

impl<B: SessionBackend> IdentityBridge<B> {
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Exchange a provider access token for the first-party identity.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Rejected`] when the backend refuses the token and
    /// [`BridgeError::Unavailable`] when it cannot be reached or faults.
    pub async fn exchange(&self, token: &AccessToken) -> Result<Identity, BridgeError> {
        match self.backend.exchange_token(token).await {
            Ok(identity) => {
                tracing::debug!(user_id = %identity.id, "Provider token bridged");
                Ok(identity)
            }
            Err(e) => {
                let err = classify(e);
                tracing::warn!(error = %err, "Provider token exchange failed");
                Err(err)
            }
        }
    }
}

fn classify(e: Error) -> BridgeError {
    match e {
        Error::Bridge(inner) => inner,
        Error::NoSession | Error::Unauthenticated => BridgeError::Rejected { status: 401 },
        Error::Backend {
            status: Some(status),
            ..
        } if (400..500).contains(&status) => BridgeError::Rejected { status },
        // Response bodies may echo the request, so only the status is kept.
        Error::Backend {
            operation, status, ..
        } => BridgeError::Unavailable(match status {
            Some(status) => format!("{operation} returned {status}"),
            None => format!("{operation} failed"),
        }),
        other => BridgeError::Unavailable(other.to_string()),
    }
}
