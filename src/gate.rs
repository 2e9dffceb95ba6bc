use std::sync::Arc;

use crate::codec::{self, PRINCIPAL_KEY};
use crate::principal::Principal;
use crate::session::SessionStore;
use crate::types::SessionToken;

/// Outcome of [`AccessGate::authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(Principal),
    Deny(DenyReason),
}

impl Decision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }

    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Allow(p) => Some(p),
            Self::Deny(_) => None,
        }
    }
}

/// Why a request was denied. Every reason means "send to login".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The request carried no token.
    MissingToken,
    /// The token is unknown, expired or invalidated.
    UnknownToken,
    /// The session exists but nobody has logged in on it.
    Anonymous,
    /// The stored principal could not be decoded.
    CorruptSession,
    /// The session backend failed; fail closed.
    StoreUnavailable,
}

/// Request-time check that a session holds an authenticated principal.
pub struct AccessGate<S> {
    store: Arc<S>,
}

impl<S> Clone for AccessGate<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SessionStore> AccessGate<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Allows only when the token resolves to a session whose stored
    /// principal decodes. A corrupt session is invalidated so the next login
    /// starts clean.
    pub async fn authorize(&self, token: Option<&SessionToken>) -> Decision {
        let Some(token) = token else {
            return Decision::Deny(DenyReason::MissingToken);
        };

        let session = match self.store.load(token).await {
            Ok(Some(session)) => session,
            Ok(None) => return Decision::Deny(DenyReason::UnknownToken),
            Err(e) => {
                tracing::error!(error = %e, "session lookup failed, denying");
                return Decision::Deny(DenyReason::StoreUnavailable);
            }
        };

        let Some(stored) = session.payload.get(PRINCIPAL_KEY) else {
            return Decision::Deny(DenyReason::Anonymous);
        };

        match codec::decode_value(stored) {
            Ok(principal) => Decision::Allow(principal),
            Err(e) => {
                tracing::warn!(
                    session = %token.fingerprint(),
                    error = %e,
                    "discarding corrupt session"
                );
                if let Err(e) = self.store.invalidate(token).await {
                    tracing::error!(error = %e, "failed to invalidate corrupt session");
                }
                Decision::Deny(DenyReason::CorruptSession)
            }
        }
    }
}
