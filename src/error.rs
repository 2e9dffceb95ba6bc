/// Authentication and session errors.
///
/// The first four variants can only arise while completing a handshake with the
/// identity provider. `CorruptSession` and `UnknownToken` mean "not
/// authenticated" and are never surfaced to a user as a fault.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The callback carried no usable grant (missing code, state mismatch).
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    /// The provider answered but refused the request.
    #[error("provider rejected {operation}: {detail}")]
    ProviderRejected {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    /// The provider could not be reached or failed on its side.
    #[error("provider unavailable during {operation}: {detail}")]
    ProviderUnavailable {
        operation: &'static str,
        detail: String,
    },

    /// The provider profile lacks a stable identifier or a verified address.
    #[error("incomplete profile: {0}")]
    IncompleteProfile(&'static str),

    /// The stored principal form is missing fields or malformed.
    #[error("corrupt session: {0}")]
    CorruptSession(String),

    /// The token does not resolve to a live session.
    #[error("unknown session token")]
    UnknownToken,

    /// The session backend failed.
    #[error("session store error: {0}")]
    Store(String),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Whether a single retry after a short backoff may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable { .. })
    }

    /// Whether the error belongs to the handshake phase of a login.
    #[must_use]
    pub fn is_handshake_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidGrant(_)
                | Self::ProviderRejected { .. }
                | Self::ProviderUnavailable { .. }
                | Self::IncompleteProfile(_)
        )
    }

    /// Short, URL-safe code carried in the `?error=` query of a login redirect.
    ///
    /// Never includes provider-supplied text.
    #[must_use]
    pub fn login_error_code(&self) -> &'static str {
        match self {
            Self::InvalidGrant(_) => "invalid_grant",
            Self::ProviderRejected { .. } => "provider_rejected",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::IncompleteProfile(_) => "incomplete_profile",
            Self::CorruptSession(_) | Self::UnknownToken => "session_invalid",
            Self::Store(_) => "session_failed",
            Self::Config(_) => "internal",
        }
    }
}
