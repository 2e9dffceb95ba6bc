//! The login state machine: anonymous visitor -> handshake -> session ->
//! gated requests -> logout.

use std::sync::Arc;

use crate::codec::{self, PRINCIPAL_KEY};
use crate::error::AuthError;
use crate::gate::{AccessGate, Decision};
use crate::principal::{self, Principal};
use crate::provider::{AuthorizationRequest, CallbackParams, IdentityProvider, PendingHandshake};
use crate::session::SessionStore;
use crate::types::SessionToken;

/// Payload key of the per-session visit counter.
pub const VIEWS_KEY: &str = "views";

/// Wires an [`IdentityProvider`] to a [`SessionStore`].
pub struct LoginFlow<P, S> {
    provider: Arc<P>,
    store: Arc<S>,
    gate: AccessGate<S>,
}

// Manual Clone: avoid derive adding `P: Clone, S: Clone` bounds.
impl<P, S> Clone for LoginFlow<P, S> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            store: Arc::clone(&self.store),
            gate: self.gate.clone(),
        }
    }
}

impl<P: IdentityProvider, S: SessionStore> LoginFlow<P, S> {
    #[must_use]
    pub fn new(provider: Arc<P>, store: Arc<S>) -> Self {
        let gate = AccessGate::new(Arc::clone(&store));
        Self {
            provider,
            store,
            gate,
        }
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn gate(&self) -> &AccessGate<S> {
        &self.gate
    }

    /// Starts a handshake with the provider's default scopes.
    #[must_use]
    pub fn begin(&self) -> AuthorizationRequest {
        self.provider.begin_handshake(self.provider.default_scopes())
    }

    /// Finishes a handshake and opens an authenticated session.
    ///
    /// The provider round trip happens before any session is touched. A token
    /// presented with the callback (`previous`) is invalidated, so a login
    /// always yields a fresh token.
    ///
    /// # Errors
    ///
    /// Handshake errors from the provider or resolver, or a store error. No
    /// session is left behind on failure.
    pub async fn complete(
        &self,
        params: &CallbackParams,
        pending: Option<&PendingHandshake>,
        previous: Option<&SessionToken>,
    ) -> Result<(SessionToken, Principal), AuthError> {
        let result = self.establish(params, pending, previous).await;
        if let Err(e) = &result {
            tracing::warn!(
                provider = self.provider.name(),
                reason = e.login_error_code(),
                error = %e,
                "login failed"
            );
        }
        result
    }

    async fn establish(
        &self,
        params: &CallbackParams,
        pending: Option<&PendingHandshake>,
        previous: Option<&SessionToken>,
    ) -> Result<(SessionToken, Principal), AuthError> {
        let pending =
            pending.ok_or_else(|| AuthError::InvalidGrant("no pending handshake".into()))?;

        let profile = self.provider.complete_handshake(params, pending).await?;
        let principal = principal::resolve(&profile)?;

        if let Some(previous) = previous {
            if let Err(e) = self.store.invalidate(previous).await {
                tracing::warn!(error = %e, "could not invalidate pre-login session");
            }
        }

        let token = self.store.create().await?.token;
        let stored = codec::encode_value(&principal);
        if let Err(e) = self
            .store
            .mutate(&token, move |payload| {
                payload.insert(PRINCIPAL_KEY.into(), stored);
            })
            .await
        {
            // Do not leave an anonymous session behind.
            if let Err(cleanup) = self.store.invalidate(&token).await {
                tracing::warn!(
                    session = %token.fingerprint(),
                    error = %cleanup,
                    "could not discard session after failed login"
                );
            }
            return Err(e);
        }

        tracing::info!(
            provider = principal.provider(),
            session = %token.fingerprint(),
            "login successful"
        );
        Ok((token, principal))
    }

    /// See [`AccessGate::authorize`].
    pub async fn authorize(&self, token: Option<&SessionToken>) -> Decision {
        self.gate.authorize(token).await
    }

    /// Counts a visit in the session and returns the new count (first visit is 1).
    ///
    /// # Errors
    ///
    /// [`AuthError::UnknownToken`] if the session is gone.
    pub async fn record_visit(&self, token: &SessionToken) -> Result<u64, AuthError> {
        self.store
            .mutate(token, |payload| {
                let views = payload
                    .get(VIEWS_KEY)
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(0)
                    .saturating_add(1);
                payload.insert(VIEWS_KEY.into(), views.into());
                views
            })
            .await
    }

    /// Invalidates the session, retrying once if the store fails.
    ///
    /// # Errors
    ///
    /// The store error of the second attempt; the token may still resolve.
    pub async fn logout(&self, token: &SessionToken) -> Result<(), AuthError> {
        let outcome = match self.store.invalidate(token).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "session invalidation failed, retrying");
                self.store.invalidate(token).await
            }
        };
        match &outcome {
            Ok(()) => tracing::info!(session = %token.fingerprint(), "logged out"),
            Err(e) => tracing::error!(
                session = %token.fingerprint(),
                error = %e,
                "logout could not invalidate session"
            ),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProviderProfile;
    use crate::session::{MemorySessionStore, Payload, Session};

    /// Accepts the grant "good" and returns a fixed profile.
    struct FixedProvider {
        profile: ProviderProfile,
        scopes: Vec<String>,
    }

    impl IdentityProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        fn default_scopes(&self) -> &[String] {
            &self.scopes
        }

        fn begin_handshake(&self, _scopes: &[String]) -> AuthorizationRequest {
            AuthorizationRequest {
                url: "https://idp.test/authorize".into(),
                state: "s".into(),
                code_verifier: "v".into(),
            }
        }

        async fn complete_handshake(
            &self,
            params: &CallbackParams,
            pending: &PendingHandshake,
        ) -> Result<ProviderProfile, AuthError> {
            match params.grant(pending)? {
                "good" => Ok(self.profile.clone()),
                _ => Err(AuthError::ProviderRejected {
                    operation: "token exchange",
                    status: Some(400),
                    detail: "invalid_grant".into(),
                }),
            }
        }
    }

    fn flow(profile: ProviderProfile) -> LoginFlow<FixedProvider, MemorySessionStore> {
        LoginFlow::new(
            Arc::new(FixedProvider {
                profile,
                scopes: vec![],
            }),
            Arc::new(MemorySessionStore::new()),
        )
    }

    fn ada() -> ProviderProfile {
        ProviderProfile::new("fixed", "g123")
            .with_display_name("Ada")
            .with_email("ada@x.com", true)
    }

    fn callback(code: &str) -> CallbackParams {
        CallbackParams {
            code: Some(code.into()),
            state: Some("s".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_pending_handshake_is_invalid_grant() {
        let flow = flow(ada());
        let result = flow.complete(&callback("good"), None, None).await;
        assert!(matches!(result, Err(AuthError::InvalidGrant(_))));
        assert!(flow.store().is_empty());
    }

    #[tokio::test]
    async fn incomplete_profile_creates_no_session() {
        let flow = flow(ProviderProfile::new("fixed", "g123").with_email("ada@x.com", false));
        let pending = flow.begin().pending();
        let result = flow.complete(&callback("good"), Some(&pending), None).await;
        assert!(matches!(result, Err(AuthError::IncompleteProfile(_))));
        assert!(flow.store().is_empty());
    }

    #[tokio::test]
    async fn login_replaces_previous_session() {
        let flow = flow(ada());
        let pending = flow.begin().pending();
        let (first, _) = flow
            .complete(&callback("good"), Some(&pending), None)
            .await
            .unwrap();
        let (second, _) = flow
            .complete(&callback("good"), Some(&pending), Some(&first))
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(!flow.authorize(Some(&first)).await.is_allowed());
        assert!(flow.authorize(Some(&second)).await.is_allowed());
        assert_eq!(flow.store().len(), 1);
    }

    #[tokio::test]
    async fn visit_counter_starts_at_one() {
        let flow = flow(ada());
        let pending = flow.begin().pending();
        let (token, _) = flow
            .complete(&callback("good"), Some(&pending), None)
            .await
            .unwrap();

        assert_eq!(flow.record_visit(&token).await.unwrap(), 1);
        assert_eq!(flow.record_visit(&token).await.unwrap(), 2);
        assert_eq!(flow.record_visit(&token).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn visit_on_unknown_token_fails() {
        let flow = flow(ada());
        assert!(matches!(
            flow.record_visit(&SessionToken::generate()).await,
            Err(AuthError::UnknownToken)
        ));
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let flow = flow(ada());
        let pending = flow.begin().pending();
        let (token, _) = flow
            .complete(&callback("good"), Some(&pending), None)
            .await
            .unwrap();
        flow.logout(&token).await.unwrap();
        flow.logout(&token).await.unwrap();
        assert!(!flow.authorize(Some(&token)).await.is_allowed());
    }

    /// Sessions can be opened and dropped but never written.
    #[derive(Default)]
    struct ReadOnlyStore(MemorySessionStore);

    impl SessionStore for ReadOnlyStore {
        async fn create(&self) -> Result<Session, AuthError> {
            self.0.create().await
        }

        async fn load(&self, token: &SessionToken) -> Result<Option<Session>, AuthError> {
            self.0.load(token).await
        }

        async fn mutate<F, R>(&self, _token: &SessionToken, _f: F) -> Result<R, AuthError>
        where
            F: FnOnce(&mut Payload) -> R + Send,
            R: Send,
        {
            Err(AuthError::Store("read-only".into()))
        }

        async fn invalidate(&self, token: &SessionToken) -> Result<(), AuthError> {
            self.0.invalidate(token).await
        }
    }

    #[tokio::test]
    async fn failed_principal_write_discards_new_session() {
        let flow = LoginFlow::new(
            Arc::new(FixedProvider {
                profile: ada(),
                scopes: vec![],
            }),
            Arc::new(ReadOnlyStore::default()),
        );
        let pending = flow.begin().pending();

        let err = flow
            .complete(&callback("good"), Some(&pending), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Store(_)));
        assert!(flow.store().0.is_empty());
    }
}
