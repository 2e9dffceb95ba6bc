use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::{GateConfig, GateSettings};
use crate::flow::LoginFlow;
use crate::provider::IdentityProvider;
use crate::session::SessionStore;

/// Router state shared by the auth routes, the [`Authenticated`](super::Authenticated)
/// extractor and application handlers.
pub struct AuthState<P, S> {
    pub(super) flow: LoginFlow<P, S>,
    pub(super) settings: Arc<GateSettings>,
}

// Manual Clone: avoid derive adding `P: Clone, S: Clone` bounds.
impl<P, S> Clone for AuthState<P, S> {
    fn clone(&self) -> Self {
        Self {
            flow: self.flow.clone(),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<P: IdentityProvider, S: SessionStore> AuthState<P, S> {
    /// The store is taken as an `Arc` so the application can keep a handle
    /// (e.g. to sweep expired sessions).
    #[must_use]
    pub fn new(config: GateConfig<P>, store: Arc<S>) -> Self {
        Self {
            flow: LoginFlow::new(Arc::new(config.provider), store),
            settings: Arc::new(config.settings),
        }
    }

    #[must_use]
    pub fn flow(&self) -> &LoginFlow<P, S> {
        &self.flow
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<P, S> FromRef<AuthState<P, S>> for Key {
    fn from_ref(state: &AuthState<P, S>) -> Self {
        state.settings.cookie_key.clone()
    }
}
