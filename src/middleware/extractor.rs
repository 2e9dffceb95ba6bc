use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::PrivateCookieJar;

use super::cookies;
use super::error::LoginRequired;
use super::state::AuthState;
use crate::gate::{Decision, DenyReason};
use crate::principal::Principal;
use crate::provider::IdentityProvider;
use crate::session::SessionStore;
use crate::types::SessionToken;

/// A request that passed the access gate.
///
/// Use as an axum extractor; a handler taking it never runs for an
/// unauthenticated request. Rejects with [`LoginRequired`], a redirect to the
/// login page.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(
///     State(state): State<AuthState<AuthClient, MemorySessionStore>>,
///     user: Authenticated,
/// ) -> impl IntoResponse {
///     let views = state.flow().record_visit(&user.token).await.unwrap_or(0);
///     format!("Hello, {} ({views} visits)", user.principal.display_name())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Authenticated {
    /// Session token (from cookie), for further session mutations.
    pub token: SessionToken,
    /// Principal reconstructed from the session.
    pub principal: Principal,
}

impl<P: IdentityProvider, S: SessionStore> FromRequestParts<AuthState<P, S>> for Authenticated {
    type Rejection = LoginRequired;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthState<P, S>,
    ) -> Result<Self, Self::Rejection> {
        let settings = &state.settings;
        let deny = |reason: DenyReason, jar: Option<PrivateCookieJar>| LoginRequired {
            reason,
            login_page: settings.login_page.clone(),
            jar,
        };

        let jar: PrivateCookieJar = match PrivateCookieJar::from_request_parts(parts, state).await {
            Ok(jar) => jar,
            Err(never) => match never {},
        };
        let token = cookies::session_token(&jar, &settings.session_cookie_name);

        let decision = state.flow.authorize(token.as_ref()).await;

        match (decision, token) {
            (Decision::Allow(principal), Some(token)) => Ok(Self { token, principal }),
            (Decision::Deny(DenyReason::MissingToken), _) => {
                let stale = jar.get(&settings.session_cookie_name).is_some();
                let jar =
                    stale.then(|| cookies::clear_session(jar, &settings.session_cookie_name));
                Err(deny(DenyReason::MissingToken, jar))
            }
            (Decision::Deny(reason), _) => Err(deny(
                reason,
                Some(cookies::clear_session(jar, &settings.session_cookie_name)),
            )),
            (Decision::Allow(_), None) => Err(deny(DenyReason::MissingToken, None)),
        }
    }
}
