use axum::Router;
use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::routing::get;
use axum_extra::extract::PrivateCookieJar;

use super::config::LogoutPolicy;
use super::cookies;
use super::error::login_error;
use super::state::AuthState;
use crate::provider::{CallbackParams, IdentityProvider};
use crate::session::SessionStore;

/// Login, callback and logout routes.
///
/// Merge into the application router and finish with
/// `.with_state(state)`, the same state the protected routes use.
pub fn auth_routes<P, S>(state: &AuthState<P, S>) -> Router<AuthState<P, S>>
where
    P: IdentityProvider,
    S: SessionStore,
{
    let settings = &state.settings;
    Router::new()
        .route(&settings.login_path, get(login::<P, S>))
        .route(&settings.callback_path, get(callback::<P, S>))
        .route(
            &settings.logout_path,
            get(logout::<P, S>).post(logout::<P, S>),
        )
}

// ── Login ──────────────────────────────────────────────────────────

async fn login<P: IdentityProvider, S: SessionStore>(
    State(state): State<AuthState<P, S>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    let request = state.flow.begin();

    let [state_cookie, verifier_cookie] = cookies::pending_cookies(
        &request.pending(),
        state.settings.secure_cookies,
        &state.settings.callback_path,
    );

    (
        jar.add(state_cookie).add(verifier_cookie),
        Redirect::to(&request.url),
    )
}

// ── Callback ───────────────────────────────────────────────────────

async fn callback<P: IdentityProvider, S: SessionStore>(
    State(state): State<AuthState<P, S>>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> (PrivateCookieJar, Redirect) {
    let settings = &state.settings;
    let pending = cookies::pending(&jar);
    let previous = cookies::session_token(&jar, &settings.session_cookie_name);
    let jar = cookies::clear_pending(jar, &settings.callback_path);

    match state
        .flow
        .complete(&params, pending.as_ref(), previous.as_ref())
        .await
    {
        Ok((token, _principal)) => {
            let session_cookie = cookies::session_cookie(
                &settings.session_cookie_name,
                &token,
                settings.session_ttl_days,
                settings.secure_cookies,
            );
            (jar.add(session_cookie), Redirect::to(&settings.after_login))
        }
        Err(e) => (jar, login_error(&settings.login_page, e.login_error_code())),
    }
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<P: IdentityProvider, S: SessionStore>(
    State(state): State<AuthState<P, S>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    let settings = &state.settings;
    let outcome = match cookies::session_token(&jar, &settings.session_cookie_name) {
        Some(token) => state.flow.logout(&token).await,
        None => Ok(()),
    };
    let jar = cookies::clear_session(jar, &settings.session_cookie_name);

    match (outcome, settings.logout_policy) {
        (Err(_), LogoutPolicy::Strict) => (jar, login_error(&settings.login_page, "logout_failed")),
        _ => (jar, Redirect::to(&settings.after_logout)),
    }
}
