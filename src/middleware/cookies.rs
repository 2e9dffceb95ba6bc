use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::provider::PendingHandshake;
use crate::types::SessionToken;

const STATE_COOKIE_NAME: &str = "__session_gate_state";
const VERIFIER_COOKIE_NAME: &str = "__session_gate_pkce";

/// The handshake lives at most this long between redirect and callback.
const PENDING_TTL: Duration = Duration::minutes(5);

/// Short-lived cookies carrying `state` + PKCE verifier to the callback.
pub(super) fn pending_cookies(
    pending: &PendingHandshake,
    secure: bool,
    path: &str,
) -> [Cookie<'static>; 2] {
    [
        (STATE_COOKIE_NAME, &pending.state),
        (VERIFIER_COOKIE_NAME, &pending.code_verifier),
    ]
    .map(|(name, value)| {
        Cookie::build((name, value.clone()))
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .path(path.to_string())
            .max_age(PENDING_TTL)
            .build()
    })
}

/// Drop the handshake cookies, whatever the callback's outcome.
pub(super) fn clear_pending(jar: PrivateCookieJar, path: &str) -> PrivateCookieJar {
    [STATE_COOKIE_NAME, VERIFIER_COOKIE_NAME]
        .into_iter()
        .fold(jar, |jar, name| {
            jar.remove(Cookie::build(name).path(path.to_string()))
        })
}

/// Read back what [`pending_cookies`] stored. Both halves must be present.
pub(super) fn pending(jar: &PrivateCookieJar) -> Option<PendingHandshake> {
    Some(PendingHandshake {
        state: jar.get(STATE_COOKIE_NAME)?.value().to_string(),
        code_verifier: jar.get(VERIFIER_COOKIE_NAME)?.value().to_string(),
    })
}

pub(super) fn session_cookie(
    name: &str,
    token: &SessionToken,
    ttl_days: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name.to_string(), token.as_str().to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::days(ttl_days))
        .build()
}

pub(super) fn clear_session(jar: PrivateCookieJar, name: &str) -> PrivateCookieJar {
    jar.remove(Cookie::build(name.to_string()).path("/"))
}

/// Session token from the (decrypted) session cookie. A value that fails
/// decryption or does not look like a token counts as absent.
pub(super) fn session_token(jar: &PrivateCookieJar, name: &str) -> Option<SessionToken> {
    jar.get(name).and_then(|c| SessionToken::parse(c.value()))
}
