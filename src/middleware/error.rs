use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::PrivateCookieJar;

use crate::gate::DenyReason;

/// Rejection of [`Authenticated`](super::Authenticated): the visitor is sent to
/// the login page instead of the protected content.
///
/// When the request carried a session cookie that no longer resolves, the
/// cookie is removed on the way.
pub struct LoginRequired {
    pub(super) reason: DenyReason,
    pub(super) login_page: String,
    pub(super) jar: Option<PrivateCookieJar>,
}

impl LoginRequired {
    #[must_use]
    pub fn reason(&self) -> DenyReason {
        self.reason
    }
}

impl std::fmt::Debug for LoginRequired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequired")
            .field("reason", &self.reason)
            .field("login_page", &self.login_page)
            .finish_non_exhaustive()
    }
}

impl IntoResponse for LoginRequired {
    fn into_response(self) -> Response {
        tracing::debug!(reason = ?self.reason, "access denied, redirecting to login");
        let redirect = Redirect::to(&self.login_page);
        match self.jar {
            Some(jar) => (jar, redirect).into_response(),
            None => redirect.into_response(),
        }
    }
}

/// Redirect to the login page carrying a short error code.
pub(super) fn login_error(login_page: &str, code: &str) -> Redirect {
    let encoded = urlencoding::encode(code);
    Redirect::to(&format!("{login_page}?error={encoded}"))
}
