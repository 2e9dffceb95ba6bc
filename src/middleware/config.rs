use axum_extra::extract::cookie::Key;
use url::Url;

use crate::error::AuthError;
use crate::provider::{AuthClient, ProviderConfig};
use crate::types::ClientSecret;

/// What the logout route does when the session cannot be invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogoutPolicy {
    /// Clear the cookie but redirect to the login page with
    /// `?error=logout_failed` instead of confirming the logout.
    #[default]
    Strict,
    /// Clear the cookie and redirect home regardless.
    BestEffort,
}

/// Shared settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct GateSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) session_ttl_days: i64,
    pub(crate) secure_cookies: bool,
    pub(crate) login_path: String,
    pub(crate) callback_path: String,
    pub(crate) logout_path: String,
    pub(crate) login_page: String,
    pub(crate) after_login: String,
    pub(crate) after_logout: String,
    pub(crate) logout_policy: LogoutPolicy,
}

impl GateSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__session_gate".into(),
            session_ttl_days: 30,
            secure_cookies: true,
            login_path: "/auth/google".into(),
            callback_path: "/auth/google/callback".into(),
            logout_path: "/logout".into(),
            login_page: "/login".into(),
            after_login: "/profile".into(),
            after_logout: "/".into(),
            logout_policy: LogoutPolicy::Strict,
        }
    }
}

/// Configuration of the HTTP boundary.
///
/// The identity provider is a constructor parameter. Use
/// [`from_env()`](GateConfig::from_env) for the Google setup driven by
/// environment variables, or [`new()`](GateConfig::new) with `with_*` methods.
pub struct GateConfig<P = AuthClient> {
    pub(super) provider: P,
    pub(super) settings: GateSettings,
}

impl<P> GateConfig<P> {
    /// All optional fields use defaults; the cookie key is ephemeral.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            settings: GateSettings::defaults(),
        }
    }

    /// Key for the private (encrypted) cookies. Must be the same across
    /// restarts and replicas for sessions to survive them.
    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.settings.session_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Route that starts the handshake (default `/auth/google`).
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.settings.login_path = path.into();
        self
    }

    /// Path of the redirect URI registered with the provider (default
    /// `/auth/google/callback`). The handshake cookies are scoped to it.
    #[must_use]
    pub fn with_callback_path(mut self, path: impl Into<String>) -> Self {
        self.settings.callback_path = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_path(mut self, path: impl Into<String>) -> Self {
        self.settings.logout_path = path.into();
        self
    }

    /// Where denied requests and failed logins are sent (default `/login`).
    #[must_use]
    pub fn with_login_page(mut self, path: impl Into<String>) -> Self {
        self.settings.login_page = path.into();
        self
    }

    /// Where a successful login lands (default `/profile`).
    #[must_use]
    pub fn with_after_login(mut self, path: impl Into<String>) -> Self {
        self.settings.after_login = path.into();
        self
    }

    #[must_use]
    pub fn with_after_logout(mut self, path: impl Into<String>) -> Self {
        self.settings.after_logout = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_policy(mut self, policy: LogoutPolicy) -> Self {
        self.settings.logout_policy = policy;
        self
    }
}

const DEFAULT_CALLBACK_URL: &str = "http://localhost:3000/auth/google/callback";

impl GateConfig<AuthClient> {
    /// Google login configured from environment variables.
    ///
    /// # Required env vars
    /// - `GOOGLE_CLIENT_ID`
    /// - `GOOGLE_CLIENT_SECRET`
    ///
    /// # Optional env vars
    /// - `CALLBACK_URL`: absolute callback URL registered with Google
    ///   (default `http://localhost:3000/auth/google/callback`); its path
    ///   becomes the callback route
    /// - `SESSION_SECRET`: cookie key material, at least 64 bytes. When unset
    ///   an ephemeral key is generated and sessions do not survive a restart
    /// - `GOOGLE_SCOPES`: comma-separated scopes
    /// - `INSECURE_COOKIES`: `"1"` or `"true"` drops the `Secure` cookie flag
    ///   for plain-HTTP development
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if a required variable is missing or a
    /// value is invalid. Secret values never appear in the message.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let client_id = var("GOOGLE_CLIENT_ID")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AuthError::Config("GOOGLE_CLIENT_ID is required".into()))?;
        let client_secret = var("GOOGLE_CLIENT_SECRET")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AuthError::Config("GOOGLE_CLIENT_SECRET is required".into()))?;
        let callback_url: Url = var("CALLBACK_URL")
            .as_deref()
            .unwrap_or(DEFAULT_CALLBACK_URL)
            .parse()
            .map_err(|e| AuthError::Config(format!("CALLBACK_URL: {e}")))?;
        let callback_path = callback_url.path().to_owned();

        let mut provider =
            ProviderConfig::google(client_id, ClientSecret::new(client_secret), callback_url);
        if let Some(scopes) = var("GOOGLE_SCOPES") {
            provider = provider.with_scopes(
                scopes
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }

        let insecure = matches!(var("INSECURE_COOKIES").as_deref(), Some("1" | "true"));

        let cookie_key = match var("SESSION_SECRET") {
            Some(secret) => Key::try_from(secret.as_bytes()).map_err(|_| {
                AuthError::Config(
                    "SESSION_SECRET is set but too short (need at least 64 bytes)".into(),
                )
            })?,
            None => {
                tracing::warn!("SESSION_SECRET not set, using an ephemeral cookie key");
                Key::generate()
            }
        };

        Ok(Self::new(AuthClient::new(provider))
            .with_cookie_key(cookie_key)
            .with_callback_path(callback_path)
            .with_secure_cookies(!insecure))
    }
}
