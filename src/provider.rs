use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::AuthError;
use crate::pkce::{self, PkcePair};
use crate::profile::{GoogleUserInfo, ProviderProfile};
use crate::types::ClientSecret;

/// Identity provider that drives the delegated-login handshake.
///
/// Implemented by [`AuthClient`] for real providers; tests substitute a
/// scripted implementation.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Provider name as recorded on the principal (e.g. `"google"`).
    fn name(&self) -> &str;

    /// Scopes requested when the caller does not ask for specific ones.
    fn default_scopes(&self) -> &[String];

    /// Build the authorization redirect. The returned `state` and
    /// `code_verifier` must be kept by the caller until the callback.
    fn begin_handshake(&self, scopes: &[String]) -> AuthorizationRequest;

    /// Exchange the callback grant for a profile.
    ///
    /// Holds no session state; may block on the network for the configured
    /// timeout, at most twice.
    fn complete_handshake(
        &self,
        params: &CallbackParams,
        pending: &PendingHandshake,
    ) -> impl Future<Output = Result<ProviderProfile, AuthError>> + Send;
}

/// Authorization URL plus the values to remember until the callback.
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

impl AuthorizationRequest {
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        state: impl Into<String>,
        code_verifier: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            state: state.into(),
            code_verifier: code_verifier.into(),
        }
    }

    #[must_use]
    pub fn pending(&self) -> PendingHandshake {
        PendingHandshake {
            state: self.state.clone(),
            code_verifier: self.code_verifier.clone(),
        }
    }
}

/// What the client kept from [`IdentityProvider::begin_handshake`].
#[derive(Clone)]
pub struct PendingHandshake {
    pub state: String,
    pub code_verifier: String,
}

/// Query parameters of the provider's redirect back to us.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Checks the callback against the pending handshake and returns the grant.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ProviderRejected`] if the provider redirected with `error`
    /// - [`AuthError::InvalidGrant`] if the code is missing or the `state`
    ///   does not match
    pub fn grant(&self, pending: &PendingHandshake) -> Result<&str, AuthError> {
        if let Some(error) = &self.error {
            return Err(AuthError::ProviderRejected {
                operation: "authorization",
                status: None,
                detail: match &self.error_description {
                    Some(desc) => format!("{error}: {desc}"),
                    None => error.clone(),
                },
            });
        }

        let code = self
            .code
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AuthError::InvalidGrant("missing code".into()))?;

        match self.state.as_deref() {
            Some(state) if state == pending.state => Ok(code),
            Some(_) => Err(AuthError::InvalidGrant("state mismatch".into())),
            None => Err(AuthError::InvalidGrant("missing state".into())),
        }
    }
}

/// OAuth2 client configuration.
///
/// Required fields are constructor parameters; everything else has a default
/// and a `with_*` override. `Debug` never prints the client secret.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ProviderConfig {
    pub(crate) provider: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: ClientSecret,
    pub(crate) redirect_uri: Url,
    pub(crate) auth_url: Url,
    pub(crate) token_url: Url,
    pub(crate) userinfo_url: Url,
    pub(crate) scopes: Vec<String>,
    pub(crate) timeout: Duration,
    pub(crate) retry_backoff: Duration,
}

impl ProviderConfig {
    /// Google OAuth2 / OpenID Connect endpoints.
    #[must_use]
    pub fn google(
        client_id: impl Into<String>,
        client_secret: ClientSecret,
        redirect_uri: Url,
    ) -> Self {
        Self {
            provider: "google".into(),
            client_id: client_id.into(),
            client_secret,
            redirect_uri,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth"
                .parse()
                .expect("valid default URL"),
            token_url: "https://oauth2.googleapis.com/token"
                .parse()
                .expect("valid default URL"),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo"
                .parse()
                .expect("valid default URL"),
            scopes: vec!["openid".into(), "profile".into(), "email".into()],
            timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(250),
        }
    }

    #[must_use]
    pub fn with_auth_url(mut self, url: Url) -> Self {
        self.auth_url = url;
        self
    }

    #[must_use]
    pub fn with_token_url(mut self, url: Url) -> Self {
        self.token_url = url;
        self
    }

    #[must_use]
    pub fn with_userinfo_url(mut self, url: Url) -> Self {
        self.userinfo_url = url;
        self
    }

    /// Override the default scopes (`openid profile email`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Per-request timeout for token and userinfo calls.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pause before the single retry of an unavailable provider.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    #[must_use]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    #[must_use]
    pub fn userinfo_url(&self) -> &Url {
        &self.userinfo_url
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// Token response from the provider's token endpoint.
///
/// Deliberately not `Debug`: it carries bearer credentials.
#[derive(Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// OAuth2 authorization-code client (with PKCE) for an OpenID provider.
pub struct AuthClient {
    config: ProviderConfig,
    http: reqwest::Client,
}

impl AuthClient {
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Authorization URL with fresh `state` and PKCE values.
    #[must_use]
    pub fn authorization_url(&self, scopes: &[String]) -> AuthorizationRequest {
        let state = pkce::generate_state();
        let pkce = PkcePair::generate();

        let mut requested: Vec<&str> = Vec::new();
        for scope in scopes.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            if !requested.contains(&scope) {
                requested.push(scope);
            }
        }

        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &requested.join(" "))
            .append_pair("state", &state)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "S256");

        AuthorizationRequest {
            url: url.into(),
            state,
            code_verifier: pkce.verifier,
        }
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// [`AuthError::ProviderRejected`] for a 4xx answer or an unreadable body,
    /// [`AuthError::ProviderUnavailable`] when the retry also fails on the
    /// network or with a 5xx.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, AuthError> {
        const OPERATION: &str = "token exchange";
        let params = &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose()),
            ("code_verifier", code_verifier),
        ];

        self.with_retry(OPERATION, || async move {
            let response = self
                .http
                .post(self.config.token_url.clone())
                .timeout(self.config.timeout)
                .form(params)
                .send()
                .await
                .map_err(|e| transport_error(OPERATION, &e))?;
            let response = ensure_success(response, OPERATION).await?;
            response
                .json::<TokenResponse>()
                .await
                .map_err(|e| transport_error(OPERATION, &e))
        })
        .await
    }

    /// Fetch the userinfo document with an access token.
    ///
    /// # Errors
    ///
    /// Same classification as [`exchange_code`](Self::exchange_code).
    pub async fn get_user_info(&self, access_token: &str) -> Result<GoogleUserInfo, AuthError> {
        const OPERATION: &str = "userinfo request";

        self.with_retry(OPERATION, || async move {
            let response = self
                .http
                .get(self.config.userinfo_url.clone())
                .timeout(self.config.timeout)
                .bearer_auth(access_token)
                .send()
                .await
                .map_err(|e| transport_error(OPERATION, &e))?;
            let response = ensure_success(response, OPERATION).await?;
            response
                .json::<GoogleUserInfo>()
                .await
                .map_err(|e| transport_error(OPERATION, &e))
        })
        .await
    }

    /// Runs `attempt`, and once more after the backoff if it failed with a
    /// retryable error.
    async fn with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        attempt: F,
    ) -> Result<T, AuthError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AuthError>>,
    {
        match attempt().await {
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    operation,
                    error = %e,
                    "identity provider unavailable, retrying once"
                );
                tokio::time::sleep(self.config.retry_backoff).await;
                attempt().await
            }
            other => other,
        }
    }
}

impl IdentityProvider for AuthClient {
    fn name(&self) -> &str {
        &self.config.provider
    }

    fn default_scopes(&self) -> &[String] {
        &self.config.scopes
    }

    fn begin_handshake(&self, scopes: &[String]) -> AuthorizationRequest {
        self.authorization_url(scopes)
    }

    async fn complete_handshake(
        &self,
        params: &CallbackParams,
        pending: &PendingHandshake,
    ) -> Result<ProviderProfile, AuthError> {
        let code = params.grant(pending)?;
        let tokens = self.exchange_code(code, &pending.code_verifier).await?;
        let info = self.get_user_info(&tokens.access_token).await?;

        let mut profile = ProviderProfile::from(info);
        profile.provider.clone_from(&self.config.provider);
        Ok(profile)
    }
}

/// Returns the response on 2xx, otherwise a classified error.
async fn ensure_success(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, AuthError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(operation, status, &body))
}

const MAX_DETAIL: usize = 256;

/// 5xx and 429 are the provider's problem and worth one retry; any other
/// non-success status is a refusal.
fn classify_status(operation: &'static str, status: u16, body: &str) -> AuthError {
    let detail: String = body.chars().take(MAX_DETAIL).collect();
    if status >= 500 || status == 429 {
        AuthError::ProviderUnavailable {
            operation,
            detail: format!("HTTP {status}: {detail}"),
        }
    } else {
        AuthError::ProviderRejected {
            operation,
            status: Some(status),
            detail,
        }
    }
}

/// A body we cannot decode is a refusal; anything else reqwest reports is a
/// transport failure.
fn transport_error(operation: &'static str, e: &reqwest::Error) -> AuthError {
    if e.is_decode() {
        AuthError::ProviderRejected {
            operation,
            status: e.status().map(|s| s.as_u16()),
            detail: e.to_string(),
        }
    } else {
        AuthError::ProviderUnavailable {
            operation,
            detail: e.to_string(),
        }
    }
}
