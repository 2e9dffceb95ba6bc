//! Login lifecycle against a scripted identity provider and the in-memory
//! store: anonymous visitor, handshake, gated requests, visit counter, logout.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use session_gate::codec::{self, PRINCIPAL_KEY};
use session_gate::{
    AuthError, AuthorizationRequest, CallbackParams, Decision, DenyReason, IdentityProvider,
    LoginFlow, MemorySessionStore, PendingHandshake, ProviderProfile, SessionStore, VIEWS_KEY,
};

const STATE: &str = "state-123";

/// Hands out the profile for the grant `"good"` and rejects anything else,
/// the way a provider answers an expired or forged code.
struct ScriptedProvider {
    profile: ProviderProfile,
    scopes: Vec<String>,
    exchanges: AtomicUsize,
}

impl ScriptedProvider {
    fn new(profile: ProviderProfile) -> Self {
        Self {
            profile,
            scopes: vec!["profile".into(), "email".into()],
            exchanges: AtomicUsize::new(0),
        }
    }
}

impl IdentityProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_scopes(&self) -> &[String] {
        &self.scopes
    }

    fn begin_handshake(&self, scopes: &[String]) -> AuthorizationRequest {
        AuthorizationRequest::new(
            format!("https://idp.test/authorize?scope={}", scopes.join("+")),
            STATE,
            "verifier",
        )
    }

    async fn complete_handshake(
        &self,
        params: &CallbackParams,
        pending: &PendingHandshake,
    ) -> Result<ProviderProfile, AuthError> {
        let code = params.grant(pending)?;
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if code == "good" {
            Ok(self.profile.clone())
        } else {
            Err(AuthError::ProviderRejected {
                operation: "token exchange",
                status: Some(400),
                detail: "invalid_grant".into(),
            })
        }
    }
}

fn ada() -> ProviderProfile {
    ProviderProfile::new("scripted", "g123")
        .with_display_name("Ada")
        .with_email("ada@x.com", true)
}

fn setup(profile: ProviderProfile) -> LoginFlow<ScriptedProvider, MemorySessionStore> {
    LoginFlow::new(
        Arc::new(ScriptedProvider::new(profile)),
        Arc::new(MemorySessionStore::new()),
    )
}

fn callback(code: &str) -> CallbackParams {
    CallbackParams {
        code: Some(code.into()),
        state: Some(STATE.into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn anonymous_visitor_is_denied() {
    let flow = setup(ada());
    assert_eq!(
        flow.authorize(None).await,
        Decision::Deny(DenyReason::MissingToken)
    );
}

#[tokio::test]
async fn successful_handshake_opens_an_authenticated_session() {
    let flow = setup(ada());
    let request = flow.begin();
    assert!(request.url.contains("scope=profile+email"));

    let (token, principal) = flow
        .complete(&callback("good"), Some(&request.pending()), None)
        .await
        .unwrap();
    assert_eq!(principal.id().as_str(), "g123");
    assert_eq!(principal.display_name(), "Ada");
    assert_eq!(principal.emails(), ["ada@x.com"]);

    // Stored form decodes back to the same principal.
    let session = flow.store().load(&token).await.unwrap().unwrap();
    let stored = session.payload.get(PRINCIPAL_KEY).unwrap();
    assert_eq!(codec::decode_value(stored).unwrap(), principal);

    match flow.authorize(Some(&token)).await {
        Decision::Allow(allowed) => assert_eq!(allowed, principal),
        other => panic!("expected Allow, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_grant_creates_no_session() {
    let flow = setup(ada());
    let request = flow.begin();

    let err = flow
        .complete(&callback("expired"), Some(&request.pending()), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::ProviderRejected { .. }));
    assert_eq!(err.login_error_code(), "provider_rejected");
    assert!(flow.store().is_empty());
}

#[tokio::test]
async fn forged_state_never_reaches_the_provider() {
    let flow = setup(ada());
    let request = flow.begin();
    let params = CallbackParams {
        code: Some("good".into()),
        state: Some("someone-else".into()),
        ..Default::default()
    };

    let err = flow
        .complete(&params, Some(&request.pending()), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::InvalidGrant(_)));
    assert_eq!(flow.provider().exchanges.load(Ordering::SeqCst), 0);
    assert!(flow.store().is_empty());
}

#[tokio::test]
async fn profile_without_verified_email_is_refused() {
    let flow = setup(ProviderProfile::new("scripted", "g123").with_email("ada@x.com", false));
    let request = flow.begin();

    let err = flow
        .complete(&callback("good"), Some(&request.pending()), None)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::IncompleteProfile(_)));
    assert!(flow.store().is_empty());
}

#[tokio::test]
async fn visit_counter_starts_at_one() {
    let flow = setup(ada());
    let request = flow.begin();
    let (token, _) = flow
        .complete(&callback("good"), Some(&request.pending()), None)
        .await
        .unwrap();

    let session = flow.store().load(&token).await.unwrap().unwrap();
    assert!(session.payload.get(VIEWS_KEY).is_none());

    assert_eq!(flow.record_visit(&token).await.unwrap(), 1);
    assert_eq!(flow.record_visit(&token).await.unwrap(), 2);

    let session = flow.store().load(&token).await.unwrap().unwrap();
    assert_eq!(session.get::<u64>(VIEWS_KEY), Some(2));
    assert!(flow.authorize(Some(&token)).await.is_allowed());
}

#[tokio::test]
async fn logout_denies_the_next_request() {
    let flow = setup(ada());
    let request = flow.begin();
    let (token, _) = flow
        .complete(&callback("good"), Some(&request.pending()), None)
        .await
        .unwrap();
    assert!(flow.authorize(Some(&token)).await.is_allowed());

    flow.logout(&token).await.unwrap();

    assert_eq!(
        flow.authorize(Some(&token)).await,
        Decision::Deny(DenyReason::UnknownToken)
    );
    assert!(matches!(
        flow.record_visit(&token).await,
        Err(AuthError::UnknownToken)
    ));
    // Logging out twice is harmless.
    flow.logout(&token).await.unwrap();
}

#[tokio::test]
async fn second_login_rotates_the_token() {
    let flow = setup(ada());

    let first = flow.begin();
    let (old, _) = flow
        .complete(&callback("good"), Some(&first.pending()), None)
        .await
        .unwrap();

    let second = flow.begin();
    let (new, _) = flow
        .complete(&callback("good"), Some(&second.pending()), Some(&old))
        .await
        .unwrap();

    assert_ne!(old, new);
    assert!(!flow.authorize(Some(&old)).await.is_allowed());
    assert!(flow.authorize(Some(&new)).await.is_allowed());
    assert_eq!(flow.store().len(), 1);
}

#[tokio::test]
async fn session_without_principal_is_anonymous() {
    let flow = setup(ada());
    let session = flow.store().create().await.unwrap();

    assert_eq!(
        flow.authorize(Some(&session.token)).await,
        Decision::Deny(DenyReason::Anonymous)
    );
}

#[tokio::test]
async fn tampered_principal_is_invalidated() {
    let flow = setup(ada());
    let request = flow.begin();
    let (token, _) = flow
        .complete(&callback("good"), Some(&request.pending()), None)
        .await
        .unwrap();

    flow.store()
        .mutate(&token, |payload| {
            payload.insert(PRINCIPAL_KEY.into(), serde_json::json!({"id": "g123"}));
        })
        .await
        .unwrap();

    assert_eq!(
        flow.authorize(Some(&token)).await,
        Decision::Deny(DenyReason::CorruptSession)
    );
    assert!(flow.store().load(&token).await.unwrap().is_none());
}
