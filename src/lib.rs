#![doc = include_str!("../README.md")]

pub mod codec;
pub mod error;
pub mod flow;
pub mod gate;
#[cfg(feature = "axum")]
pub mod middleware;
pub mod pkce;
pub mod principal;
pub mod profile;
pub mod provider;
pub mod session;
pub mod types;

// Re-exports for convenient access
pub use codec::{StoredPrincipal, decode, encode};
pub use error::AuthError;
pub use flow::{LoginFlow, VIEWS_KEY};
pub use gate::{AccessGate, Decision, DenyReason};
pub use principal::{Principal, resolve};
pub use profile::{GoogleUserInfo, ProfileEmail, ProviderProfile};
pub use provider::{
    AuthClient, AuthorizationRequest, CallbackParams, IdentityProvider, PendingHandshake,
    ProviderConfig, TokenResponse,
};
pub use session::{MemorySessionStore, Payload, Session, SessionStore};
pub use types::{ClientSecret, ExternalId, SessionToken};
