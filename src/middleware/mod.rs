//! Delegated login for axum applications.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use session_gate::MemorySessionStore;
//! use session_gate::middleware::{AuthState, Authenticated, GateConfig, auth_routes};
//!
//! // 1. Configure Google login from the environment
//! let config = GateConfig::from_env()?;
//! let state = AuthState::new(config, Arc::new(MemorySessionStore::new()));
//!
//! // 2. Mount the auth routes next to the protected ones
//! let app = axum::Router::new()
//!     .route("/profile", get(profile))
//!     .merge(auth_routes(&state))
//!     .with_state(state);
//!
//! // 3. Take `Authenticated` in every protected handler
//! async fn profile(user: Authenticated) -> String {
//!     format!("Hello, {}", user.principal.display_name())
//! }
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod routes;
mod state;

pub use config::{GateConfig, LogoutPolicy};
pub use error::LoginRequired;
pub use extractor::Authenticated;
pub use routes::auth_routes;
pub use state::AuthState;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
