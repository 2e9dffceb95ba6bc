//! "Sign in with Google" demo: a home page, a login page and a protected
//! profile page that counts visits.
//!
//! Reads `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET` and friends from the
//! environment (or a `.env` file), listens on `PORT` (default 3000).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use session_gate::MemorySessionStore;
use session_gate::middleware::{AuthState, Authenticated, GateConfig, auth_routes};
use session_gate::provider::AuthClient;
use tracing_subscriber::EnvFilter;

type DemoState = AuthState<AuthClient, MemorySessionStore>;

const PURGE_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,session_gate=debug"))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = GateConfig::from_env()?;
    let store = Arc::new(MemorySessionStore::new());

    let sweeper = Arc::clone(&store);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = sweeper.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "expired sessions purged");
            }
        }
    });

    let state = AuthState::new(config, store);
    let app = Router::new()
        .route("/", get(home))
        .route("/login", get(login_page))
        .route("/profile", get(profile))
        .merge(auth_routes(&state))
        .with_state(state);

    let port: u16 = match std::env::var("PORT") {
        Ok(port) => port.parse()?,
        Err(_) => 3000,
    };
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "demo server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn home() -> Html<&'static str> {
    Html(
        "<h1>session-gate demo</h1>\
         <p><a href=\"/login\">Log in</a> | <a href=\"/profile\">Profile</a></p>",
    )
}

async fn login_page(Query(query): Query<HashMap<String, String>>) -> Html<String> {
    let notice = query
        .get("error")
        .map(|code| format!("<p class=\"error\">Login failed: {}</p>", escape(code)))
        .unwrap_or_default();
    Html(format!(
        "<h1>Log in</h1>{notice}<p><a href=\"/auth/google\">Sign in with Google</a></p>"
    ))
}

async fn profile(State(state): State<DemoState>, user: Authenticated) -> Html<String> {
    let views = match state.flow().record_visit(&user.token).await {
        Ok(views) => views.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "could not record visit");
            "?".to_string()
        }
    };
    let principal = &user.principal;
    Html(format!(
        "<h1>Hello, {name}</h1>\
         <p>Email: {email}</p>\
         <p>Visits this session: {views}</p>\
         <p><a href=\"/logout\">Log out</a></p>",
        name = escape(principal.display_name()),
        email = escape(principal.primary_email()),
    ))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
