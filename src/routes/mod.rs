//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! API routes handle their own authentication and answer unknown paths with
//! 404. Every other path is a portal page: the gate middleware decides whether
//! it is served or redirected, and allowed requests fall through to the static
//! site.

pub mod auth;
pub mod middleware;

use std::path::Path;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the API routes, `pages`, and the gate in front of them.
pub fn app(state: AppState, pages: Router) -> Router {
    Router::new()
        .nest("/api", api())
        .route("/healthz", get(healthz))
        .with_state(state.clone())
        .merge(pages)
        .layer(axum::middleware::from_fn_with_state(state, middleware::gate_middleware))
        .layer(TraceLayer::new_for_http())
}

fn api() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/session", get(auth::session))
        .route("/onboarding/complete", post(auth::complete_onboarding))
        .fallback(api_not_found)
}

/// Static portal build. Unknown paths get the app shell so client-side
/// routing can take over.
pub fn site(site_dir: impl AsRef<Path>) -> Router {
    let dir = site_dir.as_ref();
    let serve = ServeDir::new(dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(dir.join("index.html")));
    Router::new().fallback_service(serve)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// Keeps unknown API paths away from the site's index.html fallback.
async fn api_not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
