//! Gate middleware — resolve the session, evaluate the route gate, then pass
//! the request through or redirect.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::debug;

use crate::gate::Disposition;
use crate::state::AppState;

/// Path prefixes the gate never sees: API handlers authenticate themselves,
/// and static assets and the health check are public.
pub const BYPASS_PREFIXES: [&str; 4] = ["/api", "/assets", "/favicon.ico", "/healthz"];

/// A prefix matches the exact path or the path followed by `/`.
#[must_use]
pub fn is_bypassed(path: &str) -> bool {
    BYPASS_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// The path the gate classifies. Trailing slashes are dropped so directory
/// URLs like `/onboarding/` land in the same category as `/onboarding`.
#[must_use]
pub fn gate_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

pub async fn gate_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    if is_bypassed(&path) {
        return next.run(request).await;
    }

    // Request bodies are not Sync; resolve from an owned copy of the headers.
    let headers = request.headers().clone();
    let session = state.resolver.resolve(&headers).await;
    let decision = state.routes.decide(gate_path(&path), session.as_ref());

    match decision.disposition {
        Disposition::Allow => {
            debug!(%path, rule = decision.rule, "gate allow");
            next.run(request).await
        }
        Disposition::Redirect(target) => {
            debug!(%path, rule = decision.rule, target = target.path(), "gate redirect");
            Redirect::temporary(target.path()).into_response()
        }
    }
}
