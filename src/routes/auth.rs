//! Auth routes — password sign-in, sign-out, session snapshot, onboarding
//! completion.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::gate::{DASHBOARD_PATH, Disposition};
use crate::provider::{ONBOARDING_COMPLETED_KEY, ProviderError};
use crate::session::{Credential, Session};
use crate::state::AppState;

fn session_cookie(name: &str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_owned(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

pub(crate) fn provider_error_to_status(err: &ProviderError) -> StatusCode {
    match err {
        ProviderError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Where a freshly resolved session should land: the dashboard, unless the
/// gate sends it elsewhere first.
fn landing_path(state: &AppState, session: &Session) -> &'static str {
    match state.routes.decide(DASHBOARD_PATH, Some(session)).disposition {
        Disposition::Allow => DASHBOARD_PATH,
        Disposition::Redirect(target) => target.path(),
    }
}

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Session resolved from the request cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthSession {
    pub session: Session,
    pub credential: Credential,
}

impl<S> axum::extract::FromRequestParts<S> for AuthSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let credential = Credential::from_headers(&parts.headers, app_state.resolver.cookie_name())
            .ok_or(StatusCode::UNAUTHORIZED)?;
        let session = app_state
            .resolver
            .resolve_credential(&credential, OffsetDateTime::now_utc())
            .await
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { session, credential })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedirectBody {
    pub redirect: String,
}

/// `POST /api/auth/login` — password sign-in, set the session cookie.
pub async fn login(State(state): State<AppState>, jar: CookieJar, Json(body): Json<LoginRequest>) -> Response {
    let provider_session = match state
        .provider()
        .sign_in_with_password(body.email.trim(), &body.password)
        .await
    {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "password sign-in failed");
            return (provider_error_to_status(&e), e.to_string()).into_response();
        }
    };

    let session = Session::from_user(&provider_session.user, provider_session.expires_at);
    let credential = Credential::from_provider_session(&provider_session);
    let value = match credential.encode() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "session cookie encoding failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session").into_response();
        }
    };
    let cookie = session_cookie(state.resolver.cookie_name(), value, state.cookie_secure);

    tracing::info!(user_id = %session.user_id, "user signed in");
    let redirect = landing_path(&state, &session).to_owned();
    (jar.add(cookie), Json(RedirectBody { redirect })).into_response()
}

/// `POST /api/auth/logout` — revoke the provider session, clear the cookie.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let cookie_name = state.resolver.cookie_name();
    if let Some(credential) = jar.get(cookie_name).map(Cookie::value).and_then(Credential::decode) {
        if let Err(e) = state.provider().sign_out(&credential.access_token).await {
            tracing::warn!(error = %e, "provider sign-out failed; clearing cookie anyway");
        }
    }

    let cookie = Cookie::build((cookie_name.to_owned(), ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.cookie_secure)
        .max_age(time::Duration::ZERO);

    (jar.add(cookie), StatusCode::NO_CONTENT)
}

/// `GET /api/auth/session` — current session snapshot.
pub async fn session(auth: AuthSession) -> Json<Session> {
    Json(auth.session)
}

/// `POST /api/onboarding/complete` — mark onboarding done for the caller.
pub async fn complete_onboarding(State(state): State<AppState>, auth: AuthSession) -> Response {
    let mut patch = Map::new();
    patch.insert(ONBOARDING_COMPLETED_KEY.into(), Value::Bool(true));

    let user = match state
        .provider()
        .update_user_metadata(&auth.credential.access_token, patch)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::error!(error = %e, user_id = %auth.session.user_id, "onboarding metadata update failed");
            return (provider_error_to_status(&e), "Failed to complete onboarding").into_response();
        }
    };

    let session = Session::from_user(&user, auth.session.expires_at);
    tracing::info!(user_id = %session.user_id, completed = session.onboarding_completed, "onboarding completed");
    Json(RedirectBody { redirect: landing_path(&state, &session).to_owned() }).into_response()
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
