//! Session resolution — credential cookie to `Session` snapshot.
//!
//! ARCHITECTURE
//! ============
//! The session cookie carries the provider's access token and its expiry.
//! The resolver decodes it, rejects expired credentials locally, then asks
//! the provider for the user behind the token. The result is a per-request
//! snapshot; nothing is cached between requests.
//!
//! FAILURE MODEL
//! =============
//! Absence is a normal result, never an error. Provider failures are retried
//! a bounded number of times when retryable, with a linear backoff of
//! `attempt * retry_base`, then resolve to `None` so the gate fails closed.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::provider::{AuthProvider, ProviderError, ProviderSession, ProviderUser};

pub const DEFAULT_COOKIE_NAME: &str = "sb-auth-token";
pub const DEFAULT_PROVIDER_RETRIES: u32 = 1;
pub const DEFAULT_PROVIDER_RETRY_BASE_MS: u64 = 50;

// =============================================================================
// SESSION
// =============================================================================

/// Snapshot of an authenticated session, owned by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: String,
    pub onboarding_completed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Session {
    #[must_use]
    pub fn from_user(user: &ProviderUser, expires_at: OffsetDateTime) -> Self {
        Self { user_id: user.id.clone(), onboarding_completed: user.onboarding_completed(), expires_at }
    }

    /// A snapshot without a user identity does not count as signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.user_id.is_empty()
    }
}

// =============================================================================
// CREDENTIAL
// =============================================================================

/// Session cookie payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(with = "time::serde::timestamp")]
    pub expires_at: OffsetDateTime,
}

impl Credential {
    #[must_use]
    pub fn from_provider_session(session: &ProviderSession) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: session.expires_at,
        }
    }

    /// Decode a cookie value. Malformed payloads and empty tokens yield `None`.
    #[must_use]
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str::<Self>(raw)
            .ok()
            .filter(|c| !c.access_token.trim().is_empty())
    }

    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Read the credential from the named cookie in `headers`.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<Self> {
        let jar = CookieJar::from_headers(headers);
        jar.get(cookie_name).map(Cookie::value).and_then(Self::decode)
    }

    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

#[derive(Clone)]
pub struct SessionResolver {
    provider: Arc<dyn AuthProvider>,
    cookie_name: String,
    retries: u32,
    retry_base: Duration,
}

impl SessionResolver {
    #[must_use]
    pub fn new(provider: Arc<dyn AuthProvider>, cookie_name: impl Into<String>, retries: u32) -> Self {
        Self {
            provider,
            cookie_name: cookie_name.into(),
            retries,
            retry_base: Duration::from_millis(DEFAULT_PROVIDER_RETRY_BASE_MS),
        }
    }

    /// Delay unit between retries; attempt `n` waits `n * retry_base`.
    #[must_use]
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn AuthProvider> {
        &self.provider
    }

    /// Resolve the session for an inbound request. Never fails: any problem
    /// resolves to `None`.
    pub async fn resolve(&self, headers: &HeaderMap) -> Option<Session> {
        self.resolve_at(headers, OffsetDateTime::now_utc()).await
    }

    /// Internal: resolve with an explicit clock (for testing).
    pub(crate) async fn resolve_at(&self, headers: &HeaderMap, now: OffsetDateTime) -> Option<Session> {
        let credential = Credential::from_headers(headers, &self.cookie_name)?;
        self.resolve_credential(&credential, now).await
    }

    /// Resolve a decoded credential against the provider.
    pub async fn resolve_credential(&self, credential: &Credential, now: OffsetDateTime) -> Option<Session> {
        if credential.is_expired_at(now) {
            debug!(expires_at = %credential.expires_at, "session credential expired");
            return None;
        }

        match self.fetch_user(&credential.access_token).await {
            Ok(Some(user)) => Some(Session::from_user(&user, credential.expires_at)).filter(Session::is_authenticated),
            Ok(None) => {
                debug!("auth provider rejected session token");
                None
            }
            Err(e) => {
                warn!(error = %e, "auth provider unavailable; treating request as signed out");
                None
            }
        }
    }

    async fn fetch_user(&self, access_token: &str) -> Result<Option<ProviderUser>, ProviderError> {
        let mut attempt: u32 = 0;
        loop {
            match self.provider.get_user(access_token).await {
                Err(e) if e.retryable() && attempt < self.retries => {
                    attempt += 1;
                    debug!(error = %e, attempt, total = self.retries, "auth provider lookup failed; retrying");
                    tokio::time::sleep(self.retry_base * attempt).await;
                }
                other => return other,
            }
        }
    }
}


#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
