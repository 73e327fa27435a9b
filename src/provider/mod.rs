//! Auth provider — the hosted identity service that owns sessions and user
//! metadata.
//!
//! DESIGN
//! ======
//! The rest of the crate talks to the provider only through the
//! `AuthProvider` trait, so the gate middleware and handlers can be driven by
//! an in-memory mock in tests. `HostedAuthClient` is the production
//! implementation over the provider's REST auth API.

pub mod hosted;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

pub use hosted::{HostedAuthClient, ProviderTimeouts};

/// User metadata key holding the onboarding flag.
pub const ONBOARDING_COMPLETED_KEY: &str = "onboarding_completed";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The HTTP request never produced a response.
    #[error("auth provider request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success status.
    #[error("auth provider returned status {status}")]
    Status { status: u16, body: String },

    /// The provider response body could not be deserialized.
    #[error("auth provider response parse failed: {0}")]
    Parse(String),

    /// Email/password sign-in was rejected.
    #[error("invalid login credentials")]
    InvalidCredentials,

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ProviderError {
    /// Whether repeating the same call may succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// MODELS
// =============================================================================

/// User record as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl ProviderUser {
    /// Only a JSON `true` counts as completed; missing or malformed values
    /// read as not completed.
    #[must_use]
    pub fn onboarding_completed(&self) -> bool {
        matches!(self.user_metadata.get(ONBOARDING_COMPLETED_KEY), Some(Value::Bool(true)))
    }
}

/// Tokens issued by a successful sign-in.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: OffsetDateTime,
    pub user: ProviderUser,
}

// =============================================================================
// TRAIT
// =============================================================================

/// Provider-neutral async interface to the auth service. Enables mocking in tests.
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    /// Look up the user behind an access token.
    ///
    /// # Errors
    ///
    /// Returns `Ok(None)` when the provider rejects the token; transport,
    /// status, and parse failures are errors.
    async fn get_user(&self, access_token: &str) -> Result<Option<ProviderUser>, ProviderError>;

    /// Merge `patch` into the user's metadata and return the updated user.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the request fails or is rejected.
    async fn update_user_metadata(
        &self,
        access_token: &str,
        patch: Map<String, Value>,
    ) -> Result<ProviderUser, ProviderError>;

    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidCredentials`] when the provider
    /// rejects the email/password pair.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<ProviderSession, ProviderError>;

    /// Revoke the session behind an access token.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the request fails.
    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
