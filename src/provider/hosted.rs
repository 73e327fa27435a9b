//! Hosted auth REST client.
//!
//! Speaks the provider's `/auth/v1` API. Every call carries the project
//! `apikey` header; user-scoped calls add `Authorization: Bearer <token>`.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use time::OffsetDateTime;

use super::{AuthProvider, ProviderError, ProviderSession, ProviderUser};

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for ProviderTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

pub struct HostedAuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: ProviderUser,
}

impl TokenResponse {
    fn into_session(self, now: OffsetDateTime) -> Result<ProviderSession, ProviderError> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => OffsetDateTime::from_unix_timestamp(at).map_err(|e| ProviderError::Parse(e.to_string()))?,
            (None, Some(secs)) => now + time::Duration::seconds(secs),
            (None, None) => return Err(ProviderError::Parse("token response carries no expiry".into())),
        };
        Ok(ProviderSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        })
    }
}

impl HostedAuthClient {
    /// # Errors
    ///
    /// Returns [`ProviderError::HttpClientBuild`] if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, anon_key: String, timeouts: ProviderTimeouts) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ProviderError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned(), anon_key })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1{path}", self.base_url)
    }

    async fn read_body(response: reqwest::Response) -> Result<(StatusCode, String), ProviderError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        Ok((status, text))
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, ProviderError> {
    serde_json::from_str(text).map_err(|e| ProviderError::Parse(e.to_string()))
}

#[async_trait::async_trait]
impl AuthProvider for HostedAuthClient {
    async fn get_user(&self, access_token: &str) -> Result<Option<ProviderUser>, ProviderError> {
        let response = self
            .http
            .get(self.url("/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let (status, text) = Self::read_body(response).await?;
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            s if s.is_success() => parse_json(&text).map(Some),
            s => Err(ProviderError::Status { status: s.as_u16(), body: text }),
        }
    }

    async fn update_user_metadata(
        &self,
        access_token: &str,
        patch: Map<String, Value>,
    ) -> Result<ProviderUser, ProviderError> {
        let response = self
            .http
            .put(self.url("/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "data": patch }))
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let (status, text) = Self::read_body(response).await?;
        if !status.is_success() {
            return Err(ProviderError::Status { status: status.as_u16(), body: text });
        }
        parse_json(&text)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<ProviderSession, ProviderError> {
        let response = self
            .http
            .post(self.url("/token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let (status, text) = Self::read_body(response).await?;
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Err(ProviderError::InvalidCredentials),
            s if s.is_success() => parse_json::<TokenResponse>(&text)?.into_session(OffsetDateTime::now_utc()),
            s => Err(ProviderError::Status { status: s.as_u16(), body: text }),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        let response = self
            .http
            .post(self.url("/logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let (status, text) = Self::read_body(response).await?;
        // An already-revoked token is as good as a successful sign-out.
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(ProviderError::Status { status: status.as_u16(), body: text })
        }
    }
}

#[cfg(test)]
#[path = "hosted_test.rs"]
mod tests;
