//! Gate configuration parsed from environment variables.

use crate::gate::{DEFAULT_PUBLIC_PATHS, RouteTable};
use crate::provider::ProviderTimeouts;
use crate::provider::hosted::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::session::{DEFAULT_COOKIE_NAME, DEFAULT_PROVIDER_RETRIES, DEFAULT_PROVIDER_RETRY_BASE_MS};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SITE_DIR: &str = "site";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub provider_url: String,
    pub provider_anon_key: String,
    pub port: u16,
    pub site_dir: String,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub routes: RouteTable,
    pub provider_retries: u32,
    pub provider_retry_base_ms: u64,
    pub provider_timeouts: ProviderTimeouts,
}

impl GateConfig {
    /// Build config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup.
    ///
    /// Required:
    /// - `AUTH_PROVIDER_URL`
    /// - `AUTH_PROVIDER_ANON_KEY`
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `SITE_DIR`: default `site`
    /// - `SESSION_COOKIE_NAME`: default `sb-auth-token`
    /// - `COOKIE_SECURE`: inferred from an `https://` provider URL when absent
    /// - `GATE_PUBLIC_PATHS`: comma separated, default `/,/login,/signup`
    /// - `AUTH_PROVIDER_RETRIES`: default 1
    /// - `AUTH_PROVIDER_RETRY_BASE_MS`: linear backoff unit, default 50
    /// - `AUTH_PROVIDER_REQUEST_TIMEOUT_SECS`: default 10
    /// - `AUTH_PROVIDER_CONNECT_TIMEOUT_SECS`: default 5
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails to parse.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider_url = required(&lookup, "AUTH_PROVIDER_URL")?
            .trim_end_matches('/')
            .to_owned();
        let provider_anon_key = required(&lookup, "AUTH_PROVIDER_ANON_KEY")?;

        let cookie_secure = match lookup("COOKIE_SECURE") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { var: "COOKIE_SECURE", value: raw })?,
            None => provider_url.starts_with("https://"),
        };

        let routes = match lookup("GATE_PUBLIC_PATHS") {
            Some(raw) => RouteTable::new(parse_paths(&raw)),
            None => RouteTable::new(DEFAULT_PUBLIC_PATHS),
        };

        Ok(Self {
            provider_url,
            provider_anon_key,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            site_dir: lookup("SITE_DIR").unwrap_or_else(|| DEFAULT_SITE_DIR.to_owned()),
            cookie_name: lookup("SESSION_COOKIE_NAME").unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_owned()),
            cookie_secure,
            routes,
            provider_retries: parse_or(&lookup, "AUTH_PROVIDER_RETRIES", DEFAULT_PROVIDER_RETRIES)?,
            provider_retry_base_ms: parse_or(&lookup, "AUTH_PROVIDER_RETRY_BASE_MS", DEFAULT_PROVIDER_RETRY_BASE_MS)?,
            provider_timeouts: ProviderTimeouts {
                request_secs: parse_or(&lookup, "AUTH_PROVIDER_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
                connect_secs: parse_or(&lookup, "AUTH_PROVIDER_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
            },
        })
    }
}

fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(var))
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        None => Ok(default),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_paths(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
