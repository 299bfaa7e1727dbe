//! Widget configuration: endpoint and send policy, validated from raw strings.
//!
//! The binary collects the raw values from flags or the environment variables
//! named here.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use url::Url;

use crate::panel::SendPolicy;

pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8080";
pub const DEFAULT_SEND_POLICY: &str = "drop";

pub const ENDPOINT_ENV: &str = "CHAT_WS_URL";
pub const SEND_POLICY_ENV: &str = "CHAT_SEND_POLICY";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid endpoint '{raw}': {reason}")]
    InvalidEndpoint { raw: String, reason: String },
    #[error("unsupported endpoint scheme '{0}' (expected 'ws' or 'wss')")]
    UnsupportedScheme(String),
    #[error("unknown send policy '{0}' (expected 'drop' or 'reject')")]
    InvalidSendPolicy(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    pub endpoint: Url,
    pub send_policy: SendPolicy,
}

impl WidgetConfig {
    /// Build config from raw strings, as given on the command line.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the endpoint is not a `ws`/`wss` URL or
    /// the policy name is unknown.
    pub fn new(endpoint: &str, send_policy: &str) -> Result<Self, ConfigError> {
        Ok(Self { endpoint: parse_endpoint(endpoint)?, send_policy: parse_send_policy(send_policy)? })
    }
}

/// Parse a WebSocket endpoint, accepting only `ws` and `wss`.
///
/// # Errors
///
/// [`ConfigError::InvalidEndpoint`] for unparseable input,
/// [`ConfigError::UnsupportedScheme`] for any other scheme.
pub fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEndpoint { raw: raw.to_owned(), reason: e.to_string() })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_owned())),
    }
}

/// Parse a send policy name.
///
/// # Errors
///
/// [`ConfigError::InvalidSendPolicy`] for anything but `drop`/`reject`.
pub fn parse_send_policy(raw: &str) -> Result<SendPolicy, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "drop" => Ok(SendPolicy::Drop),
        "reject" => Ok(SendPolicy::Reject),
        _ => Err(ConfigError::InvalidSendPolicy(raw.to_owned())),
    }
}
