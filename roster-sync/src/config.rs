//! Client configuration.
//!
//! Only the two endpoint locations come from the environment
//! (`ROSTER_API_URL`, `ROSTER_WS_URL`); everything else is set in code.

use std::time::Duration;

use crate::model::UserId;

pub const API_URL_VAR: &str = "ROSTER_API_URL";
pub const WS_URL_VAR: &str = "ROSTER_WS_URL";

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws/users";

/// Backoff schedule used when the push channel has to be reopened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Give up after this many failed attempts (None = never)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt number `attempt` (0-based), doubling each time.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base address; the collection lives at `{api_url}/users/`
    pub api_url: String,
    /// Push channel address
    pub ws_url: String,
    /// Timeout for a single REST request
    pub request_timeout: Duration,
    /// Backoff used by `RosterClient::reconnect`
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ws_url: ws_url.into(),
            ..Self::default()
        }
    }

    /// Read the endpoint locations from the environment, falling back to
    /// the localhost defaults for any variable that is unset or blank.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Self::new(
            read(API_URL_VAR, DEFAULT_API_URL),
            read(WS_URL_VAR, DEFAULT_WS_URL),
        )
    }

    /// `GET`/`POST` target.
    pub fn collection_url(&self) -> String {
        format!("{}/users/", self.api_url.trim_end_matches('/'))
    }

    /// `PUT`/`DELETE` target.
    pub fn user_url(&self, id: UserId) -> String {
        format!("{}/users/{id}", self.api_url.trim_end_matches('/'))
    }
}
