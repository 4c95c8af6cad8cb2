//! Client configuration.
//!
//! All durations are carried in milliseconds so that the struct maps one
//! to one onto a config file when the `serde` feature is enabled.

use std::fmt;
use std::time::Duration;

use crate::backoff::Backoff;
use crate::error::ConfigError;
use crate::ratelimit::RateLimitPolicy;

/// Default WebSocket endpoint.
pub const DEFAULT_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

/// Capabilities requested during the handshake unless overridden.
pub const DEFAULT_CAPABILITIES: [&str; 3] = [
    "twitch.tv/tags",
    "twitch.tv/commands",
    "twitch.tv/membership",
];

/// Login name and OAuth token.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }

    /// The token as sent in `PASS`, with its `oauth:` prefix.
    pub fn pass(&self) -> String {
        if self.token.starts_with("oauth:") {
            self.token.clone()
        } else {
            format!("oauth:{}", self.token)
        }
    }

    /// Login name, lowercased.
    pub fn login(&self) -> String {
        self.username.to_ascii_lowercase()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Options recognized by the client.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClientConfig {
    /// Endpoint handed to the transport connector.
    pub url: String,
    /// Reconnect after transport loss (default: true).
    pub reconnect: bool,
    /// First reconnect delay (default: 1 000).
    pub base_reconnect_delay_ms: u64,
    /// Cap on the reconnect delay (default: 60 000).
    pub max_reconnect_delay_ms: u64,
    /// JOIN/PART bucket capacity (default: 20).
    pub rate_limit_capacity: u32,
    /// JOIN/PART bucket window (default: 10 000).
    pub rate_limit_window_ms: u64,
    /// PRIVMSG bucket capacity (default: 20).
    pub message_rate_limit_capacity: u32,
    /// PRIVMSG bucket window (default: 30 000).
    pub message_rate_limit_window_ms: u64,
    /// Silence after which the connection is considered dead (default: 300 000).
    pub stale_connection_timeout_ms: u64,
    /// How often liveness is checked (default: 30 000).
    pub keepalive_interval_ms: u64,
    /// How long a JOIN may stay unconfirmed (default: 10 000).
    pub join_timeout_ms: u64,
    /// Capabilities requested with `CAP REQ`.
    pub capabilities: Vec<String>,
    /// Login; anonymous when absent.
    pub credentials: Option<Credentials>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            reconnect: true,
            base_reconnect_delay_ms: 1_000,
            max_reconnect_delay_ms: 60_000,
            rate_limit_capacity: 20,
            rate_limit_window_ms: 10_000,
            message_rate_limit_capacity: 20,
            message_rate_limit_window_ms: 30_000,
            stale_connection_timeout_ms: 300_000,
            keepalive_interval_ms: 30_000,
            join_timeout_ms: 10_000,
            capabilities: DEFAULT_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
            credentials: None,
        }
    }
}

impl ClientConfig {
    /// Default configuration logging in as `credentials`.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            ..Self::default()
        }
    }

    /// Reject values the client cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("JOIN/PART"));
        }
        if self.message_rate_limit_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("PRIVMSG"));
        }
        let durations = [
            ("rate_limit_window_ms", self.rate_limit_window_ms),
            ("message_rate_limit_window_ms", self.message_rate_limit_window_ms),
            ("stale_connection_timeout_ms", self.stale_connection_timeout_ms),
            ("keepalive_interval_ms", self.keepalive_interval_ms),
            ("join_timeout_ms", self.join_timeout_ms),
            ("base_reconnect_delay_ms", self.base_reconnect_delay_ms),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::ZeroDuration(name));
        }
        if self.max_reconnect_delay_ms < self.base_reconnect_delay_ms {
            return Err(ConfigError::BackoffInverted {
                base_ms: self.base_reconnect_delay_ms,
                max_ms: self.max_reconnect_delay_ms,
            });
        }
        Ok(())
    }

    pub fn membership_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(
            self.rate_limit_capacity,
            Duration::from_millis(self.rate_limit_window_ms),
        )
    }

    pub fn chat_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(
            self.message_rate_limit_capacity,
            Duration::from_millis(self.message_rate_limit_window_ms),
        )
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.base_reconnect_delay_ms),
            Duration::from_millis(self.max_reconnect_delay_ms),
        )
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_connection_timeout_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}
