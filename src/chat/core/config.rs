//! Configuration for the chat client.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::core::errors::{ChatError, ChatResult};

/// Environment variable holding the remote API base URL.
pub const API_BASE_ENV: &str = "KNOWLEDGE_CHAT_API_BASE";
/// Environment variable holding the request timeout in seconds.
pub const TIMEOUT_ENV: &str = "KNOWLEDGE_CHAT_TIMEOUT_SECS";
/// Environment variable holding the connect timeout in seconds.
pub const CONNECT_TIMEOUT_ENV: &str = "KNOWLEDGE_CHAT_CONNECT_TIMEOUT_SECS";
/// Environment variable selecting `silent` or `narrated` ingestion.
pub const INGEST_MODE_ENV: &str = "KNOWLEDGE_CHAT_INGEST_MODE";
/// Environment variable selecting `wait` or `reject` for sends during an encode.
pub const PENDING_ENCODE_ENV: &str = "KNOWLEDGE_CHAT_PENDING_ENCODE";
/// Environment variable holding the token store path.
pub const TOKEN_PATH_ENV: &str = "KNOWLEDGE_CHAT_TOKEN_PATH";

/// Default remote API base URL.
const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

/// How ingestion outcomes of `send` show up in the transcript.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestMode {
    /// Outcome only goes to the log.
    Silent,
    /// Outcome is appended as an assistant message.
    #[default]
    Narrated,
}

impl fmt::Display for IngestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Silent => "silent",
            Self::Narrated => "narrated",
        })
    }
}

impl FromStr for IngestMode {
    type Err = ChatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "narrated" => Ok(Self::Narrated),
            other => Err(ChatError::InvalidConfig(format!(
                "unknown ingest mode `{other}` (expected silent or narrated)"
            ))),
        }
    }
}

/// What `send` does when the selected file is still being encoded.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingEncodePolicy {
    /// Accept the send; the upload waits for the encode to finish.
    #[default]
    Wait,
    /// Refuse the send until the payload is ready.
    Reject,
}

impl fmt::Display for PendingEncodePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Wait => "wait",
            Self::Reject => "reject",
        })
    }
}

impl FromStr for PendingEncodePolicy {
    type Err = ChatError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wait" => Ok(Self::Wait),
            "reject" => Ok(Self::Reject),
            other => Err(ChatError::InvalidConfig(format!(
                "unknown pending-encode policy `{other}` (expected wait or reject)"
            ))),
        }
    }
}

/// Top-level configuration for the chat engine and its HTTP client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Remote API base URL, without trailing slash.
    pub api_base: String,
    /// Request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Silent or narrated ingestion for `send`.
    pub ingest_mode: IngestMode,
    /// Behaviour of `send` while the selected file is still encoding.
    pub pending_encode: PendingEncodePolicy,
    /// File backing the session token store.
    pub token_path: PathBuf,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            ingest_mode: IngestMode::default(),
            pending_encode: PendingEncodePolicy::default(),
            token_path: default_token_path(),
        }
    }
}

impl ChatConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable is present but malformed.
    pub fn from_env() -> ChatResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, falling back to defaults.
    ///
    /// # Errors
    /// Returns an error if a value is present but malformed.
    pub fn from_lookup<F>(lookup: F) -> ChatResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base) = lookup(API_BASE_ENV) {
            config = config.with_api_base(base);
        }
        if let Some(secs) = lookup(TIMEOUT_ENV) {
            config.request_timeout = parse_secs(TIMEOUT_ENV, &secs)?;
        }
        if let Some(secs) = lookup(CONNECT_TIMEOUT_ENV) {
            config.connect_timeout = parse_secs(CONNECT_TIMEOUT_ENV, &secs)?;
        }
        if let Some(mode) = lookup(INGEST_MODE_ENV) {
            config.ingest_mode = mode.parse()?;
        }
        if let Some(policy) = lookup(PENDING_ENCODE_ENV) {
            config.pending_encode = policy.parse()?;
        }
        if let Some(path) = lookup(TOKEN_PATH_ENV) {
            config.token_path = PathBuf::from(path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the API base URL. Trailing slashes are stripped.
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim().trim_end_matches('/').to_string();
        self
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the ingestion mode.
    #[must_use]
    pub const fn with_ingest_mode(mut self, mode: IngestMode) -> Self {
        self.ingest_mode = mode;
        self
    }

    /// Set the pending-encode policy.
    #[must_use]
    pub const fn with_pending_encode(mut self, policy: PendingEncodePolicy) -> Self {
        self.pending_encode = policy;
        self
    }

    /// Set the token store path.
    #[must_use]
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if the base URL is unusable or a timeout is zero.
    pub fn validate(&self) -> ChatResult<()> {
        let url = Url::parse(&self.api_base)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ChatError::InvalidConfig(format!(
                "api_base must be http or https, got `{}`",
                url.scheme()
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(ChatError::InvalidConfig(
                "request_timeout must be > 0".to_string(),
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(ChatError::InvalidConfig(
                "connect_timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_secs(key: &str, value: &str) -> ChatResult<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|err| ChatError::InvalidConfig(format!("{key}: {err}")))
}

/// Per-user location of the session token file.
fn default_token_path() -> PathBuf {
    dirs::config_dir().map_or_else(
        || PathBuf::from("session.json"),
        |dir| dir.join("knowledge_chat").join("session.json"),
    )
}

/// Serde module for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
