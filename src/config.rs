//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Missing or unparsable values fall back
//! to defaults; only `LISTEN_ADDR` is validated strictly.

use std::net::SocketAddr;
use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Credentials for HTTP Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    /// Expected user name.
    pub username: String,
    /// Expected password.
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Per-session WebSocket tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Period of the liveness check (observed default: 500 ms).
    pub heartbeat_interval: Duration,
    /// Close the session after this long without inbound frames.
    /// [`Duration::ZERO`] disables the timeout.
    pub idle_timeout: Duration,
    /// Send a ping once the session has been idle this long.
    pub ping_interval: Duration,
    /// Capacity of each session's outbound queue.
    pub queue_capacity: usize,
    /// Upper bound on topics one connection may subscribe to.
    pub max_topics_per_session: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(500),
            idle_timeout: Duration::from_secs(60),
            ping_interval: Duration::from_secs(20),
            queue_capacity: 64,
            max_topics_per_session: 32,
        }
    }
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:8000`).
    pub listen_addr: SocketAddr,

    /// Reported by `/info`; also raises the default log level to `debug`.
    pub debug_mode: bool,

    /// Log output format.
    pub log_format: LogFormat,

    /// Basic auth credentials. `None` disables authentication.
    pub basic_auth: Option<BasicAuth>,

    /// WebSocket session tuning.
    pub session: SessionSettings,

    /// Timeout applied to plain HTTP requests.
    pub request_timeout: Duration,

    /// Commit hash reported by `/info`.
    pub git_commit: Option<String>,

    /// Build date reported by `/info`.
    pub build_date: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            debug_mode: false,
            log_format: LogFormat::Text,
            basic_auth: None,
            session: SessionSettings::default(),
            request_timeout: Duration::from_secs(30),
            git_commit: None,
            build_date: None,
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let session_defaults = SessionSettings::default();

        let listen_addr = match lookup("LISTEN_ADDR") {
            Some(addr) => addr.parse()?,
            None => defaults.listen_addr,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let basic_auth = match (lookup("BASIC_AUTH_USERNAME"), lookup("BASIC_AUTH_PASSWORD")) {
            (Some(username), Some(password)) if !username.is_empty() => {
                Some(BasicAuth { username, password })
            }
            _ => None,
        };

        let heartbeat_ms: u64 = parse_value(&lookup, "WS_HEARTBEAT_INTERVAL_MS", 500);
        let idle_secs: u64 = parse_value(&lookup, "WS_IDLE_TIMEOUT_SECS", 60);
        let ping_secs: u64 = parse_value(&lookup, "WS_PING_INTERVAL_SECS", 20);

        let session = SessionSettings {
            heartbeat_interval: Duration::from_millis(heartbeat_ms.max(1)),
            idle_timeout: Duration::from_secs(idle_secs),
            ping_interval: Duration::from_secs(ping_secs),
            queue_capacity: parse_value(&lookup, "WS_QUEUE_CAPACITY", session_defaults.queue_capacity)
                .max(1),
            max_topics_per_session: parse_value(
                &lookup,
                "WS_MAX_TOPICS_PER_SESSION",
                session_defaults.max_topics_per_session,
            )
            .max(1),
        };

        Ok(Self {
            listen_addr,
            debug_mode: parse_bool(&lookup, "DEBUG_MODE", defaults.debug_mode),
            log_format,
            basic_auth,
            session,
            request_timeout: Duration::from_secs(parse_value(&lookup, "REQUEST_TIMEOUT_SECS", 30)),
            git_commit: lookup("GIT_COMMIT").filter(|v| !v.is_empty()),
            build_date: lookup("BUILD_DATE").filter(|v| !v.is_empty()),
        })
    }
}

/// Parses a value as `T`, returning `default` on missing or invalid input.
fn parse_value<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses a boolean. Accepts `"true"`, `"1"`, `"false"`, `"0"`
/// (case-insensitive). Returns `default` otherwise.
fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        _ => default,
    }
}
