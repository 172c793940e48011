//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use tunemate_core::RelayConfig;

/// Runtime configuration for tunemate-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// SQLite database URL (default: `"sqlite://tunemate.db"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,

    /// Per-recipient delivery deadline during fan-out.
    pub delivery_timeout: Duration,

    /// Deadline for the WebSocket handshake probe.
    pub handshake_timeout: Duration,

    /// Outbound frames buffered per connection.
    pub outbound_buffer: usize,

    /// Interval between keep-alive pings on chat sockets.
    pub ws_ping_interval: Duration,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("TUNEMATE_BIND", "0.0.0.0:3000"),
            database_url: env_or("TUNEMATE_DATABASE_URL", "sqlite://tunemate.db"),
            log_level: env_or("TUNEMATE_LOG", "info"),
            log_json: env_flag("TUNEMATE_LOG_JSON", false),
            cors_allowed_origins: std::env::var("TUNEMATE_CORS_ORIGINS").ok(),
            enable_swagger: env_flag("TUNEMATE_ENABLE_SWAGGER", true),
            delivery_timeout: Duration::from_millis(parse_env("TUNEMATE_DELIVERY_TIMEOUT_MS", 2_000)),
            handshake_timeout: Duration::from_millis(parse_env("TUNEMATE_HANDSHAKE_TIMEOUT_MS", 5_000)),
            outbound_buffer: parse_env("TUNEMATE_OUTBOUND_BUFFER", 64),
            ws_ping_interval: Duration::from_secs(parse_env("TUNEMATE_WS_PING_SECS", 30)),
        }
    }

    pub fn relay(&self) -> RelayConfig {
        RelayConfig {
            delivery_timeout: self.delivery_timeout,
            handshake_timeout: self.handshake_timeout,
            outbound_buffer: self.outbound_buffer,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let relay = RelayConfig::default();
        Self {
            bind_address: "0.0.0.0:3000".to_owned(),
            database_url: "sqlite://tunemate.db".to_owned(),
            log_level: "info".to_owned(),
            log_json: false,
            cors_allowed_origins: None,
            enable_swagger: true,
            delivery_timeout: relay.delivery_timeout,
            handshake_timeout: relay.handshake_timeout,
            outbound_buffer: relay.outbound_buffer,
            ws_ping_interval: Duration::from_secs(30),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
