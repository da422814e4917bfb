//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/termfolio/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/termfolio/` (~/.config/termfolio/)
//! - State/Logs: `$XDG_STATE_HOME/termfolio/` (~/.local/state/termfolio/)
//!
//! Secrets and deployment knobs can also come from the environment:
//! `OPENAI_API_KEY`, `UPSTASH_REDIS_REST_URL`, `UPSTASH_REDIS_REST_TOKEN`
//! and `PORT` override whatever the file says.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion service configuration (optional; chat is disabled without it)
    #[serde(default)]
    pub llm: LlmConfig,

    /// Rate limiter configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Session store configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Allowed request origins
    #[serde(default)]
    pub cors: CorsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root directory for static assets
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Hard ceiling on chat request body size, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            static_dir: default_static_dir(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_max_body_bytes() -> usize {
    2048
}

/// Completion service configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// API endpoint (defaults to the OpenAI API)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key (usually supplied via OPENAI_API_KEY instead)
    pub api_key: Option<String>,

    /// Output size bound per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_endpoint(),
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl LlmConfig {
    /// Chat requires an API key; without one the endpoint serves 503s.
    pub fn is_ready(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_endpoint() -> String {
    "https://api.openai.com".to_string()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_temperature() -> f32 {
    0.7
}

fn default_llm_timeout() -> u64 {
    30
}

/// Rate limiter configuration
///
/// When both Upstash fields are present the limiter runs against the shared
/// Redis store (sliding window); otherwise it falls back to the in-memory
/// fixed-window counter, which is per-process only.
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Max requests per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window size in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Penalty block applied after a breach, in seconds
    #[serde(default = "default_block_secs")]
    pub block_secs: u64,

    /// Upstash Redis REST URL (usually via UPSTASH_REDIS_REST_URL)
    pub upstash_url: Option<String>,

    /// Upstash Redis REST token (usually via UPSTASH_REDIS_REST_TOKEN)
    pub upstash_token: Option<String>,

    /// Key prefix in the shared store
    #[serde(default = "default_redis_prefix")]
    pub redis_prefix: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            block_secs: default_block_secs(),
            upstash_url: None,
            upstash_token: None,
            redis_prefix: default_redis_prefix(),
        }
    }
}

impl RateLimitConfig {
    /// True when the shared Upstash store is fully configured.
    pub fn has_shared_store(&self) -> bool {
        self.upstash_url.is_some() && self.upstash_token.is_some()
    }
}

fn default_max_requests() -> u32 {
    15
}

fn default_window_secs() -> u64 {
    60
}

fn default_block_secs() -> u64 {
    120
}

fn default_redis_prefix() -> String {
    "termfolio".to_string()
}

/// Session store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Idle timeout in seconds before a session is swept
    #[serde(default = "default_session_timeout")]
    pub timeout_secs: u64,

    /// Hard cap on live sessions; exceeding it evicts the oldest half
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// How many recent turns are sent to the completion service
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Interval between cleanup sweeps, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_session_timeout(),
            max_sessions: default_max_sessions(),
            history_window: default_history_window(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_session_timeout() -> u64 {
    30 * 60
}

fn default_max_sessions() -> usize {
    1000
}

fn default_history_window() -> usize {
    10
}

fn default_sweep_interval() -> u64 {
    5 * 60
}

/// Allowed request origins
#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    /// Exact origin matches
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Regex patterns for origin matches (e.g. preview deployments)
    #[serde(default = "default_origin_patterns")]
    pub origin_patterns: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
            origin_patterns: default_origin_patterns(),
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "https://suedagul.com".to_string(),
        "https://www.suedagul.com".to_string(),
        "https://whyme.live".to_string(),
        "https://www.whyme.live".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

fn default_origin_patterns() -> Vec<String> {
    vec![r"\.vercel\.app$".to_string()]
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path, then apply environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Config::default()
        };

        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific path (no environment overrides)
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Apply environment variable overrides for secrets and the port.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("UPSTASH_REDIS_REST_URL") {
            if !url.is_empty() {
                self.rate_limit.upstash_url = Some(url);
            }
        }
        if let Ok(token) = std::env::var("UPSTASH_REDIS_REST_TOKEN") {
            if !token.is_empty() {
                self.rate_limit.upstash_token = Some(token);
            }
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/termfolio/config.toml` (~/.config/termfolio/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("termfolio").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/termfolio/` (~/.local/state/termfolio/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("termfolio")
    }

    /// Validate configuration, returning an error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.max_requests == 0 {
            return Err(Error::Config(
                "rate_limit.max_requests must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(Error::Config(
                "rate_limit.window_secs must be at least 1".to_string(),
            ));
        }
        if self.session.max_sessions == 0 {
            return Err(Error::Config(
                "session.max_sessions must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.upstash_url.is_some() != self.rate_limit.upstash_token.is_some() {
            return Err(Error::Config(
                "rate_limit.upstash_url and upstash_token must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.llm.is_ready());
        assert_eq!(config.rate_limit.max_requests, 15);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.rate_limit.block_secs, 120);
        assert_eq!(config.session.timeout_secs, 1800);
        assert_eq!(config.session.history_window, 10);
        assert_eq!(config.server.max_body_bytes, 2048);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
port = 8080

[llm]
model = "gpt-4o"
api_key = "sk-test"

[rate_limit]
max_requests = 10
window_secs = 30

[session]
max_sessions = 100

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.model, "gpt-4o");
        assert!(config.llm.is_ready());
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.session.max_sessions, 100);
        assert_eq!(config.logging.level, "debug");
        // Unset sections keep their defaults
        assert_eq!(config.session.history_window, 10);
        assert_eq!(config.llm.max_tokens, 500);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 4000\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn test_shared_store_detection() {
        let mut config = RateLimitConfig::default();
        assert!(!config.has_shared_store());

        config.upstash_url = Some("https://example.upstash.io".to_string());
        assert!(!config.has_shared_store());

        config.upstash_token = Some("token".to_string());
        assert!(config.has_shared_store());
    }

    #[test]
    fn test_validate_rejects_partial_upstash() {
        let mut config = Config::default();
        config.rate_limit.upstash_url = Some("https://example.upstash.io".to_string());
        assert!(config.validate().is_err());

        config.rate_limit.upstash_token = Some("token".to_string());
        assert!(config.validate().is_ok());
    }
}
