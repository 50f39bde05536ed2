//! Configuration for the proxy server
//!
//! Configuration is loaded in order of precedence:
//! 1. Command-line flags (highest priority)
//! 2. Environment variables
//! 3. Config file (~/.config/gembridge/config.toml)
//! 4. Built-in defaults (lowest priority)

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the proxy server to
    pub bind_addr: SocketAddr,

    /// Upstream base URL (Gemini's OpenAI-compatibility endpoint)
    pub upstream_url: String,

    /// Hard ceiling on one upstream attempt
    pub request_timeout: Duration,

    /// Ceiling on the gap between upstream body chunks
    pub idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".parse().expect("valid default bind addr"),
            upstream_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            request_timeout: Duration::from_secs(300),
            idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Config file structure (subset of Config that makes sense to persist)
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    bind_addr: Option<String>,
    upstream_url: Option<String>,
    request_timeout_secs: Option<u64>,
    idle_timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config file path: ~/.config/gembridge/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("gembridge").join("config.toml"))
    }

    /// Load file config if it exists
    ///
    /// A config file that exists but cannot be parsed fails fast with a
    /// clear error instead of silently falling back to defaults.
    fn load_file_config() -> FileConfig {
        let Some(path) = Self::config_path() else {
            return FileConfig::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Failed to parse config file {}: {}", path.display(), e);
                    eprintln!("To reset, delete the file and restart gembridge.");
                    std::process::exit(1);
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(e) => {
                eprintln!("Cannot read config file {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    }

    /// Load configuration: env vars > file > defaults
    pub fn from_env() -> Self {
        let file = Self::load_file_config();
        let defaults = Config::default();

        let bind_addr = std::env::var("GEMBRIDGE_BIND")
            .ok()
            .or(file.bind_addr)
            .map(|s| s.parse().expect("Invalid bind address"))
            .unwrap_or(defaults.bind_addr);

        let upstream_url = std::env::var("GEMBRIDGE_UPSTREAM")
            .ok()
            .or(file.upstream_url)
            .unwrap_or(defaults.upstream_url);

        let request_timeout = std::env::var("GEMBRIDGE_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.request_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let idle_timeout = std::env::var("GEMBRIDGE_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.idle_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(defaults.idle_timeout);

        Self {
            bind_addr,
            upstream_url,
            request_timeout,
            idle_timeout,
        }
    }

    /// Render the effective configuration as TOML (for `config --show`)
    pub fn to_toml(&self) -> String {
        format!(
            r#"# gembridge configuration
bind_addr = "{bind_addr}"
upstream_url = "{upstream_url}"
request_timeout_secs = {request_timeout}
idle_timeout_secs = {idle_timeout}
"#,
            bind_addr = self.bind_addr,
            upstream_url = self.upstream_url,
            request_timeout = self.request_timeout.as_secs(),
            idle_timeout = self.idle_timeout.as_secs(),
        )
    }
}
