use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// JSON file mapping obfuscated code points to real characters.
    #[serde(default = "default_char_map_path")]
    pub char_map_path: String,

    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// User agent presented to the source site.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Session credential for locked chapters. The FANQIE_SESSION
    /// environment variable overrides this key.
    #[serde(default)]
    pub session_id: Option<String>,

    /// Maximum chapters processed by one fetch-book-content job
    #[serde(default = "default_content_batch_size")]
    pub content_batch_size: usize,

    /// Pause between chapter fetches within a batch
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,

    /// Timeout for HTTP requests in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retry attempts for transient HTTP failures
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial retry delay in milliseconds
    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_ms: u64,

    /// Maximum retry delay in milliseconds
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,
}

fn default_db_path() -> String {
    "novel.db".to_string()
}
fn default_char_map_path() -> String {
    "data/fanqie_char_map.json".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36".to_string()
}
fn default_content_batch_size() -> usize {
    10
}
fn default_request_delay() -> u64 {
    300
}
fn default_timeout() -> u64 {
    30
}
fn default_max_retries() -> usize {
    4
}
fn default_initial_retry_delay() -> u64 {
    500
}
fn default_max_retry_delay() -> u64 {
    8000
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            session_id: None,
            content_batch_size: default_content_batch_size(),
            request_delay_ms: default_request_delay(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            initial_retry_delay_ms: default_initial_retry_delay(),
            max_retry_delay_ms: default_max_retry_delay(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            char_map_path: default_char_map_path(),
            fetch: FetchConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let mut cfg = Self::from_file("config.toml");
        if let Ok(session) = std::env::var("FANQIE_SESSION") {
            if !session.is_empty() {
                cfg.fetch.session_id = Some(session);
            }
        }
        cfg
    }

    fn from_file(path: &str) -> Self {
        let path = Path::new(path);
        if path.exists() {
            if let Ok(content) = fs::read_to_string(path) {
                match toml::from_str::<Config>(&content) {
                    Ok(cfg) => return cfg,
                    Err(e) => log::warn!("ignoring malformed {}: {}", path.display(), e),
                }
            }
        }
        Self::default()
    }
}

impl FetchConfig {
    /// Create the HTTP client used for all source-site fetches.
    pub fn create_http_client(
        &self,
    ) -> Result<crate::http_client::EnhancedHttpClient, reqwest::Error> {
        use crate::http_client::{EnhancedHttpClient, HttpClientConfig};
        use std::time::Duration;

        let config = HttpClientConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone(),
            max_retries: self.max_retries,
            initial_retry_delay_ms: self.initial_retry_delay_ms,
            max_retry_delay_ms: self.max_retry_delay_ms,
        };

        EnhancedHttpClient::with_config(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.fetch.content_batch_size, 10);
        assert!(cfg.fetch.session_id.is_none());
        assert!(cfg.fetch.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: Config = toml::from_str("db_path = \"other.db\"").unwrap();
        assert_eq!(cfg.db_path, "other.db");
        assert_eq!(cfg.char_map_path, "data/fanqie_char_map.json");
        assert_eq!(cfg.fetch.max_retries, 4);
    }
}
