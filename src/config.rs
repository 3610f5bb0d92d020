//! Configuration file parser for the feed service (`imob-feed.toml`).
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored but logged, since they are usually typos.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Base URL of the Imob86 listing export. The client hash is appended as a path segment.
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "https://xml.imob86.conceptsoft.com.br/Imob86XML/listar/";

/// Domain used for canonical links when the request does not name one.
pub const DEFAULT_DOMAIN: &str = "seusite.com.br";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level service configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Socket address the HTTP server listens on.
    pub bind_addr: String,

    /// Upstream listing export base. Must end with `/` for the hash to land as a new segment.
    pub upstream_base_url: String,

    /// Upper bound for the single upstream request, in seconds.
    pub fetch_timeout_secs: u64,

    /// Largest upstream body accepted, in bytes.
    pub max_response_bytes: usize,

    /// Domain for canonical item links when the request omits `domain`.
    pub default_domain: String,

    /// `max-age` advertised to downstream HTTP caches.
    pub cache_max_age_secs: u64,

    /// Whether to also emit `s-maxage` for shared (CDN) caches.
    pub shared_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            fetch_timeout_secs: 9,
            max_response_bytes: 20 * 1024 * 1024,
            default_domain: DEFAULT_DOMAIN.to_string(),
            cache_max_age_secs: 3600,
            shared_cache: true,
        }
    }
}

/// Keys the service understands; anything else in the file is reported.
const KNOWN_KEYS: [&str; 7] = [
    "bind_addr",
    "upstream_base_url",
    "fetch_timeout_secs",
    "max_response_bytes",
    "default_domain",
    "cache_max_age_secs",
    "shared_cache",
];

/// Largest config file accepted (1 MB).
const MAX_FILE_SIZE: u64 = 1_048_576;

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing or blank file yields the defaults. Invalid TOML or a
    /// mistyped value is an error; unknown keys are logged and ignored.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = read_config_file(path)? else {
            tracing::debug!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        };
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        warn_unknown_keys(&content);

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            bind_addr = %config.bind_addr,
            upstream = %config.upstream_base_url,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Value of the `Cache-Control` header sent with successful feeds.
    pub fn cache_control(&self) -> String {
        if self.shared_cache {
            format!(
                "public, max-age={0}, s-maxage={0}",
                self.cache_max_age_secs
            )
        } else {
            format!("public, max-age={}", self.cache_max_age_secs)
        }
    }
}

/// Reads the file, or `None` if it does not exist.
fn read_config_file(path: &Path) -> Result<Option<String>, ConfigError> {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::Io(e)),
    };
    if size > MAX_FILE_SIZE {
        return Err(ConfigError::TooLarge(format!(
            "Config file is {size} bytes (max {MAX_FILE_SIZE} bytes)"
        )));
    }
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConfigError::Io(e)),
    }
}

fn warn_unknown_keys(content: &str) {
    // Syntax errors are reported by the typed parse that follows
    let Ok(raw) = content.parse::<toml::Table>() else {
        return;
    };
    for key in raw.keys().filter(|k| !KNOWN_KEYS.contains(&k.as_str())) {
        tracing::warn!(key = %key, "Unknown key in config file, ignoring");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Writes `content` to a fresh config file; returns (dir, file path).
    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("imob_feed_config_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("imob-feed.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.upstream_base_url, DEFAULT_UPSTREAM_BASE_URL);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(9));
        assert_eq!(config.max_response_bytes, 20 * 1024 * 1024);
        assert_eq!(config.default_domain, "seusite.com.br");
        assert_eq!(config.cache_control(), "public, max-age=3600, s-maxage=3600");
    }

    #[test]
    fn test_missing_or_blank_file_gives_defaults() {
        let missing = Path::new("/tmp/imob_feed_config_does_not_exist.toml");
        assert_eq!(Config::load(missing).unwrap().fetch_timeout_secs, 9);

        let (dir, path) = write_config("blank", "   \n  ");
        assert_eq!(Config::load(&path).unwrap().fetch_timeout_secs, 9);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let (dir, path) = write_config("partial", "fetch_timeout_secs = 8\nshared_cache = false\n");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.fetch_timeout_secs, 8);
        assert_eq!(config.cache_control(), "public, max-age=3600");
        assert_eq!(config.default_domain, "seusite.com.br");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let (dir, path) = write_config(
            "full",
            r#"
bind_addr = "127.0.0.1:9000"
upstream_base_url = "https://mirror.example.com/listar/"
fetch_timeout_secs = 15
max_response_bytes = 1048576
default_domain = "www.imobiliariax.com.br"
cache_max_age_secs = 600
shared_cache = false
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.upstream_base_url, "https://mirror.example.com/listar/");
        assert_eq!(config.fetch_timeout(), Duration::from_secs(15));
        assert_eq!(config.max_response_bytes, 1_048_576);
        assert_eq!(config.default_domain, "www.imobiliariax.com.br");
        assert_eq!(config.cache_control(), "public, max-age=600");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config("unknown", "default_domain = \"a.com.br\"\nregion = \"SP\"\n");
        assert_eq!(Config::load(&path).unwrap().default_domain, "a.com.br");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_bad_files_rejected() {
        let (dir, path) = write_config("syntax", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        std::fs::remove_dir_all(&dir).ok();

        let (dir, path) = write_config("wrong_type", "fetch_timeout_secs = \"nine\"\n");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();

        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
