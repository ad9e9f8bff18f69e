//! Configuration file parser for ~/.config/herald/config.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields`
//! off), though we log a warning when the file contains potential typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::notify::Notifier;

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

/// Top-level daemon configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified; missing keys fall back to `Default::default()`.
///
/// The custom Debug impl masks `bot_token` to prevent secret leakage in
/// logs, error messages, and debug output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between poll cycles.
    pub poll_interval_secs: u64,

    /// Per-request feed fetch timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Upper bound on concurrently in-flight feed fetches.
    pub max_concurrent_fetches: usize,

    /// Database file path. Defaults to `herald.db` in the config directory.
    pub database_path: Option<String>,

    /// Base URL of the chat API. Overridable so a staging or mock endpoint
    /// can stand in for the real one.
    pub api_base: String,

    /// Bot token (alternative to the HERALD_BOT_TOKEN env var).
    /// Env var takes precedence over config file.
    pub bot_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            fetch_timeout_secs: 30,
            max_concurrent_fetches: 8,
            database_path: None,
            api_base: Notifier::DEFAULT_API_BASE.to_string(),
            bot_token: None,
        }
    }
}

/// Mask bot_token in Debug output to prevent secret leakage.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("max_concurrent_fetches", &self.max_concurrent_fetches)
            .field("database_path", &self.database_path)
            .field("api_base", &self.api_base)
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to bound memory on a corrupted file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "poll_interval_secs",
                "fetch_timeout_secs",
                "max_concurrent_fetches",
                "database_path",
                "api_base",
                "bot_token",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            interval_secs = config.poll_interval_secs,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Resolve the bot token: the HERALD_BOT_TOKEN env var wins over the
    /// config file. Wrapped in `SecretString` so it never lands in logs.
    pub fn bot_token(&self) -> Option<SecretString> {
        std::env::var("HERALD_BOT_TOKEN")
            .ok()
            .or_else(|| self.bot_token.clone())
            .map(SecretString::from)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval_secs, 300);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.max_concurrent_fetches, 8);
        assert!(config.database_path.is_none());
        assert_eq!(config.api_base, Notifier::DEFAULT_API_BASE);
        assert!(config.bot_token.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/herald_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.poll_interval_secs, 300);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("herald_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll_interval_secs, 300);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("herald_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "poll_interval_secs = 60\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.fetch_timeout_secs, 30); // default
        assert_eq!(config.max_concurrent_fetches, 8); // default

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("herald_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
poll_interval_secs = 120
fetch_timeout_secs = 10
max_concurrent_fetches = 4
database_path = "/var/lib/herald/herald.db"
api_base = "https://chat.example.com/api"
bot_token = "test-token-123"
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll_interval_secs, 120);
        assert_eq!(config.fetch_timeout_secs, 10);
        assert_eq!(config.max_concurrent_fetches, 4);
        assert_eq!(
            config.database_path.as_deref(),
            Some("/var/lib/herald/herald.db")
        );
        assert_eq!(config.api_base, "https://chat.example.com/api");
        assert_eq!(config.bot_token.as_deref(), Some("test-token-123"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("herald_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let result = Config::load(&path);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        let msg = err.to_string();
        assert!(msg.contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = std::env::temp_dir().join("herald_config_test_unknown");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
poll_interval_secs = 300
totally_fake_key = "should not fail"
another_unknown = 42
"#;
        std::fs::write(&path, content).unwrap();

        // Should succeed (unknown keys ignored)
        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll_interval_secs, 300);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let dir = std::env::temp_dir().join("herald_config_test_wrongtype");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        // poll_interval_secs should be an integer, not a string
        std::fs::write(&path, "poll_interval_secs = \"soon\"\n").unwrap();

        let result = Config::load(&path);
        assert!(result.is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("herald_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        // Write a file just over 1MB
        let content = "a".repeat(1_048_577);
        std::fs::write(&path, content).unwrap();

        let result = Config::load(&path);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_debug_masks_bot_token() {
        let mut config = Config::default();
        config.bot_token = Some("super-secret-token-12345".to_string());

        let debug_output = format!("{:?}", config);
        assert!(
            !debug_output.contains("super-secret-token-12345"),
            "Debug output should not contain the bot token"
        );
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should show [REDACTED] for the bot token"
        );
    }

    #[test]
    fn test_debug_shows_none_when_no_token() {
        let config = Config::default();
        let debug_output = format!("{:?}", config);
        assert!(
            debug_output.contains("None"),
            "Debug output should show None when no token is set"
        );
        assert!(
            !debug_output.contains("[REDACTED]"),
            "Debug output should not show [REDACTED] when no token"
        );
    }
}
