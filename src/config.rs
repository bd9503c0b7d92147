//! Configuration module for Filedrop.
//!
//! Configuration is read once at startup from an optional `config.toml`
//! and then overridden by environment variables. It is never mutated after
//! the server starts.

use serde::Deserialize;
use std::path::Path;

use crate::{FiledropError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-chunk read/write timeout in seconds while receiving an upload.
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_io_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            io_timeout_secs: default_io_timeout(),
        }
    }
}

/// Upload storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory under which every upload is stored.
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    /// Allowed file extensions (without the leading dot, case-insensitive).
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
    /// Maximum upload size in bytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

fn default_upload_directory() -> String {
    "uploads".to_string()
}

fn default_max_upload_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_directory: default_upload_directory(),
            allowed_extensions: vec![],
            max_upload_size: default_max_upload_size(),
        }
    }
}

/// Web surface configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Whether to serve the static assets directory.
    #[serde(default = "default_serve_static")]
    pub serve_static: bool,
    /// Path to the static assets directory.
    #[serde(default = "default_static_path")]
    pub static_path: String,
}

fn default_serve_static() -> bool {
    true
}

fn default_static_path() -> String {
    "public".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            cors_origins: vec![],
            serve_static: default_serve_static(),
            static_path: default_static_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file; console only when unset.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Web configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FiledropError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file if it exists, then apply environment overrides.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = if path.as_ref().exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FiledropError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `UPLOAD_DIRECTORY`: storage root
    /// - `ALLOWED_EXTENSIONS`: comma-separated extension allow-list
    /// - `MAX_UPLOAD_SIZE`: upload ceiling in bytes
    /// - `HOST` / `PORT`: listen address
    /// - `PUBLIC_DIRECTORY`: static assets directory
    /// - `LOG_LEVEL`: log level
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var("UPLOAD_DIRECTORY") {
            self.storage.upload_directory = dir;
        }
        if let Some(list) = var("ALLOWED_EXTENSIONS") {
            self.storage.allowed_extensions = list
                .split(',')
                .map(str::trim)
                .filter(|ext| !ext.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(size) = var("MAX_UPLOAD_SIZE") {
            match size.trim().parse() {
                Ok(size) => self.storage.max_upload_size = size,
                Err(_) => tracing::warn!(value = %size, "Ignoring invalid MAX_UPLOAD_SIZE"),
            }
        }
        if let Some(host) = var("HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PORT"),
            }
        }
        if let Some(dir) = var("PUBLIC_DIRECTORY") {
            self.web.static_path = dir;
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - The upload directory is empty
    /// - The maximum upload size is zero
    /// - The I/O timeout is zero
    pub fn validate(&self) -> Result<()> {
        if self.storage.upload_directory.trim().is_empty() {
            return Err(FiledropError::Validation(
                "upload_directory must not be empty".to_string(),
            ));
        }
        if self.storage.max_upload_size == 0 {
            return Err(FiledropError::Validation(
                "max_upload_size must be greater than zero".to_string(),
            ));
        }
        if self.server.io_timeout_secs == 0 {
            return Err(FiledropError::Validation(
                "io_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.io_timeout_secs, 30);

        assert_eq!(config.storage.upload_directory, "uploads");
        assert!(config.storage.allowed_extensions.is_empty());
        assert_eq!(config.storage.max_upload_size, 5 * 1024 * 1024);

        assert!(config.web.cors_origins.is_empty());
        assert!(config.web.serve_static);
        assert_eq!(config.web.static_path, "public");

        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 8080
io_timeout_secs = 10

[storage]
upload_directory = "/srv/drop"
allowed_extensions = ["png", "pdf"]
max_upload_size = 1048576

[web]
cors_origins = ["http://localhost:5173"]
serve_static = false
static_path = "assets"

[logging]
level = "debug"
file = "logs/filedrop.log"
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.io_timeout_secs, 10);

        assert_eq!(config.storage.upload_directory, "/srv/drop");
        assert_eq!(config.storage.allowed_extensions, vec!["png", "pdf"]);
        assert_eq!(config.storage.max_upload_size, 1048576);

        assert_eq!(config.web.cors_origins, vec!["http://localhost:5173"]);
        assert!(!config.web.serve_static);
        assert_eq!(config.web.static_path, "assets");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file.as_deref(), Some("logs/filedrop.log"));
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[storage]
allowed_extensions = ["jpg"]
"#;

        let config = Config::parse(toml).unwrap();

        assert_eq!(config.storage.allowed_extensions, vec!["jpg"]);
        assert_eq!(config.storage.upload_directory, "uploads");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = Config::parse("this is not valid toml [[[");

        match result {
            Err(FiledropError::Config(msg)) => assert!(msg.contains("config parse error")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load("nonexistent.toml");
        assert!(matches!(result, Err(FiledropError::Io(_))));
    }

    #[test]
    fn test_load_with_env_missing_file_uses_defaults() {
        let config = Config::load_with_env("definitely-not-here.toml").unwrap();
        assert!(config.storage.max_upload_size > 0);
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            ("UPLOAD_DIRECTORY", "data/in"),
            ("ALLOWED_EXTENSIONS", "png,PDF, txt,,"),
            ("MAX_UPLOAD_SIZE", "2048"),
            ("PORT", "4000"),
            ("PUBLIC_DIRECTORY", "static"),
        ]));

        assert_eq!(config.storage.upload_directory, "data/in");
        assert_eq!(
            config.storage.allowed_extensions,
            vec!["png", "PDF", "txt"]
        );
        assert_eq!(config.storage.max_upload_size, 2048);
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.web.static_path, "static");
    }

    #[test]
    fn test_overrides_ignore_empty_and_invalid() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            ("UPLOAD_DIRECTORY", ""),
            ("PORT", "not-a-port"),
            ("MAX_UPLOAD_SIZE", "-1"),
        ]));

        assert_eq!(config.storage.upload_directory, "uploads");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.max_upload_size, 5 * 1024 * 1024);
    }

    #[test]
    fn test_validate_zero_upload_size() {
        let mut config = Config::default();
        config.storage.max_upload_size = 0;

        match config.validate() {
            Err(FiledropError::Validation(msg)) => assert!(msg.contains("max_upload_size")),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_empty_directory() {
        let mut config = Config::default();
        config.storage.upload_directory = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_io_timeout() {
        let mut config = Config::default();
        config.server.io_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_default() {
        assert!(Config::default().validate().is_ok());
    }
}
