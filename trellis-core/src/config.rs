//! Configuration (TOML-based).
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//!
//! [state]
//! scope = "shared"
//! session_ttl_secs = 600
//!
//! [logging]
//! level = "debug"
//! json = true
//! ```
//!
//! Every section and key is optional. After loading, `TRELLIS_HOST`,
//! `TRELLIS_PORT`, `TRELLIS_LOG` and `TRELLIS_STATE_SCOPE` override the file.

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::state::{StateScope, DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub document: DocumentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path of the socket endpoint
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
    /// Concurrent background handler jobs
    #[serde(default = "default_background_workers")]
    pub background_workers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Per-connection or process-wide state
    #[serde(default)]
    pub scope: StateScope,
    /// Keep session snapshots between page render and socket connect
    #[serde(default = "default_true")]
    pub persist_sessions: bool,
    /// Seconds an unclaimed session snapshot is kept
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Most session snapshots kept at once
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// JSON format logging
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    /// Extra markup appended to `<head>`
    #[serde(default)]
    pub head: String,
}

// --- Defaults ---

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}
fn default_socket_path() -> String {
    "/ws".into()
}
fn default_background_workers() -> usize {
    4
}
fn default_true() -> bool {
    true
}
fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL.as_secs()
}
fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}
fn default_log_level() -> String {
    "info".into()
}
fn default_title() -> String {
    "Trellis App".into()
}
fn default_lang() -> String {
    "en".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            socket_path: default_socket_path(),
            background_workers: default_background_workers(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            scope: StateScope::default(),
            persist_sessions: true,
            session_ttl_secs: default_session_ttl_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            lang: default_lang(),
            head: String::new(),
        }
    }
}

impl ServerConfig {
    /// Resolve the address to bind. Hostnames such as `localhost` are looked
    /// up; the first address returned wins.
    pub async fn resolve_addr(&self) -> Result<SocketAddr, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: "server.host".into(),
            value: self.host.clone(),
        };
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|_| invalid())?;
        addrs.next().ok_or_else(invalid)
    }
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `TRELLIS_*` environment variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override fields from any key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("TRELLIS_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("TRELLIS_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "TRELLIS_PORT".into(),
                value: port.clone(),
            })?;
        }
        if let Some(level) = lookup("TRELLIS_LOG") {
            self.logging.level = level;
        }
        if let Some(scope) = lookup("TRELLIS_STATE_SCOPE") {
            self.state.scope = match scope.as_str() {
                "per_connection" => StateScope::PerConnection,
                "shared" => StateScope::Shared,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "TRELLIS_STATE_SCOPE".into(),
                        value: scope,
                    })
                }
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_document_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.socket_path, "/ws");
        assert_eq!(config.state.scope, StateScope::PerConnection);
        assert!(config.state.persist_sessions);
        assert_eq!(config.state.session_ttl_secs, 1800);
        assert_eq!(config.state.max_sessions, 10_000);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [server]
            port = 9000

            [state]
            scope = "shared"

            [document]
            title = "Counter"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.state.scope, StateScope::Shared);
        assert_eq!(config.document.title, "Counter");
        assert_eq!(config.document.lang, "en");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(matches!(
            Config::from_toml_str("[server\nport = 1"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[tokio::test]
    async fn overrides_apply() {
        let env = HashMap::from([
            ("TRELLIS_HOST", "0.0.0.0"),
            ("TRELLIS_PORT", "8123"),
            ("TRELLIS_LOG", "debug"),
            ("TRELLIS_STATE_SCOPE", "shared"),
        ]);
        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.resolve_addr().await.unwrap().to_string(), "0.0.0.0:8123");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.state.scope, StateScope::Shared);
    }

    #[tokio::test]
    async fn hostnames_resolve() {
        let server = ServerConfig {
            host: "localhost".into(),
            ..ServerConfig::default()
        };
        let addr = server.resolve_addr().await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 8000);

        let server = ServerConfig {
            host: "no such host".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            server.resolve_addr().await,
            Err(ConfigError::InvalidValue { key, .. }) if key == "server.host"
        ));
    }

    #[test]
    fn bad_overrides_are_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|key| (key == "TRELLIS_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "TRELLIS_PORT"));

        let err = config
            .apply_overrides(|key| (key == "TRELLIS_STATE_SCOPE").then(|| "global".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { value, .. } if value == "global"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
