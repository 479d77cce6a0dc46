//! # Configuration
//!
//! All settings live in one TOML document. Every table and every key is
//! optional; missing values fall back to the defaults below.
//!
//! ```toml
//! [database]
//! queue = "wikidb.queue"
//! max_pool_size = 30
//! acquire_timeout_ms = 5000
//! operation_timeout_ms = 10000
//!
//! [bus]
//! request_timeout_ms = 30000
//!
//! [chat]
//! inbound = "chat.to.server"
//! outbound = "chat.to.client"
//!
//! [socket_client]
//! host = "localhost"
//! port = 8080
//! path = "/eventbus/start.to.server"
//! reply = "Pong"
//! reconnect_delay_ms = 5000
//! # max_reconnects = 3
//!
//! [socket_server]
//! host = "localhost"
//! port = 8080
//! path_prefix = "/eventbus/"
//! reply = "Ping"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Root of the configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WikiConfig {
    pub database: DatabaseConfig,
    pub bus: BusConfig,
    pub chat: ChatConfig,
    pub socket_client: SocketClientConfig,
    pub socket_server: SocketServerConfig,
}

impl WikiConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Queue the database actor consumes.
    pub queue: String,
    pub max_pool_size: usize,
    pub acquire_timeout_ms: u64,
    /// Upper bound for a single store operation.
    pub operation_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            queue: "wikidb.queue".to_string(),
            max_pool_size: 30,
            acquire_timeout_ms: 5_000,
            operation_timeout_ms: 10_000,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub request_timeout_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
        }
    }
}

impl BusConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Addresses bridged by the chat relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub inbound: String,
    pub outbound: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            inbound: "chat.to.server".to_string(),
            outbound: "chat.to.client".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketClientConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Text sent back for every inbound message.
    pub reply: String,
    pub reconnect_delay_ms: u64,
    /// `None` retries forever.
    pub max_reconnects: Option<u32>,
}

impl Default for SocketClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            path: "/eventbus/start.to.server".to_string(),
            reply: "Pong".to_string(),
            reconnect_delay_ms: 5_000,
            max_reconnects: None,
        }
    }
}

impl SocketClientConfig {
    pub fn url(&self) -> String {
        format!("ws://{}:{}{}", self.host, self.port, self.path)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketServerConfig {
    pub host: String,
    pub port: u16,
    /// Handshakes whose path does not start with this are refused.
    pub path_prefix: String,
    pub reply: String,
}

impl Default for SocketServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            path_prefix: "/eventbus/".to_string(),
            reply: "Ping".to_string(),
        }
    }
}

impl SocketServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = WikiConfig::from_toml_str("").unwrap();
        assert_eq!(config, WikiConfig::default());
        assert_eq!(config.database.queue, "wikidb.queue");
        assert_eq!(config.database.max_pool_size, 30);
        assert_eq!(config.bus.request_timeout(), Duration::from_secs(30));
        assert_eq!(
            config.socket_client.url(),
            "ws://localhost:8080/eventbus/start.to.server"
        );
        assert_eq!(config.socket_client.max_reconnects, None);
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let config = WikiConfig::from_toml_str(
            r#"
            [database]
            queue = "pages"

            [socket_client]
            reconnect_delay_ms = 250
            max_reconnects = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.database.queue, "pages");
        assert_eq!(config.database.operation_timeout_ms, 10_000);
        assert_eq!(config.socket_client.reconnect_delay(), Duration::from_millis(250));
        assert_eq!(config.socket_client.max_reconnects, Some(3));
        assert_eq!(config.socket_client.reply, "Pong");
    }

    #[test]
    fn wrong_types_are_rejected() {
        let result = WikiConfig::from_toml_str("[socket_server]\nport = \"eighty\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chat]\ninbound = \"in\"\noutbound = \"out\"").unwrap();

        let config = WikiConfig::load(file.path()).unwrap();
        assert_eq!(config.chat.inbound, "in");
        assert_eq!(config.chat.outbound, "out");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = WikiConfig::load(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
