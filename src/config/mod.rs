//! Configuration module
//!
//! Handles loading and saving NetStream configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::broker::AllowList;
use crate::network::{NetworkConfig, TransportKind};
use crate::protocol::{
    DEFAULT_INGEST_PORT, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT, DEFAULT_WEBSOCKET_PORT,
};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub network: NetworkSettings,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub replay: ReplayConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Source id stamped on events this process produces
    #[serde(default = "default_source_id")]
    pub source_id: String,
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

fn default_source_id() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "netstream".to_string())
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            source_id: default_source_id(),
            verbose: false,
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Interface to bind to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Port subscribers connect to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Port producers push events to
    #[serde(default = "default_ingest_port")]
    pub ingest_port: u16,
    /// Extra WebSocket endpoint next to the main one (optional)
    pub websocket_port: Option<u16>,
    /// Transport of the main subscriber endpoint
    #[serde(default)]
    pub transport: TransportKind,
    /// Connection timeout in ms
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Largest message accepted or sent
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_ingest_port() -> u16 {
    DEFAULT_INGEST_PORT
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            ingest_port: default_ingest_port(),
            websocket_port: None,
            transport: TransportKind::default(),
            connect_timeout_ms: default_connect_timeout(),
            max_message_size: default_max_message_size(),
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Allowed subscriber IPs (empty = allow all)
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
}

/// History replay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Replay everything published so far to each new subscriber
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("netstream/config.toml")),
            Some(PathBuf::from("./netstream.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                tracing::debug!("Loading config from {}", path.display());
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Network settings for a listener or client on `port`
    pub fn network_config(&self, port: u16) -> NetworkConfig {
        NetworkConfig {
            bind_address: self.network.bind_address.clone(),
            port,
            connect_timeout_ms: self.network.connect_timeout_ms,
            max_message_size: self.network.max_message_size,
        }
    }

    /// The subscriber filter, if any hosts are configured
    pub fn allow_list(&self) -> Option<AllowList> {
        if self.security.allowed_hosts.is_empty() {
            return None;
        }
        Some(AllowList::from_config(&self.security.allowed_hosts))
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        general: GeneralConfig {
            source_id: "graph-producer".to_string(),
            verbose: false,
        },
        network: NetworkSettings {
            websocket_port: Some(DEFAULT_WEBSOCKET_PORT),
            ..Default::default()
        },
        security: SecurityConfig {
            allowed_hosts: vec!["127.0.0.1".to_string()],
        },
        ..Default::default()
    };

    Ok(toml::to_string_pretty(&config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.port, DEFAULT_PORT);
        assert_eq!(config.network.ingest_port, DEFAULT_INGEST_PORT);
        assert_eq!(config.network.transport, TransportKind::Tcp);
        assert!(config.replay.enabled);
        assert!(config.allow_list().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let mut config = Config::default();
        config.network.port = 3001;
        config.network.transport = TransportKind::WebSocket;
        let file = NamedTempFile::new().unwrap();

        config.save(file.path()).unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.network.port, 3001);
        assert_eq!(loaded.network.transport, TransportKind::WebSocket);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[network]\nport = 4000\n\n[replay]\nenabled = false").unwrap();

        let loaded = Config::load(file.path()).unwrap();
        assert_eq!(loaded.network.port, 4000);
        assert_eq!(loaded.network.ingest_port, DEFAULT_INGEST_PORT);
        assert!(!loaded.replay.enabled);
        assert!(!loaded.general.source_id.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_sample_config() {
        let sample = generate_sample_config().unwrap();
        let parsed: Config = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.general.source_id, "graph-producer");
        assert_eq!(parsed.network.websocket_port, Some(DEFAULT_WEBSOCKET_PORT));
        assert!(parsed.allow_list().is_some());
    }

    #[test]
    fn test_network_config() {
        let config = Config::default();
        let net = config.network_config(0);
        assert_eq!(net.port, 0);
        assert_eq!(net.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
    }
}
