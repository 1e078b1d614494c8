//! Server configuration loaded from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ServerError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

/// Listener and connection-cap settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_clients: default_max_clients(),
            log_level: default_log_level(),
        }
    }
}

/// Live control and watch session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_frame_port")]
    pub frame_port: u16,
    #[serde(default = "default_pointer_port")]
    pub pointer_port: u16,
    #[serde(default = "default_keyboard_port")]
    pub keyboard_port: u16,
    /// Fraction of the native screen size advertised to session clients.
    #[serde(default = "default_size_factor")]
    pub size_factor: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            frame_port: default_frame_port(),
            pointer_port: default_pointer_port(),
            keyboard_port: default_keyboard_port(),
            size_factor: default_size_factor(),
        }
    }
}

/// File transfer and screenshot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            screenshot_dir: default_screenshot_dir(),
        }
    }
}

impl Config {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.control.size_factor <= 0.0 || self.control.size_factor > 1.0 {
            return Err(ServerError::Config(format!(
                "size_factor must be within (0, 1], got {}",
                self.control.size_factor
            )));
        }
        if self.transfer.chunk_size == 0 {
            return Err(ServerError::Config(
                "chunk_size must be non-zero".to_string(),
            ));
        }

        // Port 0 binds ephemerally and never collides.
        let mut ports: Vec<u16> = [
            self.server.port,
            self.control.frame_port,
            self.control.pointer_port,
            self.control.keyboard_port,
        ]
        .into_iter()
        .filter(|port| *port != 0)
        .collect();
        ports.sort_unstable();
        if ports.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(ServerError::Config(
                "listener ports must be distinct".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from the given path, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config, ServerError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path(),
    };

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ServerError::Config(format!("failed to read config: {e}")))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ServerError::Config(format!("failed to parse config: {e}")))?;
        info!(path = %config_path.display(), "loaded config");
        Ok(config)
    } else {
        info!("no config file found, using defaults");
        Ok(Config::default())
    }
}

/// Get the default config directory path.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("deskhand")
}

/// Get the default config file path.
fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    34981
}

fn default_max_clients() -> usize {
    20
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_frame_port() -> u16 {
    34982
}

fn default_pointer_port() -> u16 {
    34983
}

fn default_keyboard_port() -> u16 {
    34984
}

fn default_size_factor() -> f64 {
    0.9
}

fn default_chunk_size() -> usize {
    8192
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("screenshots")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("port = 34981"));
    }

    #[test]
    fn parse_example_config() {
        let toml_str = r#"
[server]
bind = "127.0.0.1"
port = 34981
max_clients = 5
log_level = "debug"

[control]
frame_port = 34982
pointer_port = 34983
keyboard_port = 34984
size_factor = 0.75

[transfer]
chunk_size = 4096
screenshot_dir = "/var/lib/deskhand/shots"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.max_clients, 5);
        assert_eq!(config.control.size_factor, 0.75);
        assert_eq!(config.transfer.chunk_size, 4096);
        assert_eq!(
            config.transfer.screenshot_dir,
            PathBuf::from("/var/lib/deskhand/shots")
        );
        config.validate().expect("example config should validate");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: Config = toml::from_str("[server]\nport = 4000\n").unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.max_clients, 20);
        assert_eq!(config.control.frame_port, 34982);
        assert_eq!(config.transfer.chunk_size, 8192);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = Config::default();
        config.control.size_factor = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.transfer.chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.control.frame_port = config.server.port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn ephemeral_ports_never_collide() {
        let mut config = Config::default();
        config.server.port = 0;
        config.control.frame_port = 0;
        config.control.pointer_port = 0;
        config.control.keyboard_port = 0;
        config.validate().expect("port 0 is always allowed");
    }
}
