//! Configuration structs with defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener settings.
    pub network: NetworkConfig,
    /// World generation and residency settings.
    pub world: WorldConfig,
    /// Session settings.
    pub session: SessionConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind.
    pub bind_address: String,
    /// Port to listen on.
    pub port: u16,
    /// Maximum concurrent client connections.
    pub max_connections: u32,
}

/// World configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World seed for procedural generation.
    pub seed: u64,
    /// Load radius in chunks around each anchor.
    pub load_radius: u32,
    /// Path of the chunk store file; `None` disables persistence.
    pub persistence_path: Option<PathBuf>,
    /// Configured load anchors, in absolute block coordinates.
    pub anchors: Vec<(i64, i64, i64)>,
    /// How often the anchor-maintenance loop runs, in milliseconds.
    pub maintenance_interval_ms: u64,
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds a session survives without a refresh.
    pub timeout_secs: u64,
    /// Require the acting player to hold a live session for block edits.
    pub require_session_for_edits: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Log filter (e.g. "info", "debug", "strata_net=trace").
    pub log_level: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 7878,
            max_connections: 64,
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            load_radius: 2,
            persistence_path: None,
            anchors: vec![(0, 0, 0)],
            maintenance_interval_ms: 500,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            require_session_for_edits: false,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

// --- Load / Save ---

impl Config {
    /// Loads `server.ron` from the given directory, writing a default
    /// config file first if none exists.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("server.ron");

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            tracing::info!("loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            tracing::info!("created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Saves this config to `server.ron` in the given directory.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let pretty = ron::ser::PrettyConfig::new().depth_limit(3);
        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;
        std::fs::write(config_dir.join("server.ron"), serialized)
            .map_err(ConfigError::WriteError)?;
        Ok(())
    }
}
