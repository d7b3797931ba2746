//! Server configuration
//!
//! Read from, in order:
//! 1. the file named by the `KPI_CONFIG` environment variable
//! 2. `./kpi.toml` in the current directory
//! 3. built-in defaults

use retail_kpi::config::{CacheConfig, EngineConfig, WarehouseConfig};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "KPI_CONFIG";

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "kpi.toml";

/// Server configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Serve the Prometheus `/metrics` endpoint
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub warehouse: WarehouseConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_metrics: true,
            engine: EngineConfig::default(),
            cache: CacheConfig::default(),
            warehouse: WarehouseConfig::default(),
        }
    }
}

/// Load configuration from file or environment
pub fn load_config() -> ServerConfig {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        match read_config(Path::new(&path)) {
            Ok(config) => {
                info!(path = %path, "Loaded configuration from file");
                return config;
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Failed to load config file, using defaults");
            }
        }
    }

    if Path::new(DEFAULT_CONFIG_FILE).exists() {
        match read_config(Path::new(DEFAULT_CONFIG_FILE)) {
            Ok(config) => {
                info!("Loaded configuration from {}", DEFAULT_CONFIG_FILE);
                return config;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load {}, using defaults", DEFAULT_CONFIG_FILE);
            }
        }
    }

    info!("Using default configuration");
    ServerConfig::default()
}

/// Read and parse one config file
pub fn read_config(path: &Path) -> Result<ServerConfig, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    toml::from_str(&content).map_err(|e| e.to_string())
}
