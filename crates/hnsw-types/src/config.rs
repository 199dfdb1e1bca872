//! Configuration loading for hnsw-index.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/hnsw-index/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::graph::GraphParams;

/// Parameters used when a graph is created without explicit values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDefaults {
    #[serde(default = "default_dim")]
    pub dim: usize,

    /// Layer-count parameter M
    #[serde(default = "default_m")]
    pub m: u8,

    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,
}

fn default_dim() -> usize {
    50
}

fn default_m() -> u8 {
    5
}

fn default_ef_construction() -> usize {
    10
}

impl Default for GraphDefaults {
    fn default() -> Self {
        Self {
            dim: default_dim(),
            m: default_m(),
            ef_construction: default_ef_construction(),
        }
    }
}

impl GraphDefaults {
    pub fn params(&self) -> GraphParams {
        GraphParams::new(self.dim, self.m, self.ef_construction)
    }
}

/// Query-time defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDefaults {
    /// Number of results returned
    #[serde(default = "default_k")]
    pub k: usize,

    /// Beam width at layer 0
    #[serde(default = "default_ef")]
    pub ef: usize,
}

fn default_k() -> usize {
    10
}

fn default_ef() -> usize {
    20
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            k: default_k(),
            ef: default_ef(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the RocksDB directory holding every graph
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub graph: GraphDefaults,

    #[serde(default)]
    pub search: SearchDefaults,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "hnsw-index")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./hnsw-data"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            graph: GraphDefaults::default(),
            search: SearchDefaults::default(),
        }
    }
}

/// HNSW_DB_PATH, HNSW_LOG_LEVEL, HNSW_GRAPH__M, HNSW_SEARCH__EF, ...
fn environment() -> Environment {
    Environment::with_prefix("HNSW")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/hnsw-index/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (HNSW_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir = ProjectDirs::from("", "", "hnsw-index")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Self::load_layers(&config_dir.join("config"), cli_config_path, environment())
    }

    fn load_layers(
        default_config_path: &Path,
        cli_config_path: Option<&str>,
        env: Environment,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())?
            .set_default("log_level", default_log_level())?
            .set_default("graph.dim", default_dim() as i64)?
            .set_default("graph.m", i64::from(default_m()))?
            .set_default("graph.ef_construction", default_ef_construction() as i64)?
            .set_default("search.k", default_k() as i64)?
            .set_default("search.ef", default_ef() as i64)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        let settings: Settings = builder.add_source(env).build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.graph.params().validate()?;
        if self.search.k == 0 {
            return Err(ConfigError::Invalid("search.k must be > 0".to_string()));
        }
        if self.search.ef == 0 {
            return Err(ConfigError::Invalid("search.ef must be > 0".to_string()));
        }
        Ok(())
    }

    /// Expand ~ in db_path to the home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        if let Some(rest) = self.db_path.strip_prefix("~/") {
            if let Some(home) = std::env::var_os("HOME") {
                return PathBuf::from(home).join(rest);
            }
        }
        PathBuf::from(&self.db_path)
    }
}
