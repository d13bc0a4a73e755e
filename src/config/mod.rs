//! Project configuration for sparkle-build

pub mod schema;

pub use schema::Config;

use crate::error::{SparkleError, SparkleResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// File name looked up at the project root
pub const CONFIG_FILE: &str = "sparkle-build.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
    explicit: bool,
}

impl ConfigManager {
    /// Config at `<project_root>/sparkle-build.toml`
    pub fn new(project_root: &Path) -> Self {
        Self {
            config_path: project_root.join(CONFIG_FILE),
            explicit: false,
        }
    }

    /// Config at a user-supplied path, which must exist
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: path,
            explicit: true,
        }
    }

    /// Load configuration, falling back to defaults when the project has none
    pub async fn load(&self) -> SparkleResult<Config> {
        if !self.explicit && !self.config_path.exists() {
            debug!("{} not found, using defaults", self.config_path.display());
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> SparkleResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| SparkleError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| SparkleError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}
