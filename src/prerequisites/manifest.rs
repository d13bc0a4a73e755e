//! Tool version manifest (`prerequisites.json`)

use crate::error::SparkleResult;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// File name at the project root
pub const MANIFEST_FILE: &str = "prerequisites.json";

const KNOWN_KEYS: [&str; 5] = ["cmake", "ninja", "VulkanSDK", "slang", "cmake_minimum"];

/// Pinned versions shared by every resolver call site
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VersionManifest {
    pub cmake: String,
    pub ninja: String,
    #[serde(rename = "VulkanSDK")]
    pub vulkan_sdk: String,
    pub slang: String,
    /// Oldest CMake accepted from the system PATH
    pub cmake_minimum: String,
    /// Optional SHA-256 digests keyed by artifact file name or tool key
    pub sha256: BTreeMap<String, String>,
}

impl Default for VersionManifest {
    fn default() -> Self {
        Self {
            cmake: "3.30.5".to_string(),
            ninja: "1.12.1".to_string(),
            vulkan_sdk: "1.4.313.0".to_string(),
            slang: "2026.1.1".to_string(),
            cmake_minimum: "3.24.0".to_string(),
            sha256: BTreeMap::new(),
        }
    }
}

impl VersionManifest {
    /// Load `prerequisites.json` from the project root.
    ///
    /// A missing or unreadable manifest is not fatal: built-in versions are
    /// used and a warning is logged.
    pub async fn load(project_root: &Path) -> Self {
        let path = project_root.join(MANIFEST_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match Self::parse(&content) {
                Ok(manifest) => {
                    debug!("Loaded tool versions from {}", path.display());
                    manifest
                }
                Err(e) => {
                    warn!("Could not parse {}: {}. Using built-in versions", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Could not load {}: {}. Using built-in versions", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse manifest JSON, warning about keys that fall back to defaults
    pub fn parse(content: &str) -> SparkleResult<Self> {
        let raw: serde_json::Value = serde_json::from_str(content)?;
        let missing: Vec<&str> = KNOWN_KEYS
            .iter()
            .copied()
            .filter(|key| raw.get(key).is_none())
            .collect();
        if !missing.is_empty() {
            warn!("{} has no entry for {}; using built-in defaults", MANIFEST_FILE, missing.join(", "));
        }
        Ok(serde_json::from_value(raw)?)
    }

    /// Digest for a downloaded artifact, by file name first, then tool key
    pub fn digest_for(&self, file_name: &str, tool_key: &str) -> Option<&str> {
        self.sha256
            .get(file_name)
            .or_else(|| self.sha256.get(tool_key))
            .map(String::as_str)
    }
}
