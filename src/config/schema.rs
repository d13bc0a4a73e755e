//! Configuration schema for sparkle-build
//!
//! Stored as `sparkle-build.toml` at the project root. Every section is
//! optional; missing keys take the defaults below.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application identity
    pub project: ProjectConfig,

    /// Directory layout relative to the project root
    pub paths: PathsConfig,

    /// Resource bundle bootstrap
    pub resources: ResourcesConfig,

    /// Android packaging and deployment
    pub android: AndroidConfig,

    /// Apple packaging and deployment
    pub apple: AppleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// CMake target and executable base name
    pub target: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            target: "sparkle".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Per-framework build trees (`<build_system>/<framework>/...`)
    pub build_system: String,

    /// Resource bundle directory
    pub resources: String,

    /// Editor settings templates
    pub ide: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            build_system: "build_system".to_string(),
            resources: "resources".to_string(),
            ide: "ide".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    /// Zip downloaded on first setup; nothing is fetched when unset
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AndroidConfig {
    /// Application id
    pub package: String,

    /// Activity class launched after install
    pub activity: String,

    /// Logcat tag followed during `--run`
    pub log_tag: String,
}

impl Default for AndroidConfig {
    fn default() -> Self {
        Self {
            package: "io.tqjxlm.sparkle".to_string(),
            activity: "VulkanActivity".to_string(),
            log_tag: "sparkle".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppleConfig {
    /// Bundle identifier launched on iOS devices
    pub bundle_id: String,

    /// Minimum iOS version
    pub deployment_target: String,
}

impl Default for AppleConfig {
    fn default() -> Self {
        Self {
            bundle_id: "io.tqjxlm.sparkle".to_string(),
            deployment_target: "18.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[project]"));
        assert!(toml.contains("[android]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.resources.url, None);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [android]
            package = "com.example.renderer"

            [resources]
            url = "https://example.com/resources.zip"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.android.package, "com.example.renderer");
        assert_eq!(config.android.activity, "VulkanActivity");
        assert_eq!(config.resources.url.as_deref(), Some("https://example.com/resources.zip"));
        assert_eq!(config.apple.deployment_target, "18.0");
    }
}
