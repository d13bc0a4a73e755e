//! Error types for sparkle-build
//!
//! All modules use `SparkleResult<T>` as their return type. Every fatal
//! variant carries or maps to a remediation hint printed by `main`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sparkle-build operations
pub type SparkleResult<T> = Result<T, SparkleError>;

/// All errors that can occur while resolving prerequisites or building
#[derive(Error, Debug)]
pub enum SparkleError {
    // Prerequisite errors
    #[error("{tool} not found")]
    ToolNotFound { tool: String, hint: String },

    #[error("Failed to install {tool}: {reason}")]
    ToolInstallFailed {
        tool: String,
        reason: String,
        hint: String,
    },

    #[error("Required environment variable {var} is not set")]
    MissingEnvironment { var: String, hint: String },

    // Platform errors
    #[error("'{framework}' requires a {requires} host, but this host is {host}")]
    PlatformUnsupported {
        framework: String,
        requires: String,
        host: String,
    },

    // Toolchain errors
    #[error("Configure failed for {framework}. Check {} for details", log.display())]
    ConfigureFailed { framework: String, log: PathBuf },

    #[error("Build failed for {framework}. Check {} for details", log.display())]
    BuildFailed { framework: String, log: PathBuf },

    #[error("Source dependency sync failed: {0}")]
    SourceSyncFailed(String),

    #[error("Build artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    // Network errors
    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // Archive errors
    #[error("Unsupported archive format: {}", .0.display())]
    UnsupportedArchive(PathBuf),

    #[error("Refusing to extract unsafe archive entry '{entry}' from {}", archive.display())]
    UnsafeArchiveEntry { archive: PathBuf, entry: String },

    #[error("Failed to extract {}: {reason}", archive.display())]
    Extract { archive: PathBuf, reason: String },

    #[error("Failed to remove {} after {attempts} attempts", path.display())]
    RemoveFailed {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Invalid configuration at {}: {reason}", path.display())]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, output: {output}")]
    CommandExecution { command: String, output: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SparkleError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            output: output.into(),
        }
    }

    /// Create a tool-not-found error with a remediation hint
    pub fn tool_not_found(tool: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::ToolNotFound {
            tool: tool.into(),
            hint: hint.into(),
        }
    }

    /// Create a tool install failure with a remediation hint
    pub fn install_failed(
        tool: impl Into<String>,
        reason: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self::ToolInstallFailed {
            tool: tool.into(),
            reason: reason.into(),
            hint: hint.into(),
        }
    }

    /// Only transient network failures are retried automatically
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Download { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::ToolNotFound { hint, .. }
            | Self::ToolInstallFailed { hint, .. }
            | Self::MissingEnvironment { hint, .. } => Some(hint.clone()),
            Self::PlatformUnsupported { requires, .. } => Some(format!(
                "Run this on a {} host, or pick --framework glfw",
                requires
            )),
            Self::ConfigureFailed { log, .. } | Self::BuildFailed { log, .. } => {
                Some(format!("Inspect the toolchain log: {}", log.display()))
            }
            Self::SourceSyncFailed(_) => {
                Some("Run: git submodule update --init --recursive".to_string())
            }
            Self::ArtifactNotFound(_) => {
                Some("Run the build first (drop --generate-only / --ide-tooling-only)".to_string())
            }
            Self::Download { .. } => {
                Some("Check your network connection or download the file manually".to_string())
            }
            Self::ChecksumMismatch { path, .. } => Some(format!(
                "Delete {} and retry; update prerequisites.json if the release was re-published",
                path.display()
            )),
            Self::RemoveFailed { path, .. } => Some(format!(
                "Close programs holding files under {} and delete it manually",
                path.display()
            )),
            Self::ConfigInvalid { path, .. } => Some(format!("Fix or delete {}", path.display())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SparkleError::tool_not_found("Ninja", "Install from https://ninja-build.org");
        assert_eq!(err.to_string(), "Ninja not found");
    }

    #[test]
    fn error_hint() {
        let err = SparkleError::tool_not_found("JDK 17", "export JAVA_HOME=/opt/jdk");
        assert_eq!(err.hint().as_deref(), Some("export JAVA_HOME=/opt/jdk"));

        let err = SparkleError::BuildFailed {
            framework: "glfw".to_string(),
            log: PathBuf::from("/tmp/build.log"),
        };
        assert!(err.hint().unwrap().contains("/tmp/build.log"));
        assert!(err.to_string().contains("/tmp/build.log"));
    }

    #[test]
    fn error_retryable() {
        let download = SparkleError::Download {
            url: "https://example.com/a.zip".to_string(),
            reason: "timeout".to_string(),
        };
        assert!(download.is_retryable());
        assert!(!SparkleError::Internal("x".to_string()).is_retryable());
    }
}
