//! Gradle wrapper jar
//!
//! The jar is project-local rather than cached; when it is missing it is
//! fetched for the Gradle version the wrapper properties pin.

use super::ResolveContext;
use crate::error::{SparkleError, SparkleResult};
use std::path::{Path, PathBuf};
use tracing::info;

/// Wrapper jar location inside an Android project
pub fn wrapper_jar(android_dir: &Path) -> PathBuf {
    android_dir.join("gradle").join("wrapper").join("gradle-wrapper.jar")
}

pub fn wrapper_properties(android_dir: &Path) -> PathBuf {
    android_dir.join("gradle").join("wrapper").join("gradle-wrapper.properties")
}

/// Gradle version from the `distributionUrl=...gradle-<version>-bin.zip` line
pub fn parse_gradle_version(properties: &str) -> Option<String> {
    let url = properties
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("distributionUrl="))?;

    url.match_indices("gradle-").find_map(|(start, _)| {
        let rest = &url[start + "gradle-".len()..];
        let version: String = rest.chars().take_while(|c| c.is_ascii_digit() || *c == '.').collect();
        let followed_by_dash = rest[version.len()..].starts_with('-');
        (!version.is_empty() && followed_by_dash).then_some(version)
    })
}

pub fn wrapper_jar_url(version: &str) -> String {
    format!(
        "https://raw.githubusercontent.com/gradle/gradle/v{}/gradle/wrapper/gradle-wrapper.jar",
        version
    )
}

/// Make sure `gradle/wrapper/gradle-wrapper.jar` exists, downloading it if needed
pub async fn ensure_wrapper_jar(cx: &ResolveContext, android_dir: &Path) -> SparkleResult<PathBuf> {
    let jar = wrapper_jar(android_dir);
    if jar.is_file() {
        return Ok(jar);
    }

    let properties_path = wrapper_properties(android_dir);
    let properties = tokio::fs::read_to_string(&properties_path)
        .await
        .map_err(|e| SparkleError::io(format!("reading {}", properties_path.display()), e))?;
    let version = parse_gradle_version(&properties).ok_or_else(|| SparkleError::ConfigInvalid {
        path: properties_path.clone(),
        reason: "no Gradle version in distributionUrl".to_string(),
    })?;

    info!("Downloading gradle-wrapper.jar for Gradle {}", version);
    let downloaded = cx.download(&wrapper_jar_url(&version), "gradle-wrapper").await?;
    if let Some(parent) = jar.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SparkleError::io(format!("creating {}", parent.display()), e))?;
    }
    tokio::fs::rename(&downloaded, &jar)
        .await
        .map_err(|e| SparkleError::io(format!("moving wrapper jar to {}", jar.display()), e))?;
    Ok(jar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prerequisites::context::testing::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    const PROPERTIES: &str = "distributionBase=GRADLE_USER_HOME\n\
        distributionPath=wrapper/dists\n\
        distributionUrl=https\\://services.gradle.org/distributions/gradle-8.11.1-bin.zip\n";

    #[test]
    fn version_from_distribution_url() {
        assert_eq!(parse_gradle_version(PROPERTIES).as_deref(), Some("8.11.1"));
        assert_eq!(
            parse_gradle_version("distributionUrl=https://example.com/gradle-8.9-all.zip").as_deref(),
            Some("8.9")
        );
        assert_eq!(parse_gradle_version("distributionBase=GRADLE_USER_HOME"), None);
    }

    #[tokio::test]
    async fn downloads_missing_jar() {
        let temp = TempDir::new().unwrap();
        let android = temp.path().join("android");
        std::fs::create_dir_all(android.join("gradle/wrapper")).unwrap();
        std::fs::write(wrapper_properties(&android), PROPERTIES).unwrap();

        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.serve(&wrapper_jar_url("8.11.1"), b"PK jar".to_vec());
        let cx = context(temp.path(), fetcher.clone(), &[]);

        let jar = ensure_wrapper_jar(&cx, &android).await.unwrap();
        assert_eq!(std::fs::read(&jar).unwrap(), b"PK jar");

        ensure_wrapper_jar(&cx, &android).await.unwrap();
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn properties_without_version_is_config_error() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("gradle/wrapper")).unwrap();
        std::fs::write(wrapper_properties(temp.path()), "distributionBase=GRADLE_USER_HOME\n").unwrap();
        let cx = context(temp.path(), Arc::default(), &[]);

        let err = ensure_wrapper_jar(&cx, temp.path()).await.unwrap_err();
        assert!(matches!(err, SparkleError::ConfigInvalid { .. }));
    }
}
