//! One-time project setup run before every build

use crate::archive::extract;
use crate::builders::ProjectLayout;
use crate::error::{SparkleError, SparkleResult};
use crate::prerequisites::ResolveContext;
use crate::ui;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A setup step that is a no-op once its result exists
#[async_trait]
pub trait Bootstrap: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, cx: &ResolveContext, layout: &ProjectLayout) -> SparkleResult<()>;
}

/// Downloads and unpacks the asset bundle into `resources/packed`.
///
/// The downloaded `resources.zip` doubles as the up-to-date marker.
pub struct ResourceBundle {
    url: Option<String>,
}

impl ResourceBundle {
    pub fn new(url: Option<String>) -> Self {
        Self { url }
    }

    pub fn archive_path(layout: &ProjectLayout) -> PathBuf {
        layout.resources_dir().join("resources.zip")
    }

    pub fn packed_dir(layout: &ProjectLayout) -> PathBuf {
        layout.resources_dir().join("packed")
    }
}

#[async_trait]
impl Bootstrap for ResourceBundle {
    fn name(&self) -> &'static str {
        "resources"
    }

    async fn run(&self, cx: &ResolveContext, layout: &ProjectLayout) -> SparkleResult<()> {
        let archive = Self::archive_path(layout);
        if archive.is_file() {
            ui::step_ok(cx.ui(), "Resources are up to date");
            return Ok(());
        }
        let Some(url) = self.url.as_deref() else {
            ui::step_warn_hint(
                cx.ui(),
                "No resource bundle configured, skipping",
                "Set [resources] url in sparkle-build.toml",
            );
            return Ok(());
        };

        info!("Setting up resources from {}", url);
        let packed = Self::packed_dir(layout);
        tokio::fs::create_dir_all(&packed)
            .await
            .map_err(|e| SparkleError::io(format!("creating {}", packed.display()), e))?;
        cx.download_to(url, &archive, "resources").await?;

        if let Err(e) = extract(&archive, &packed).await {
            warn!("Resource extraction failed, removing {}", archive.display());
            let _ = tokio::fs::remove_file(&archive).await;
            return Err(e);
        }
        ui::step_ok(cx.ui(), "Resources set up");
        Ok(())
    }
}

/// Seeds `<root>/.vscode` from the templates in `ide/.vscode`, never
/// overwriting a file the user already has
pub struct IdeSettings;

impl IdeSettings {
    async fn copy_missing(source: &Path, dest: &Path) -> SparkleResult<usize> {
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|e| SparkleError::io(format!("creating {}", dest.display()), e))?;

        let mut entries = tokio::fs::read_dir(source)
            .await
            .map_err(|e| SparkleError::io(format!("reading {}", source.display()), e))?;
        let mut copied = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SparkleError::io(format!("reading {}", source.display()), e))?
        {
            let target = dest.join(entry.file_name());
            if !entry.path().is_file() || target.exists() {
                continue;
            }
            tokio::fs::copy(entry.path(), &target)
                .await
                .map_err(|e| SparkleError::io(format!("copying {}", entry.path().display()), e))?;
            copied += 1;
        }
        Ok(copied)
    }
}

#[async_trait]
impl Bootstrap for IdeSettings {
    fn name(&self) -> &'static str {
        "editor settings"
    }

    async fn run(&self, cx: &ResolveContext, layout: &ProjectLayout) -> SparkleResult<()> {
        let source = layout.ide_dir().join(".vscode");
        if !source.is_dir() {
            debug!("No editor settings templates at {}", source.display());
            return Ok(());
        }

        let copied = Self::copy_missing(&source, &layout.root().join(".vscode")).await?;
        if copied > 0 {
            ui::step_ok(cx.ui(), &format!("Copied {} editor settings file(s)", copied));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PathsConfig;
    use crate::prerequisites::context::testing::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    const URL: &str = "https://example.com/bundle?dl=1";

    fn layout(root: &Path) -> ProjectLayout {
        ProjectLayout::new(root, &PathsConfig::default())
    }

    #[tokio::test]
    async fn resources_downloaded_once() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.serve(URL, zip_bytes(&[("textures/sky.ktx", b"KTX", 0o644)]));
        let cx = context(temp.path(), fetcher.clone(), &[]);
        let layout = layout(temp.path());
        let bundle = ResourceBundle::new(Some(URL.to_string()));

        bundle.run(&cx, &layout).await.unwrap();
        assert_eq!(
            std::fs::read(temp.path().join("resources/packed/textures/sky.ktx")).unwrap(),
            b"KTX"
        );

        bundle.run(&cx, &layout).await.unwrap();
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn corrupt_bundle_is_removed() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.serve(URL, b"not a zip".to_vec());
        let cx = context(temp.path(), fetcher, &[]);
        let layout = layout(temp.path());

        assert!(ResourceBundle::new(Some(URL.to_string())).run(&cx, &layout).await.is_err());
        assert!(!ResourceBundle::archive_path(&layout).exists());
    }

    #[tokio::test]
    async fn no_url_skips_download() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let cx = context(temp.path(), fetcher.clone(), &[]);

        ResourceBundle::new(None).run(&cx, &layout(temp.path())).await.unwrap();
        assert_eq!(fetcher.calls(), 0);
        assert!(!temp.path().join("resources/packed").exists());
    }

    #[tokio::test]
    async fn editor_settings_keep_user_files() {
        let temp = TempDir::new().unwrap();
        let templates = temp.path().join("ide/.vscode");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(templates.join("settings.json"), b"{\"template\": true}").unwrap();
        std::fs::write(templates.join("launch.json"), b"{}").unwrap();
        std::fs::create_dir_all(temp.path().join(".vscode")).unwrap();
        std::fs::write(temp.path().join(".vscode/settings.json"), b"{\"mine\": true}").unwrap();
        let cx = context(temp.path(), Arc::default(), &[]);

        IdeSettings.run(&cx, &layout(temp.path())).await.unwrap();
        assert_eq!(
            std::fs::read(temp.path().join(".vscode/settings.json")).unwrap(),
            b"{\"mine\": true}"
        );
        assert!(temp.path().join(".vscode/launch.json").is_file());
    }
}
