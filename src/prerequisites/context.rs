//! Shared inputs of every tool strategy

use super::{DownloadRequest, Fetcher, ToolCache, VersionManifest};
use crate::error::{SparkleError, SparkleResult};
use crate::platform::Host;
use crate::process::{capture, probe, CommandLine, PACKAGE_MANAGER_TIMEOUT};
use crate::ui::{TaskSpinner, UiContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Read access to environment variables
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Look variables up in this process's environment
pub fn process_env() -> EnvLookup {
    Arc::new(|key| std::env::var(key).ok())
}

/// Host, cache, versions and I/O seams for one resolution run
#[derive(Clone)]
pub struct ResolveContext {
    pub host: Host,
    pub project_root: PathBuf,
    pub cache: ToolCache,
    pub manifest: VersionManifest,
    fetcher: Arc<dyn Fetcher>,
    env: EnvLookup,
    ui: UiContext,
}

impl ResolveContext {
    pub fn new(
        host: Host,
        project_root: impl Into<PathBuf>,
        manifest: VersionManifest,
        fetcher: Arc<dyn Fetcher>,
        env: EnvLookup,
        ui: UiContext,
    ) -> Self {
        let project_root = project_root.into();
        Self {
            host,
            cache: ToolCache::for_project(&project_root),
            project_root,
            manifest,
            fetcher,
            env,
            ui,
        }
    }

    /// Non-empty value of an environment variable
    pub fn var(&self, key: &str) -> Option<String> {
        (self.env)(key).filter(|v| !v.trim().is_empty())
    }

    /// Search the PATH this context sees for a program
    pub fn which(&self, program: &str) -> Option<PathBuf> {
        let name = self.host.os.exe(program);
        which::which_in(name, self.var("PATH"), &self.project_root).ok()
    }

    pub fn ui(&self) -> &UiContext {
        &self.ui
    }

    /// Download into `build_cache/.downloads/<file>`, verifying a pinned digest
    pub async fn download(&self, url: &str, tool_key: &str) -> SparkleResult<PathBuf> {
        let file_name = url.rsplit('/').next().unwrap_or(tool_key);
        let dest = self.cache.downloads_dir().join(file_name);
        self.download_to(url, &dest, tool_key).await?;
        Ok(dest)
    }

    /// Download to an exact destination, verifying a digest pinned under
    /// the destination's file name or `tool_key`
    pub async fn download_to(&self, url: &str, dest: &Path, tool_key: &str) -> SparkleResult<()> {
        let file_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let request = DownloadRequest::new(url, dest).with_sha256(self.manifest.digest_for(&file_name, tool_key));
        self.fetcher.fetch(&request).await
    }

    /// Best-effort package manager install.
    ///
    /// Never fails: a missing package manager, a non-zero exit or the
    /// timeout all just report `false`.
    pub async fn package_manager_install(&self, cmd: CommandLine, label: &str) -> bool {
        let mut spinner = TaskSpinner::new(&self.ui);
        spinner.start(&format!("Installing {} via {}...", label, program_name(&cmd)));

        match probe(&cmd, PACKAGE_MANAGER_TIMEOUT).await {
            Ok(output) if output.status.success() => {
                spinner.stop(&format!("Installed {}", label));
                true
            }
            Ok(output) => {
                debug!("{} stderr: {}", cmd, String::from_utf8_lossy(&output.stderr));
                spinner.stop_warn(&format!("Could not install {} via {}", label, program_name(&cmd)));
                false
            }
            Err(e) => {
                warn!("{} unavailable: {}", program_name(&cmd), e);
                spinner.stop_warn(&format!("Could not install {} via {}", label, program_name(&cmd)));
                false
            }
        }
    }

    /// Run one required install step (clone, bootstrap, SDK installer)
    /// behind a spinner; a non-zero exit is an error carrying stderr.
    pub async fn run_install_step(&self, cmd: CommandLine, label: &str) -> SparkleResult<()> {
        let mut spinner = TaskSpinner::new(&self.ui);
        spinner.start(&format!("{}...", label));
        let output = capture(&cmd).await?;
        if output.status.success() {
            spinner.stop(label);
            Ok(())
        } else {
            spinner.stop_warn(&format!("{} failed", label));
            Err(SparkleError::command_exec(
                cmd.to_string(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ))
        }
    }
}

fn program_name(cmd: &CommandLine) -> String {
    Path::new(cmd.program())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| cmd.program().to_string_lossy().into_owned())
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_variables_are_unset() {
        let temp = TempDir::new().unwrap();
        let cx = context(temp.path(), Arc::default(), &[("LLVM", "  "), ("VULKAN_SDK", "/sdk")]);
        assert_eq!(cx.var("LLVM"), None);
        assert_eq!(cx.var("VULKAN_SDK").as_deref(), Some("/sdk"));
        assert_eq!(cx.var("JAVA_HOME"), None);
    }

    #[test]
    #[serial_test::serial]
    fn process_env_sees_live_changes() {
        let lookup = process_env();
        std::env::remove_var("SPARKLE_BUILD_PROBE");
        assert_eq!(lookup("SPARKLE_BUILD_PROBE"), None);

        std::env::set_var("SPARKLE_BUILD_PROBE", "1.4.313.0");
        assert_eq!(lookup("SPARKLE_BUILD_PROBE").as_deref(), Some("1.4.313.0"));
        std::env::remove_var("SPARKLE_BUILD_PROBE");
    }

    #[cfg(unix)]
    #[test]
    fn which_uses_context_path() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        write_executable(&bin.join("ninja"));

        let path = bin.to_string_lossy().into_owned();
        let cx = context(temp.path(), Arc::default(), &[("PATH", &path)]);
        assert_eq!(cx.which("ninja"), Some(bin.join("ninja")));
        assert_eq!(cx.which("cmake"), None);
    }

    #[tokio::test]
    async fn download_counts_calls() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.serve("https://example.com/a.zip", b"zip".to_vec());
        let cx = context(temp.path(), fetcher.clone(), &[]);

        let path = cx.download("https://example.com/a.zip", "a").await.unwrap();
        assert_eq!(path, temp.path().join("build_cache/.downloads/a.zip"));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn package_manager_missing_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let cx = context(temp.path(), Arc::default(), &[]);
        let installed = cx
            .package_manager_install(CommandLine::new("definitely-not-a-package-manager").arg("install"), "glfw")
            .await;
        assert!(!installed);
    }
}
