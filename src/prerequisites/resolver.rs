//! The fallback chain shared by every tool

use super::tools::{self, Installation, Tool};
use super::{ResolutionSource, ResolveContext, ResolvedTool, ToolKind, Toolchain};
use crate::archive::robust_remove;
use crate::error::{SparkleError, SparkleResult};
use crate::process::ToolEnv;
use crate::ui;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// Resolves tools once per process and remembers the answers
pub struct Resolver {
    cx: ResolveContext,
    resolved: HashMap<ToolKind, (ResolvedTool, ToolEnv)>,
}

impl Resolver {
    pub fn new(cx: ResolveContext) -> Self {
        Self {
            cx,
            resolved: HashMap::new(),
        }
    }

    pub fn context(&self) -> &ResolveContext {
        &self.cx
    }

    /// Resolve one tool, reusing an earlier result from this process
    pub async fn resolve(&mut self, kind: ToolKind) -> SparkleResult<ResolvedTool> {
        if let Some((tool, _)) = self.resolved.get(&kind) {
            return Ok(tool.clone());
        }

        let strategy = tools::for_kind(kind, &self.cx.manifest);
        let (install, source) = self.locate(strategy.as_ref()).await?;
        let env = strategy.environment(&install, &self.cx);

        let resolved = ResolvedTool {
            kind,
            version: strategy.version().map(str::to_string),
            root: install.root,
            path: install.path,
            source,
        };

        let label = match &resolved.version {
            Some(version) => format!("{} {}", kind, version),
            None => kind.to_string(),
        };
        ui::step_ok_detail(
            self.cx.ui(),
            &label,
            &format!("{}: {}", source, resolved.path.display()),
        );

        self.resolved.insert(kind, (resolved.clone(), env));
        Ok(resolved)
    }

    /// Resolve every tool in `kinds` into one toolchain
    pub async fn toolchain(&mut self, kinds: &[ToolKind]) -> SparkleResult<Toolchain> {
        let mut resolved = BTreeMap::new();
        let mut env = ToolEnv::new();
        for &kind in kinds {
            let tool = self.resolve(kind).await?;
            if let Some((_, tool_env)) = self.resolved.get(&kind) {
                env.extend(tool_env);
            }
            resolved.insert(kind, tool);
        }
        Ok(Toolchain::new(resolved, env))
    }

    /// Walk the chain: override, cache, system, package manager, install
    async fn locate(&self, tool: &dyn Tool) -> SparkleResult<(Installation, ResolutionSource)> {
        let kind = tool.kind();
        let host = self.cx.host;

        if let Some(var) = kind.override_var() {
            if let Some(value) = self.cx.var(var) {
                match tool.check_override(Path::new(&value), host) {
                    Some(found) => {
                        info!("Using {} from {}={}", kind, var, value);
                        return Ok((found, ResolutionSource::Override));
                    }
                    None => warn!("{}={} is not a valid {} installation, ignoring it", var, value, kind),
                }
            }
        }

        let entry = self.cx.cache.entry(kind, tool.version());
        if tokio::fs::symlink_metadata(&entry).await.is_ok() {
            if let Some(found) = tool.validate(&entry, host) {
                debug!("{} cache hit at {}", kind, entry.display());
                return Ok((found, ResolutionSource::Cache));
            }
            warn!("Cached {} at {} is incomplete, rebuilding it", kind, entry.display());
            robust_remove(&entry).await?;
        }

        if let Some(found) = tool.locate_system(&self.cx).await {
            return Ok((found, ResolutionSource::System));
        }

        if tool.install_with_package_manager(&self.cx).await {
            if let Some(found) = tool.locate_system(&self.cx).await {
                return Ok((found, ResolutionSource::PackageManager));
            }
            warn!("{} still not found after package manager install", kind);
        }

        if tool.can_install(host) {
            return match self.install(tool, &entry).await {
                Ok(found) => Ok((found, ResolutionSource::Download)),
                Err(e @ SparkleError::ToolInstallFailed { .. }) => Err(e),
                Err(e) => Err(SparkleError::install_failed(kind.to_string(), e.to_string(), tool.hint(host))),
            };
        }

        Err(SparkleError::tool_not_found(kind.to_string(), tool.hint(host)))
    }

    /// Install into staging, validate, then promote to the cache entry
    async fn install(&self, tool: &dyn Tool, entry: &Path) -> SparkleResult<Installation> {
        let kind = tool.kind();
        let host = self.cx.host;
        let cache = &self.cx.cache;
        let staging = cache.create_staging(kind, tool.version()).await?;

        let staged = match tool.install(&self.cx, &staging).await {
            Ok(()) => tool.validate(&staging, host).is_some(),
            Err(e) => {
                cache.discard(&staging).await;
                return Err(e);
            }
        };
        if !staged {
            cache.discard(&staging).await;
            return Err(SparkleError::install_failed(
                kind.to_string(),
                "installed files did not pass validation",
                tool.hint(host),
            ));
        }

        if let Err(e) = cache.promote(&staging, entry).await {
            cache.discard(&staging).await;
            return Err(e);
        }
        info!("Installed {} into {}", kind, entry.display());

        tool.validate(entry, host).ok_or_else(|| {
            SparkleError::install_failed(
                kind.to_string(),
                format!("{} did not pass validation after promotion", entry.display()),
                tool.hint(host),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Arch, Host, HostOs};
    use crate::prerequisites::context::testing::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    const NINJA_URL: &str = "https://github.com/ninja-build/ninja/releases/download/v1.12.1/ninja-linux.zip";

    fn ninja_release() -> Vec<u8> {
        zip_bytes(&[("ninja", b"#!/bin/sh\necho 1.12.1\n", 0o755)])
    }

    fn staging_entries(root: &Path) -> usize {
        std::fs::read_dir(root.join("build_cache/.staging"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resolve_downloads_once() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.serve(NINJA_URL, ninja_release());
        let cx = context(temp.path(), fetcher.clone(), &[]);

        let mut resolver = Resolver::new(cx.clone());
        let first = resolver.resolve(ToolKind::Ninja).await.unwrap();
        let second = resolver.resolve(ToolKind::Ninja).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.source, ResolutionSource::Download);
        assert_eq!(first.path, temp.path().join("build_cache/ninja/1.12.1/ninja"));

        // A later invocation finds the cache
        let mut again = Resolver::new(cx);
        let third = again.resolve(ToolKind::Ninja).await.unwrap();
        assert_eq!(third.path, first.path);
        assert_eq!(third.source, ResolutionSource::Cache);

        assert_eq!(fetcher.calls(), 1);
        assert_eq!(staging_entries(temp.path()), 0);
        assert!(!temp.path().join("build_cache/.downloads/ninja-linux.zip").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_cache_entry_is_rebuilt() {
        let temp = TempDir::new().unwrap();
        let entry = temp.path().join("build_cache/ninja/1.12.1");
        std::fs::create_dir_all(&entry).unwrap();
        std::fs::write(entry.join("half-extracted"), b"").unwrap();

        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.serve(NINJA_URL, ninja_release());
        let mut resolver = Resolver::new(context(temp.path(), fetcher.clone(), &[]));

        let ninja = resolver.resolve(ToolKind::Ninja).await.unwrap();
        assert_eq!(ninja.source, ResolutionSource::Download);
        assert!(!entry.join("half-extracted").exists());
        assert!(entry.join("ninja").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn valid_override_wins() {
        let temp = TempDir::new().unwrap();
        let ninja = temp.path().join("tools/ninja");
        write_executable(&ninja);
        let value = ninja.to_string_lossy().into_owned();

        let fetcher = Arc::new(FakeFetcher::default());
        let mut resolver = Resolver::new(context(temp.path(), fetcher.clone(), &[("NINJA_PATH", &value)]));

        let resolved = resolver.resolve(ToolKind::Ninja).await.unwrap();
        assert_eq!(resolved.source, ResolutionSource::Override);
        assert_eq!(resolved.path, ninja);
        assert_eq!(fetcher.calls(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_override_falls_through() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.serve(NINJA_URL, ninja_release());
        let mut resolver = Resolver::new(context(
            temp.path(),
            fetcher.clone(),
            &[("NINJA_PATH", "/definitely/not/ninja")],
        ));

        let resolved = resolver.resolve(ToolKind::Ninja).await.unwrap();
        assert_eq!(resolved.source, ResolutionSource::Download);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn system_path_before_download() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        write_executable(&bin.join("ninja"));
        let path = bin.to_string_lossy().into_owned();

        let fetcher = Arc::new(FakeFetcher::default());
        let mut resolver = Resolver::new(context(temp.path(), fetcher.clone(), &[("PATH", &path)]));

        let resolved = resolver.resolve(ToolKind::Ninja).await.unwrap();
        assert_eq!(resolved.source, ResolutionSource::System);
        assert_eq!(resolved.path, bin.join("ninja"));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn failed_download_leaves_nothing_behind() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let mut resolver = Resolver::new(context(temp.path(), fetcher.clone(), &[]));

        let err = resolver.resolve(ToolKind::Ninja).await.unwrap_err();
        assert!(matches!(err, SparkleError::ToolInstallFailed { .. }));
        assert!(err.hint().unwrap().contains("ninja"));
        assert!(!temp.path().join("build_cache/ninja/1.12.1").exists());
        assert_eq!(staging_entries(temp.path()), 0);
    }

    #[tokio::test]
    async fn archive_without_binary_is_not_promoted() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        fetcher.serve(NINJA_URL, zip_bytes(&[("README.md", b"nothing here", 0o644)]));
        let mut resolver = Resolver::new(context(temp.path(), fetcher, &[]));

        let err = resolver.resolve(ToolKind::Ninja).await.unwrap_err();
        assert!(err.to_string().contains("did not pass validation"));
        assert!(!temp.path().join("build_cache/ninja/1.12.1").exists());
        assert_eq!(staging_entries(temp.path()), 0);
    }

    #[tokio::test]
    async fn missing_jdk_names_java_home() {
        let temp = TempDir::new().unwrap();
        let host = Host::new(HostOs::Unsupported, Arch::X86_64);
        let mut resolver = Resolver::new(context_for(host, temp.path(), Arc::default(), &[]));

        let err = resolver.resolve(ToolKind::Jdk).await.unwrap_err();
        assert!(matches!(err, SparkleError::ToolNotFound { .. }));
        assert_eq!(err.to_string(), "JDK 17 not found");
        assert!(err.hint().unwrap().contains("JAVA_HOME"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn toolchain_merges_environments() {
        let temp = TempDir::new().unwrap();
        let slang_root = temp.path().join("slang");
        write_executable(&slang_root.join("bin/slangc"));
        let jdk_root = temp.path().join("jdk");
        write_executable(&jdk_root.join("bin/java"));
        let slang = slang_root.to_string_lossy().into_owned();
        let java_home = jdk_root.to_string_lossy().into_owned();

        let mut resolver = Resolver::new(context(
            temp.path(),
            Arc::default(),
            &[("SLANGC_PATH", &slang), ("JAVA_HOME", &java_home)],
        ));
        let toolchain = resolver.toolchain(&[ToolKind::Slang, ToolKind::Jdk]).await.unwrap();

        assert_eq!(toolchain.path(ToolKind::Slang).unwrap(), slang_root.join("bin/slangc"));
        assert_eq!(toolchain.env().get("JAVA_HOME"), Some(java_home.as_str()));
        assert_eq!(
            toolchain.env().get("SLANGC_PATH"),
            Some(slang_root.join("bin/slangc").to_string_lossy().as_ref())
        );
        assert!(toolchain.env().path_prefix().contains(&jdk_root.join("bin")));
    }
}
