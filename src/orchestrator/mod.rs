//! End-to-end flow of one invocation
//!
//! Source sync and bootstrap always run first. Then, unless only setup was
//! requested, the host is checked, prerequisites are resolved, and exactly
//! one of IDE tooling, project generation or build (with optional archive
//! and run) is performed.

pub mod bootstrap;
pub mod state;

pub use bootstrap::{Bootstrap, IdeSettings, ResourceBundle};
pub use state::{BuildState, BuildTracker};

use crate::builders::{
    create_builder, BuildArtifact, BuildConfiguration, BuildContext, BuildType, Framework, FrameworkBuilder,
    ProjectLayout, RunOutcome,
};
use crate::config::Config;
use crate::error::{SparkleError, SparkleResult};
use crate::platform::{Host, HostOs};
use crate::prerequisites::{ResolveContext, Resolver, ToolKind};
use crate::process::{capture, CommandLine};
use crate::ui;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What an invocation ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    SetupOnly,
    IdeTooling(PathBuf),
    Generated(PathBuf),
    Built {
        artifact: BuildArtifact,
        product: Option<PathBuf>,
        run: Option<RunOutcome>,
    },
}

/// Fail unless the framework can be built on this host
pub fn check_platform(framework: Framework, host: Host) -> SparkleResult<()> {
    if framework.requires_macos() && !host.is_macos() {
        return Err(SparkleError::PlatformUnsupported {
            framework: framework.to_string(),
            requires: HostOs::MacOS.to_string(),
            host: host.os.to_string(),
        });
    }
    Ok(())
}

/// The builder's tools plus the graphics SDK and shader compiler every
/// framework needs
pub fn required_tools(builder: &dyn FrameworkBuilder, host: Host) -> Vec<ToolKind> {
    let mut tools = builder.required_tools(host);
    for shared in [ToolKind::VulkanSdk, ToolKind::Slang] {
        if !tools.contains(&shared) {
            tools.push(shared);
        }
    }
    tools
}

/// Copy an archive to `product/{os}-{framework}-{build type}{ext}`,
/// replacing a previous copy
pub async fn copy_product(
    layout: &ProjectLayout,
    os: HostOs,
    framework: Framework,
    build_type: BuildType,
    archive: &Path,
) -> SparkleResult<PathBuf> {
    let dest = layout.product_path(os, framework, build_type, archive);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SparkleError::io(format!("creating {}", parent.display()), e))?;
    }
    if tokio::fs::symlink_metadata(&dest).await.is_ok() {
        tokio::fs::remove_file(&dest)
            .await
            .map_err(|e| SparkleError::io(format!("replacing {}", dest.display()), e))?;
    }
    tokio::fs::copy(archive, &dest)
        .await
        .map_err(|e| SparkleError::io(format!("copying {} to {}", archive.display(), dest.display()), e))?;
    info!("Build products copied to {}", dest.display());
    Ok(dest)
}

/// `git submodule update --init --recursive` in the project root
pub async fn sync_sources(cx: &ResolveContext) -> SparkleResult<()> {
    let cmd = CommandLine::new("git")
        .args(["submodule", "update", "--init", "--recursive"])
        .current_dir(&cx.project_root);
    let output = capture(&cmd)
        .await
        .map_err(|e| SparkleError::SourceSyncFailed(format!("{} (is git installed?)", e)))?;
    if !output.status.success() {
        return Err(SparkleError::SourceSyncFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    ui::step_ok(cx.ui(), "Git submodules up to date");
    Ok(())
}

/// Runs one invocation against a project
pub struct Orchestrator {
    config: BuildConfiguration,
    settings: Config,
    cx: ResolveContext,
}

impl Orchestrator {
    pub fn new(config: BuildConfiguration, settings: Config, cx: ResolveContext) -> Self {
        Self { config, settings, cx }
    }

    fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(&self.cx.project_root, &self.settings.paths)
    }

    fn bootstraps(&self) -> Vec<Box<dyn Bootstrap>> {
        vec![
            Box::new(ResourceBundle::new(self.settings.resources.url.clone())),
            Box::new(IdeSettings),
        ]
    }

    /// Sync sources and run every bootstrap step
    pub async fn setup(&self) -> SparkleResult<()> {
        ui::section(self.cx.ui(), "Setup");
        sync_sources(&self.cx).await?;

        let layout = self.layout();
        for step in self.bootstraps() {
            debug!("Bootstrap: {}", step.name());
            step.run(&self.cx, &layout).await?;
        }
        Ok(())
    }

    pub async fn execute(self) -> SparkleResult<Outcome> {
        self.setup().await?;
        if self.config.setup_only {
            ui::step_info(self.cx.ui(), "Setup-only mode, skipping build");
            return Ok(Outcome::SetupOnly);
        }

        let host = self.cx.host;
        let framework = self.config.framework;
        check_platform(framework, host)?;

        let builder = create_builder(framework);
        ui::section(self.cx.ui(), "Prerequisites");
        let tools = required_tools(builder.as_ref(), host);
        let mut resolver = Resolver::new(self.cx.clone());
        let toolchain = resolver.toolchain(&tools).await?;

        let ctx = BuildContext {
            layout: self.layout(),
            config: self.config,
            toolchain,
            settings: self.settings,
            resolve: self.cx,
        };
        run_stages(builder.as_ref(), &ctx).await
    }
}

/// Exactly one of IDE tooling, generation or build (+ archive, + run)
async fn run_stages(builder: &dyn FrameworkBuilder, ctx: &BuildContext) -> SparkleResult<Outcome> {
    let mut tracker = BuildTracker::new(ctx.framework());

    if ctx.config.ide_tooling_only {
        ui::section(ctx.ui(), "Configuring IDE tooling");
        let dir = builder.configure_for_ide_tooling(ctx).await?;
        tracker.advance(BuildState::Configured)?;
        return Ok(Outcome::IdeTooling(dir));
    }
    if ctx.config.generate_only {
        ui::section(ctx.ui(), "Generating project");
        let dir = builder.generate_project(ctx).await?;
        tracker.advance(BuildState::Configured)?;
        return Ok(Outcome::Generated(dir));
    }

    ui::section(ctx.ui(), "Building");
    let artifact = builder.build(ctx).await?;
    tracker.advance(BuildState::Configured)?;
    tracker.advance(BuildState::Built)?;
    ui::step_ok_detail(ctx.ui(), "Build complete", &artifact.path.display().to_string());

    let mut product = None;
    if ctx.config.archive {
        ui::section(ctx.ui(), "Archiving");
        let archived = builder.archive(ctx).await?;
        tracker.advance(BuildState::Archived)?;
        if archived.signed {
            tracker.advance(BuildState::Signed)?;
        }
        product = Some(copy_product(&ctx.layout, ctx.host().os, ctx.framework(), ctx.build_type(), &archived.path).await?);
    }

    let mut run = None;
    if ctx.config.run {
        ui::section(ctx.ui(), "Running");
        let outcome = builder.run(ctx).await?;
        tracker.advance(BuildState::Launched)?;
        if let RunOutcome::Exited { code, .. } = &outcome {
            if *code != 0 {
                ui::step_warn(ctx.ui(), &format!("Application exited with code {}", code));
            }
        }
        run = Some(outcome);
    }

    Ok(Outcome::Built { artifact, product, run })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::builder::testing::build_context;
    use crate::config::schema::PathsConfig;
    use crate::platform::Arch;
    use crate::prerequisites::context::testing::context;
    use std::sync::Arc;
    use tempfile::TempDir;

    const LINUX: Host = Host {
        os: HostOs::Linux,
        arch: Arch::X86_64,
    };

    #[test]
    fn apple_frameworks_need_macos() {
        let err = check_platform(Framework::Ios, LINUX).unwrap_err();
        assert_eq!(err.to_string(), "'ios' requires a macOS host, but this host is Linux");

        assert!(check_platform(Framework::Macos, Host::new(HostOs::Windows, Arch::X86_64)).is_err());
        assert!(check_platform(Framework::Macos, Host::new(HostOs::MacOS, Arch::Aarch64)).is_ok());
        assert!(check_platform(Framework::Android, LINUX).is_ok());
    }

    #[test]
    fn shared_tools_added_once() {
        let tools = required_tools(create_builder(Framework::Glfw).as_ref(), LINUX);
        assert_eq!(
            tools,
            vec![ToolKind::Cmake, ToolKind::Ninja, ToolKind::Llvm, ToolKind::VulkanSdk, ToolKind::Slang]
        );
    }

    #[tokio::test]
    async fn product_copy_replaces_previous() {
        let temp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp.path(), &PathsConfig::default());
        let archive = temp.path().join("build_system/glfw/output/product.zip");
        std::fs::create_dir_all(archive.parent().unwrap()).unwrap();
        std::fs::write(&archive, b"new").unwrap();

        let product = temp.path().join("build_system/glfw/product/linux-glfw-Release.zip");
        std::fs::create_dir_all(product.parent().unwrap()).unwrap();
        std::fs::write(&product, b"old").unwrap();

        let copied = copy_product(&layout, HostOs::Linux, Framework::Glfw, BuildType::Release, &archive)
            .await
            .unwrap();
        assert_eq!(copied, product);
        assert_eq!(std::fs::read(&product).unwrap(), b"new");
    }

    #[tokio::test]
    async fn source_sync_outside_repository_fails() {
        let temp = TempDir::new().unwrap();
        let cx = context(temp.path(), Arc::default(), &[]);
        assert!(matches!(
            sync_sources(&cx).await,
            Err(SparkleError::SourceSyncFailed(_))
        ));
    }

    #[tokio::test]
    async fn ide_tooling_stops_after_configure() {
        let temp = TempDir::new().unwrap();
        let mut config = BuildConfiguration::new(Framework::Glfw, BuildType::Debug);
        config.ide_tooling_only = true;
        config.archive = true;
        let ctx = build_context(LINUX, temp.path(), config, &[]);

        // No CMake was resolved, so configuring fails before anything else runs
        let err = run_stages(create_builder(Framework::Glfw).as_ref(), &ctx).await.unwrap_err();
        assert!(matches!(err, SparkleError::Internal(ref msg) if msg.contains("CMake")));
        assert!(!temp.path().join("build_system/glfw/product").exists());
    }
}
