//! Builder trait and the values flowing through the lifecycle

use super::{BuildType, Framework, ProjectLayout};
use crate::archive::robust_remove;
use crate::config::Config;
use crate::error::{SparkleError, SparkleResult};
use crate::platform::{Host, HostOs};
use crate::prerequisites::{ResolveContext, ToolKind, Toolchain};
use crate::process::{run_logged, CommandLine, ToolEnv};
use crate::ui::UiContext;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything one invocation asked for; never changes once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfiguration {
    pub framework: Framework,
    pub build_type: BuildType,
    pub clean: bool,
    pub generate_only: bool,
    pub ide_tooling_only: bool,
    pub archive: bool,
    pub run: bool,
    pub setup_only: bool,
    pub sanitizer: bool,
    pub profiler: bool,
    pub shader_debug: bool,
    pub apple_auto_sign: bool,
    /// Whitespace-separated extra `-D...` arguments
    pub extra_toolchain_args: String,
    /// Forwarded verbatim to the launched application
    pub passthrough_args: Vec<String>,
}

impl BuildConfiguration {
    pub fn new(framework: Framework, build_type: BuildType) -> Self {
        Self {
            framework,
            build_type,
            clean: false,
            generate_only: false,
            ide_tooling_only: false,
            archive: false,
            run: false,
            setup_only: false,
            sanitizer: false,
            profiler: false,
            shader_debug: false,
            apple_auto_sign: false,
            extra_toolchain_args: String::new(),
            passthrough_args: Vec::new(),
        }
    }

    /// Feature switches followed by the extra toolchain arguments
    pub fn cmake_options(&self) -> Vec<String> {
        let switch = |name: &str, on: bool| format!("-D{}={}", name, if on { "ON" } else { "OFF" });
        let mut options = vec![
            switch("ENABLE_PROFILER", self.profiler),
            switch("SHADER_DEBUG", self.shader_debug),
            switch("ENABLE_ASAN", self.sanitizer),
        ];
        options.extend(self.extra_toolchain_args.split_whitespace().map(str::to_string));
        options
    }
}

/// A built artifact at its canonical location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub path: PathBuf,
    pub platform: HostOs,
    pub framework: Framework,
    pub build_type: BuildType,
}

/// Result of `archive()`; `signed` is false when signing was skipped or degraded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOutcome {
    pub path: PathBuf,
    pub signed: bool,
}

/// How a local artifact is launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: ToolEnv,
}

impl LaunchSpec {
    pub fn command(&self) -> CommandLine {
        CommandLine::new(&self.program)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .env(&self.env)
    }
}

/// What `run()` ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Local process ran to completion
    Exited { launch: LaunchSpec, code: i32 },
    /// Installed and started on an attached device
    Deployed { device: String },
    /// Automatic deployment failed; manual steps were printed
    Manual,
}

/// Inputs shared by every lifecycle stage
pub struct BuildContext {
    pub config: BuildConfiguration,
    pub layout: ProjectLayout,
    pub toolchain: Toolchain,
    pub settings: Config,
    pub resolve: ResolveContext,
}

impl BuildContext {
    pub fn host(&self) -> Host {
        self.resolve.host
    }

    pub fn ui(&self) -> &UiContext {
        self.resolve.ui()
    }

    pub fn var(&self, key: &str) -> Option<String> {
        self.resolve.var(key)
    }

    pub fn framework(&self) -> Framework {
        self.config.framework
    }

    pub fn build_type(&self) -> BuildType {
        self.config.build_type
    }

    /// A command with the toolchain environment applied
    pub fn command(&self, program: impl Into<OsString>) -> CommandLine {
        CommandLine::new(program).env(self.toolchain.env())
    }

    /// The resolved CMake, working in `dir`
    pub fn cmake(&self, dir: &Path) -> SparkleResult<CommandLine> {
        let cmake = self.toolchain.path(ToolKind::Cmake)?;
        Ok(self.command(cmake).current_dir(dir))
    }

    /// Executable name of the application target on this host
    pub fn executable_name(&self) -> String {
        self.host().os.exe(&self.settings.project.target)
    }

    pub fn artifact(&self, path: PathBuf) -> BuildArtifact {
        BuildArtifact {
            path,
            platform: self.host().os,
            framework: self.framework(),
            build_type: self.build_type(),
        }
    }
}

/// Lifecycle every target platform implements
#[async_trait]
pub trait FrameworkBuilder: Send + Sync {
    fn framework(&self) -> Framework;

    /// Tools this framework needs on `host`
    fn required_tools(&self, host: Host) -> Vec<ToolKind>;

    /// Canonical location of the build product
    fn artifact_path(&self, ctx: &BuildContext) -> PathBuf;

    /// Configure a tree for language servers; returns its directory
    async fn configure_for_ide_tooling(&self, ctx: &BuildContext) -> SparkleResult<PathBuf>;

    /// Generate an IDE project; returns its directory
    async fn generate_project(&self, ctx: &BuildContext) -> SparkleResult<PathBuf>;

    async fn build(&self, ctx: &BuildContext) -> SparkleResult<BuildArtifact>;

    async fn archive(&self, ctx: &BuildContext) -> SparkleResult<ArchiveOutcome>;

    async fn run(&self, ctx: &BuildContext) -> SparkleResult<RunOutcome>;
}

/// Which lifecycle stage a logged command belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Configure,
    Build,
}

/// Run a toolchain command with a log, mapping failure to the stage's error
pub(crate) async fn run_stage(
    ctx: &BuildContext,
    stage: Stage,
    cmd: &CommandLine,
    log: &Path,
    description: &str,
) -> SparkleResult<()> {
    if run_logged(cmd, log, description).await? {
        return Ok(());
    }
    let framework = ctx.framework().to_string();
    let log = log.to_path_buf();
    Err(match stage {
        Stage::Configure => SparkleError::ConfigureFailed { framework, log },
        Stage::Build => SparkleError::BuildFailed { framework, log },
    })
}

/// Create a stage directory, emptying it first on `--clean`
pub(crate) async fn prepare_dir(dir: &Path, clean: bool) -> SparkleResult<()> {
    if clean {
        debug!("Cleaning {}", dir.display());
        robust_remove(dir).await?;
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| SparkleError::io(format!("creating {}", dir.display()), e))
}

/// Fail with `ArtifactNotFound` unless `path` exists
pub(crate) fn require_artifact(path: &Path) -> SparkleResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(SparkleError::ArtifactNotFound(path.to_path_buf()))
    }
}
