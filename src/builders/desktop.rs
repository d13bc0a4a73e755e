//! Desktop (GLFW) builds: CMake + Ninja with clang, or clang-cl inside the
//! MSVC environment on Windows

use super::builder::{prepare_dir, require_artifact, run_stage, Stage};
use super::{ArchiveOutcome, BuildArtifact, BuildContext, Framework, FrameworkBuilder, LaunchSpec, RunOutcome};
use crate::archive::compress;
use crate::error::{SparkleError, SparkleResult};
use crate::platform::Host;
use crate::prerequisites::tools::{Vcpkg, VisualStudio};
use crate::prerequisites::ToolKind;
use crate::process::{run_inherited, CommandLine};
use crate::ui;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Which tree a configure run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigureMode {
    /// Ninja tree that is built afterwards
    Build,
    /// Ninja tree exporting `compile_commands.json`
    IdeTooling,
    /// Visual Studio solution, compilers chosen by the IDE
    Solution,
}

pub struct DesktopBuilder;

impl DesktopBuilder {
    fn configure_dir(&self, ctx: &BuildContext, mode: ConfigureMode) -> PathBuf {
        match mode {
            ConfigureMode::Solution => ctx.layout.project_dir(Framework::Glfw),
            _ => ctx.layout.output_dir(Framework::Glfw),
        }
    }

    fn build_threads(host: Host) -> u32 {
        if host.is_windows() {
            64
        } else {
            16
        }
    }

    /// Xcode clang on macOS resolves through the LLVM prefix `/usr`
    fn compiler_args(&self, ctx: &BuildContext) -> SparkleResult<Vec<String>> {
        if ctx.host().is_windows() {
            let vs = ctx.toolchain.root(ToolKind::VisualStudio)?;
            if !VisualStudio::clang_cl(vs).is_file() {
                return Err(SparkleError::tool_not_found(
                    "clang-cl",
                    "Install the 'C++ Clang Compiler for Windows' component in the Visual Studio Installer",
                ));
            }
            return Ok(vec![
                "-DCMAKE_CXX_COMPILER=clang-cl".to_string(),
                "-DCMAKE_C_COMPILER=clang-cl".to_string(),
            ]);
        }

        let llvm = ctx.toolchain.root(ToolKind::Llvm)?;
        let bin = llvm.join("bin");
        Ok(vec![
            format!("-DCMAKE_C_COMPILER={}", bin.join("clang").display()),
            format!("-DCMAKE_CXX_COMPILER={}", bin.join("clang++").display()),
        ])
    }

    fn vcpkg_toolchain_args(&self, ctx: &BuildContext) -> Vec<String> {
        if !ctx.host().is_windows() {
            return Vec::new();
        }
        if let Ok(root) = ctx.toolchain.root(ToolKind::Vcpkg) {
            let file = Vcpkg::toolchain_file(root);
            if file.is_file() {
                return vec![format!("-DCMAKE_TOOLCHAIN_FILE={}", file.display())];
            }
            warn!("vcpkg.cmake not found at {}", file.display());
        }
        warn!("vcpkg toolchain is not used; CMake must find the dependency libraries itself");
        Vec::new()
    }

    /// The CMake configure invocation, before any MSVC wrapping
    fn configure_command(&self, ctx: &BuildContext, mode: ConfigureMode) -> SparkleResult<CommandLine> {
        let dir = self.configure_dir(ctx, mode);
        let mut cmd = ctx.cmake(&dir)?.arg(ctx.layout.root());

        if mode != ConfigureMode::Solution {
            let ninja = ctx.toolchain.path(ToolKind::Ninja)?;
            cmd = cmd.args([
                "-G".to_string(),
                "Ninja".to_string(),
                format!("-DCMAKE_BUILD_TYPE={}", ctx.build_type()),
                format!("-DCMAKE_MAKE_PROGRAM={}", ninja.display()),
            ]);
        }

        cmd = cmd.args(ctx.config.cmake_options());
        if mode != ConfigureMode::Solution {
            cmd = cmd.args(self.compiler_args(ctx)?);
        }
        cmd = cmd.arg("-DUSE_GLFW=ON").args(self.vcpkg_toolchain_args(ctx));

        if mode == ConfigureMode::IdeTooling {
            cmd = cmd.arg("-DCMAKE_EXPORT_COMPILE_COMMANDS=ON");
        }
        Ok(cmd)
    }

    /// Windows commands run inside `vcvars64.bat` through a generated script
    async fn with_msvc(&self, ctx: &BuildContext, cmd: CommandLine, dir: &Path, name: &str) -> SparkleResult<CommandLine> {
        if !ctx.host().is_windows() {
            return Ok(cmd);
        }

        let vs = ctx.toolchain.root(ToolKind::VisualStudio)?;
        let mut line = format!("\"{}\"", cmd.program().to_string_lossy());
        for arg in cmd.arguments() {
            line.push_str(&format!(" \"{}\"", arg.to_string_lossy()));
        }
        let script = format!(
            "@echo off\r\nCALL \"{}\" >NUL || exit /b 1\r\n{}\r\n",
            VisualStudio::vcvars(vs).display(),
            line
        );

        let path = dir.join(format!("{}.bat", name));
        tokio::fs::write(&path, script)
            .await
            .map_err(|e| SparkleError::io(format!("writing {}", path.display()), e))?;

        Ok(CommandLine::new("cmd")
            .arg("/C")
            .arg(&path)
            .current_dir(dir)
            .env(cmd.tool_env()))
    }

    /// Best-effort GLFW install through the platform's package manager
    async fn install_glfw(&self, ctx: &BuildContext) {
        let host = ctx.host();
        let installed = if host.is_macos() {
            ctx.resolve
                .package_manager_install(CommandLine::new("brew").args(["install", "glfw"]), "GLFW")
                .await
        } else if host.is_windows() {
            match ctx.toolchain.path(ToolKind::Vcpkg) {
                Ok(vcpkg) => {
                    ctx.resolve
                        .package_manager_install(CommandLine::new(vcpkg).args(["install", "glfw3:x64-windows"]), "GLFW")
                        .await
                }
                Err(_) => false,
            }
        } else {
            ui::step_info(ctx.ui(), "GLFW is not installed automatically on this host; install it with your package manager");
            return;
        };

        if !installed {
            ui::step_warn(ctx.ui(), "GLFW could not be installed automatically; make sure it is installed");
        }
    }

    async fn configure(&self, ctx: &BuildContext, mode: ConfigureMode) -> SparkleResult<PathBuf> {
        self.install_glfw(ctx).await;

        let dir = self.configure_dir(ctx, mode);
        prepare_dir(&dir, ctx.config.clean).await?;

        let cmd = self.configure_command(ctx, mode)?;
        let cmd = if mode == ConfigureMode::Solution {
            cmd
        } else {
            self.with_msvc(ctx, cmd, &dir, "configure").await?
        };
        run_stage(ctx, Stage::Configure, &cmd, &dir.join("configure.log"), "Configuring CMake").await?;
        Ok(dir)
    }

    pub fn launch_spec(&self, ctx: &BuildContext) -> LaunchSpec {
        let working_dir = ctx.layout.output_dir(Framework::Glfw).join("build");
        LaunchSpec {
            program: working_dir.join(ctx.executable_name()),
            args: ctx.config.passthrough_args.clone(),
            working_dir,
            env: ctx.toolchain.env().clone(),
        }
    }
}

#[async_trait]
impl FrameworkBuilder for DesktopBuilder {
    fn framework(&self) -> Framework {
        Framework::Glfw
    }

    fn required_tools(&self, host: Host) -> Vec<ToolKind> {
        let mut tools = vec![ToolKind::Cmake, ToolKind::Ninja];
        if host.is_windows() {
            tools.extend([ToolKind::VisualStudio, ToolKind::Vcpkg]);
        } else {
            tools.push(ToolKind::Llvm);
        }
        tools
    }

    fn artifact_path(&self, ctx: &BuildContext) -> PathBuf {
        self.launch_spec(ctx).program
    }

    async fn configure_for_ide_tooling(&self, ctx: &BuildContext) -> SparkleResult<PathBuf> {
        let dir = self.configure(ctx, ConfigureMode::IdeTooling).await?;
        info!("compile_commands.json written to {}", dir.display());
        Ok(dir)
    }

    async fn generate_project(&self, ctx: &BuildContext) -> SparkleResult<PathBuf> {
        if !ctx.host().is_windows() {
            return Err(SparkleError::PlatformUnsupported {
                framework: "glfw project generation".to_string(),
                requires: "Windows".to_string(),
                host: ctx.host().os.to_string(),
            });
        }

        let dir = self.configure(ctx, ConfigureMode::Solution).await?;
        ui::step_info(
            ctx.ui(),
            &format!(
                "Visual Studio solution generated. Open with: start {}",
                dir.join(format!("{}.sln", ctx.settings.project.target)).display()
            ),
        );
        Ok(dir)
    }

    async fn build(&self, ctx: &BuildContext) -> SparkleResult<BuildArtifact> {
        let dir = self.configure(ctx, ConfigureMode::Build).await?;

        let threads = Self::build_threads(ctx.host()).to_string();
        let cmd = ctx.cmake(&dir)?.args([
            "--build",
            ".",
            "-j",
            threads.as_str(),
            "--config",
            ctx.build_type().as_str(),
        ]);
        let cmd = self.with_msvc(ctx, cmd, &dir, "build").await?;
        run_stage(ctx, Stage::Build, &cmd, &dir.join("build.log"), "Building").await?;

        let path = self.artifact_path(ctx);
        require_artifact(&path)?;
        Ok(ctx.artifact(path))
    }

    async fn archive(&self, ctx: &BuildContext) -> SparkleResult<ArchiveOutcome> {
        let output = ctx.layout.output_dir(Framework::Glfw);
        let build = output.join("build");
        require_artifact(&build)?;

        let path = output.join("product.zip");
        compress(&build, &path).await?;
        Ok(ArchiveOutcome { path, signed: false })
    }

    async fn run(&self, ctx: &BuildContext) -> SparkleResult<RunOutcome> {
        let launch = self.launch_spec(ctx);
        require_artifact(&launch.program)?;

        ui::step_info(ctx.ui(), &format!("Running {}", launch.command()));
        let code = run_inherited(&launch.command()).await?;
        Ok(RunOutcome::Exited { launch, code })
    }
}
