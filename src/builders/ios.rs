//! iOS app bundles: Xcode generator with the iOS CMake toolchain file,
//! deployed to a connected device through `xcrun devicectl`

use super::builder::{prepare_dir, require_artifact, run_stage, Stage};
use super::{ArchiveOutcome, BuildArtifact, BuildContext, Framework, FrameworkBuilder, RunOutcome};
use crate::archive::compress;
use crate::error::{SparkleError, SparkleResult};
use crate::platform::Host;
use crate::prerequisites::ToolKind;
use crate::process::{capture, CommandLine};
use crate::ui;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const TEAM_ID_VAR: &str = "APPLE_DEVELOPER_TEAM_ID";

/// First connected iPhone or iPad UDID in `devicectl list devices` output
pub fn parse_devices(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| {
            (line.contains("iPhone") || line.contains("iPad"))
                && line.split_whitespace().any(|token| token == "connected")
        })
        .filter_map(|line| {
            line.split_whitespace()
                .find(|token| token.len() == 36 && token.contains('-'))
                .map(str::to_string)
        })
        .collect()
}

pub struct IosBuilder;

impl IosBuilder {
    fn toolchain_file(ctx: &BuildContext) -> PathBuf {
        ctx.layout.framework_dir(Framework::Ios).join("ios.toolchain.cmake")
    }

    /// Where CMake drops the bundle regardless of configuration
    fn build_output_dir(ctx: &BuildContext) -> PathBuf {
        ctx.layout.output_dir(Framework::Ios).join("build")
    }

    fn platform_args(ctx: &BuildContext) -> Vec<String> {
        vec![
            format!("-DCMAKE_TOOLCHAIN_FILE={}", Self::toolchain_file(ctx).display()),
            "-DPLATFORM=OS64".to_string(),
            "-DCMAKE_SYSTEM_NAME=iOS".to_string(),
            format!("-DDEPLOYMENT_TARGET={}", ctx.settings.apple.deployment_target),
            "-DENABLE_BITCODE=FALSE".to_string(),
        ]
    }

    /// `-DENABLE_APPLE_AUTO_SIGN=ON` when requested; the team id is mandatory then
    fn signing_args(ctx: &BuildContext) -> SparkleResult<Vec<String>> {
        if !ctx.config.apple_auto_sign {
            return Ok(Vec::new());
        }
        if ctx.var(TEAM_ID_VAR).is_none() {
            return Err(SparkleError::MissingEnvironment {
                var: TEAM_ID_VAR.to_string(),
                hint: "Find your team id at https://developer.apple.com/help/account/manage-your-team/locate-your-team-id/"
                    .to_string(),
            });
        }
        Ok(vec!["-DENABLE_APPLE_AUTO_SIGN=ON".to_string()])
    }

    /// Install and launch on the first connected device
    async fn deploy(&self, ctx: &BuildContext, bundle: &Path) -> Result<String, String> {
        let list = ctx.command("xcrun").args(["devicectl", "list", "devices"]);
        let stdout = self.device_step(&list).await?;
        let device = parse_devices(&stdout)
            .into_iter()
            .next()
            .ok_or_else(|| "no connected iOS device; connect and trust one".to_string())?;

        ui::step_info(ctx.ui(), &format!("Installing on device {}", device));
        let install = ctx
            .command("xcrun")
            .args(["devicectl", "device", "install", "app", "--device"])
            .arg(&device)
            .arg(bundle);
        self.device_step(&install).await?;

        let launch = ctx
            .command("xcrun")
            .args(["devicectl", "device", "process", "launch", "--device"])
            .arg(&device)
            .arg(&ctx.settings.apple.bundle_id);
        if let Err(e) = self.device_step(&launch).await {
            ui::step_warn_hint(
                ctx.ui(),
                "Installed, but the app did not launch automatically",
                &format!("launch it from the device ({})", e),
            );
        }
        Ok(device)
    }

    async fn device_step(&self, cmd: &CommandLine) -> Result<String, String> {
        debug!("Device step: {}", cmd);
        let output = capture(cmd).await.map_err(|e| match e {
            SparkleError::CommandFailed { .. } => {
                "xcrun not found; install the Xcode command line tools (xcode-select --install)".to_string()
            }
            other => other.to_string(),
        })?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(format!("{} failed: {}", cmd, String::from_utf8_lossy(&output.stderr).trim()))
        }
    }
}

#[async_trait]
impl FrameworkBuilder for IosBuilder {
    fn framework(&self) -> Framework {
        Framework::Ios
    }

    fn required_tools(&self, _host: Host) -> Vec<ToolKind> {
        vec![ToolKind::Cmake, ToolKind::Llvm]
    }

    fn artifact_path(&self, ctx: &BuildContext) -> PathBuf {
        Self::build_output_dir(ctx).join(format!("{}.app", ctx.settings.project.target))
    }

    async fn configure_for_ide_tooling(&self, ctx: &BuildContext) -> SparkleResult<PathBuf> {
        let dir = ctx.layout.clangd_dir(Framework::Ios);
        prepare_dir(&dir, ctx.config.clean).await?;

        let bin = ctx.toolchain.root(ToolKind::Llvm)?.join("bin");
        let cmd = ctx
            .cmake(&dir)?
            .arg(ctx.layout.root())
            .arg(format!("-DCMAKE_BUILD_TYPE={}", ctx.build_type()))
            .args(ctx.config.cmake_options())
            .arg(format!("-DCMAKE_C_COMPILER={}", bin.join("clang").display()))
            .arg(format!("-DCMAKE_CXX_COMPILER={}", bin.join("clang++").display()))
            .args(Self::platform_args(ctx));
        run_stage(ctx, Stage::Configure, &cmd, &dir.join("configure.log"), "Configuring CMake for clangd (iOS)").await?;
        Ok(dir)
    }

    async fn generate_project(&self, ctx: &BuildContext) -> SparkleResult<PathBuf> {
        let signing = Self::signing_args(ctx)?;
        let dir = ctx.layout.project_dir(Framework::Ios);
        prepare_dir(&dir, ctx.config.clean).await?;

        let cmd = ctx
            .cmake(&dir)?
            .arg(ctx.layout.root())
            .args(["-G", "Xcode"])
            .args(ctx.config.cmake_options())
            .args(signing)
            .args(Self::platform_args(ctx));
        run_stage(ctx, Stage::Configure, &cmd, &dir.join("configure.log"), "Generating iOS Xcode project").await?;

        ui::step_info(
            ctx.ui(),
            &format!(
                "Xcode project generated. Open with: open {}",
                dir.join(format!("{}.xcodeproj", ctx.settings.project.target)).display()
            ),
        );
        Ok(dir)
    }

    async fn build(&self, ctx: &BuildContext) -> SparkleResult<BuildArtifact> {
        let dir = self.generate_project(ctx).await?;

        let cmd = ctx.cmake(&dir)?.args([
            "--build",
            ".",
            "--config",
            ctx.build_type().as_str(),
            "--target",
            ctx.settings.project.target.as_str(),
        ]);
        let log = Self::build_output_dir(ctx).join("build.log");
        run_stage(ctx, Stage::Build, &cmd, &log, "Building iOS project").await?;

        let bundle = self.artifact_path(ctx);
        require_artifact(&bundle)?;
        Ok(ctx.artifact(bundle))
    }

    /// Zip the bundle as `<target>.ipa` next to it
    async fn archive(&self, ctx: &BuildContext) -> SparkleResult<ArchiveOutcome> {
        let bundle = self.artifact_path(ctx);
        require_artifact(&bundle)?;
        let path = Self::build_output_dir(ctx).join(format!("{}.ipa", ctx.settings.project.target));
        compress(&bundle, &path).await?;
        Ok(ArchiveOutcome { path, signed: false })
    }

    async fn run(&self, ctx: &BuildContext) -> SparkleResult<RunOutcome> {
        let bundle = self.artifact_path(ctx);
        require_artifact(&bundle)?;
        ui::step_info(ctx.ui(), &format!("App bundle: {}", bundle.display()));

        match self.deploy(ctx, &bundle).await {
            Ok(device) => {
                ui::step_ok(ctx.ui(), "App launched on device; open the Xcode project to see its log");
                Ok(RunOutcome::Deployed { device })
            }
            Err(reason) => {
                warn!("Device deployment failed: {}", reason);
                ui::note(
                    ctx.ui(),
                    "Manual deployment",
                    &format!(
                        "{}\n1. Open the generated Xcode project\n2. Select your target device\n3. Build and run from Xcode",
                        reason
                    ),
                );
                Ok(RunOutcome::Manual)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::builder::testing::build_context;
    use crate::builders::{BuildConfiguration, BuildType};
    use crate::platform::{Arch, HostOs};
    use tempfile::TempDir;

    const DEVICES: &str = "\
Name            Hostname                       Identifier                             State                Model
-------------   ----------------------------   ------------------------------------   ------------------   ----------------------
Office iPad     Office-iPad.coredevice.local   11111111-2222-3333-4444-555555555555   unavailable          iPad Air
Dev iPhone      Dev-iPhone.coredevice.local    A1B2C3D4-E5F6-7890-ABCD-EF1234567890   available (paired)   iPhone 15 Pro
Old iPhone      Old-iPhone.coredevice.local    99999999-8888-7777-6666-555555555555   disconnected         iPhone 11
Test iPhone     Test-iPhone.coredevice.local   0F0E0D0C-0B0A-0908-0706-050403020100   connected            iPhone 13
";

    fn ios_context(root: &Path, config: BuildConfiguration, vars: &[(&str, &str)]) -> BuildContext {
        build_context(Host::new(HostOs::MacOS, Arch::Aarch64), root, config, vars)
    }

    #[test]
    fn picks_connected_device() {
        assert_eq!(parse_devices(DEVICES), vec!["0F0E0D0C-0B0A-0908-0706-050403020100"]);
        assert!(parse_devices("No devices found.\n").is_empty());
    }

    #[test]
    fn platform_args_use_toolchain_file() {
        let temp = TempDir::new().unwrap();
        let ctx = ios_context(temp.path(), BuildConfiguration::new(Framework::Ios, BuildType::Release), &[]);
        let args = IosBuilder::platform_args(&ctx);

        assert_eq!(
            args[0],
            format!(
                "-DCMAKE_TOOLCHAIN_FILE={}",
                temp.path().join("build_system/ios/ios.toolchain.cmake").display()
            )
        );
        assert_eq!(
            &args[1..],
            ["-DPLATFORM=OS64", "-DCMAKE_SYSTEM_NAME=iOS", "-DDEPLOYMENT_TARGET=18.0", "-DENABLE_BITCODE=FALSE"]
        );
    }

    #[tokio::test]
    async fn auto_sign_requires_team_id() {
        let temp = TempDir::new().unwrap();
        let mut config = BuildConfiguration::new(Framework::Ios, BuildType::Debug);
        config.apple_auto_sign = true;

        let ctx = ios_context(temp.path(), config.clone(), &[]);
        let err = IosBuilder.generate_project(&ctx).await.unwrap_err();
        assert!(matches!(err, SparkleError::MissingEnvironment { ref var, .. } if var == TEAM_ID_VAR));
        assert!(!temp.path().join("build_system/ios/project").exists());

        let ctx = ios_context(temp.path(), config, &[(TEAM_ID_VAR, "TEAM123456")]);
        assert_eq!(IosBuilder::signing_args(&ctx).unwrap(), vec!["-DENABLE_APPLE_AUTO_SIGN=ON"]);
    }

    #[tokio::test]
    async fn archive_writes_ipa() {
        let temp = TempDir::new().unwrap();
        let ctx = ios_context(temp.path(), BuildConfiguration::new(Framework::Ios, BuildType::Release), &[]);
        let bundle = IosBuilder.artifact_path(&ctx);
        assert_eq!(bundle, temp.path().join("build_system/ios/output/build/sparkle.app"));
        std::fs::create_dir_all(&bundle).unwrap();
        std::fs::write(bundle.join("Info.plist"), b"<plist/>").unwrap();

        let outcome = IosBuilder.archive(&ctx).await.unwrap();
        assert_eq!(outcome.path, temp.path().join("build_system/ios/output/build/sparkle.ipa"));
        assert!(outcome.path.is_file());
    }

    #[tokio::test]
    async fn failed_deployment_falls_back_to_manual() {
        let temp = TempDir::new().unwrap();
        let ctx = ios_context(temp.path(), BuildConfiguration::new(Framework::Ios, BuildType::Debug), &[]);
        std::fs::create_dir_all(IosBuilder.artifact_path(&ctx)).unwrap();

        // Without xcrun, or with an empty bundle, devicectl cannot deploy
        let outcome = IosBuilder.run(&ctx).await.unwrap();
        assert_eq!(outcome, RunOutcome::Manual);
    }
}
