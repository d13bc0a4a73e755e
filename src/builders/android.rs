//! Android APKs through the Gradle wrapper, which drives the NDK's CMake

use super::builder::{prepare_dir, require_artifact, run_stage, Stage};
use super::{ArchiveOutcome, BuildArtifact, BuildContext, BuildType, Framework, FrameworkBuilder, RunOutcome};
use crate::archive::copy_dir;
use crate::error::{SparkleError, SparkleResult};
use crate::platform::Host;
use crate::prerequisites::gradle::ensure_wrapper_jar;
use crate::prerequisites::tools::{mark_executable, VALIDATION_LAYER_LIB};
use crate::prerequisites::ToolKind;
use crate::process::{run_inherited, run_until_interrupted, CommandLine};
use crate::ui;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

const ADB_HINT: &str = "Install the Android SDK platform-tools and put adb on PATH";

/// Gradle task for a build type, e.g. `assembleDebug`
fn gradle_task(prefix: &str, build_type: BuildType) -> String {
    format!("{}{}", prefix, build_type.as_str())
}

/// Update the modification time, creating the file if needed
fn touch(path: &Path) -> SparkleResult<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SparkleError::io(format!("touching {}", path.display()), e))?;
    file.set_modified(SystemTime::now())
        .map_err(|e| SparkleError::io(format!("touching {}", path.display()), e))
}

/// A library directory holding the validation layer for at least one ABI
fn has_validation_layers(jni_libs: &Path) -> bool {
    std::fs::read_dir(jni_libs)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .any(|entry| entry.path().join(VALIDATION_LAYER_LIB).is_file())
        })
        .unwrap_or(false)
}

pub struct AndroidBuilder;

impl AndroidBuilder {
    fn gradle_dir(ctx: &BuildContext) -> PathBuf {
        ctx.layout.framework_dir(Framework::Android)
    }

    fn jni_libs_dir(ctx: &BuildContext) -> PathBuf {
        Self::gradle_dir(ctx).join("app").join("src").join("main").join("jniLibs")
    }

    /// Force the NDK CMake re-run, make sure the wrapper is usable and the
    /// output directory exists. Returns the `gradlew` path.
    async fn prepare(&self, ctx: &BuildContext) -> SparkleResult<PathBuf> {
        let cmake_lists = ctx.layout.root().join("CMakeLists.txt");
        debug!("Touching {} to force a CMake re-run", cmake_lists.display());
        touch(&cmake_lists)?;

        let gradle_dir = Self::gradle_dir(ctx);
        ensure_wrapper_jar(&ctx.resolve, &gradle_dir).await?;

        let gradlew = gradle_dir.join(if ctx.host().is_windows() { "gradlew.bat" } else { "gradlew" });
        if !gradlew.is_file() {
            return Err(SparkleError::tool_not_found(
                format!("gradlew at {}", gradlew.display()),
                "Restore the Gradle wrapper scripts in the Android project",
            ));
        }
        if !ctx.host().is_windows() {
            mark_executable(&gradlew).await?;
        }

        prepare_dir(&ctx.layout.output_dir(Framework::Android), ctx.config.clean).await?;
        Ok(gradlew)
    }

    fn gradle_command(&self, ctx: &BuildContext, gradlew: &Path, task: String) -> CommandLine {
        ctx.command(gradlew)
            .current_dir(Self::gradle_dir(ctx))
            .arg(task)
            .arg(format!("-PcmakeArgs={}", ctx.config.cmake_options().join(" ")))
            .arg("--info")
    }

    /// Gradle sync: generates the CMake trees without building
    async fn sync(&self, ctx: &BuildContext) -> SparkleResult<PathBuf> {
        let gradlew = self.prepare(ctx).await?;
        let cmd = self.gradle_command(ctx, &gradlew, gradle_task("generateJsonModel", ctx.build_type()));
        let log = ctx.layout.output_dir(Framework::Android).join("sync.log");
        run_stage(ctx, Stage::Configure, &cmd, &log, "Syncing Android project").await?;
        ui::step_ok(ctx.ui(), "Gradle sync complete, CMake files generated");
        Ok(Self::gradle_dir(ctx))
    }

    /// Copy the resolved validation layers into `jniLibs` unless already there
    async fn install_validation_layers(&self, ctx: &BuildContext) -> SparkleResult<()> {
        let jni_libs = Self::jni_libs_dir(ctx);
        if has_validation_layers(&jni_libs) {
            debug!("Validation layers already in {}", jni_libs.display());
            return Ok(());
        }
        let layers = ctx.toolchain.root(ToolKind::AndroidValidationLayers)?;
        info!("Copying validation layers into {}", jni_libs.display());
        copy_dir(layers, &jni_libs).await
    }

    async fn adb(&self, ctx: &BuildContext, args: &[&str]) -> SparkleResult<bool> {
        let cmd = ctx.command("adb").args(args.iter().copied());
        match run_inherited(&cmd).await {
            Ok(code) => Ok(code == 0),
            Err(SparkleError::CommandFailed { .. }) => Err(SparkleError::tool_not_found("adb", ADB_HINT)),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl FrameworkBuilder for AndroidBuilder {
    fn framework(&self) -> Framework {
        Framework::Android
    }

    fn required_tools(&self, _host: Host) -> Vec<ToolKind> {
        vec![ToolKind::Jdk, ToolKind::AndroidValidationLayers]
    }

    /// `app/build/outputs/apk/<variant>/app-<variant>.apk`
    fn artifact_path(&self, ctx: &BuildContext) -> PathBuf {
        let variant = ctx.build_type().variant();
        Self::gradle_dir(ctx)
            .join("app")
            .join("build")
            .join("outputs")
            .join("apk")
            .join(variant)
            .join(format!("app-{}.apk", variant))
    }

    async fn configure_for_ide_tooling(&self, ctx: &BuildContext) -> SparkleResult<PathBuf> {
        self.sync(ctx).await
    }

    async fn generate_project(&self, ctx: &BuildContext) -> SparkleResult<PathBuf> {
        self.sync(ctx).await
    }

    async fn build(&self, ctx: &BuildContext) -> SparkleResult<BuildArtifact> {
        self.install_validation_layers(ctx).await?;
        let gradlew = self.prepare(ctx).await?;

        let cmd = self.gradle_command(ctx, &gradlew, gradle_task("assemble", ctx.build_type()));
        let log = ctx.layout.output_dir(Framework::Android).join("build.log");
        run_stage(ctx, Stage::Build, &cmd, &log, "Building Android APK").await?;

        let apk = self.artifact_path(ctx);
        require_artifact(&apk)?;
        ui::step_ok_detail(ctx.ui(), "APK created", &apk.display().to_string());
        Ok(ctx.artifact(apk))
    }

    /// The APK is already the distributable; nothing is repackaged
    async fn archive(&self, ctx: &BuildContext) -> SparkleResult<ArchiveOutcome> {
        let path = self.artifact_path(ctx);
        require_artifact(&path)?;
        Ok(ArchiveOutcome { path, signed: false })
    }

    async fn run(&self, ctx: &BuildContext) -> SparkleResult<RunOutcome> {
        let apk = self.artifact_path(ctx);
        require_artifact(&apk)?;
        let android = &ctx.settings.android;

        ui::step_info(ctx.ui(), "Installing APK...");
        let apk_arg = apk.to_string_lossy();
        if !self.adb(ctx, &["install", &*apk_arg]).await? {
            ui::step_warn_hint(ctx.ui(), "APK installation failed", "Check that a device is attached (adb devices)");
            return Ok(RunOutcome::Manual);
        }

        let activity = format!("{pkg}/{pkg}.{}", android.activity, pkg = android.package);
        if !self.adb(ctx, &["shell", "am", "start", "-n", activity.as_str()]).await? {
            ui::step_warn(ctx.ui(), "Failed to start the application");
            return Ok(RunOutcome::Manual);
        }

        ui::step_info(ctx.ui(), "Following application logs (Ctrl+C to stop)...");
        let logcat = ctx.command("adb").args(["logcat", "-s", android.log_tag.as_str()]);
        if run_until_interrupted(&logcat).await?.is_none() {
            info!("Stopped log monitoring");
        }

        let remote_log = format!("/sdcard/Android/data/{}/files/logs/output.log", android.package);
        let output = ctx.layout.output_dir(Framework::Android);
        let output_arg = output.to_string_lossy();
        if !self.adb(ctx, &["pull", remote_log.as_str(), &*output_arg]).await? {
            warn!("Could not pull {}", remote_log);
        }

        let device = ctx.var("ANDROID_SERIAL").unwrap_or_else(|| "default adb device".to_string());
        Ok(RunOutcome::Deployed { device })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::builder::testing::{build_context, toolchain};
    use crate::builders::BuildConfiguration;
    use crate::platform::{Arch, HostOs};
    use tempfile::TempDir;

    fn android_context(root: &Path, build_type: BuildType) -> BuildContext {
        build_context(
            Host::new(HostOs::Linux, Arch::X86_64),
            root,
            BuildConfiguration::new(Framework::Android, build_type),
            &[],
        )
    }

    fn gradle_project(root: &Path) -> PathBuf {
        let dir = root.join("build_system/android");
        std::fs::create_dir_all(dir.join("gradle/wrapper")).unwrap();
        std::fs::write(dir.join("gradle/wrapper/gradle-wrapper.jar"), b"PK").unwrap();
        std::fs::write(root.join("CMakeLists.txt"), b"project(sparkle)\n").unwrap();
        dir
    }

    #[test]
    fn task_names_follow_build_type() {
        assert_eq!(gradle_task("assemble", BuildType::Debug), "assembleDebug");
        assert_eq!(gradle_task("generateJsonModel", BuildType::Release), "generateJsonModelRelease");
    }

    #[test]
    fn apk_path_uses_lowercase_variant() {
        let temp = TempDir::new().unwrap();
        let ctx = android_context(temp.path(), BuildType::Release);
        assert_eq!(
            AndroidBuilder.artifact_path(&ctx),
            temp.path().join("build_system/android/app/build/outputs/apk/release/app-release.apk")
        );
    }

    #[test]
    fn gradle_command_joins_cmake_options() {
        let temp = TempDir::new().unwrap();
        let mut ctx = android_context(temp.path(), BuildType::Debug);
        ctx.config.shader_debug = true;
        ctx.config.extra_toolchain_args = "-DFOO=1".to_string();

        let cmd = AndroidBuilder.gradle_command(&ctx, Path::new("/p/gradlew"), gradle_task("assemble", BuildType::Debug));
        assert_eq!(
            cmd.to_string(),
            "/p/gradlew assembleDebug -PcmakeArgs=-DENABLE_PROFILER=OFF -DSHADER_DEBUG=ON -DENABLE_ASAN=OFF -DFOO=1 --info"
        );
        assert_eq!(cmd.working_dir(), Some(temp.path().join("build_system/android").as_path()));
    }

    #[tokio::test]
    async fn missing_gradlew_is_reported() {
        let temp = TempDir::new().unwrap();
        gradle_project(temp.path());
        let ctx = android_context(temp.path(), BuildType::Debug);

        let err = AndroidBuilder.prepare(&ctx).await.unwrap_err();
        assert!(matches!(err, SparkleError::ToolNotFound { ref tool, .. } if tool.contains("gradlew")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn prepare_marks_gradlew_executable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let dir = gradle_project(temp.path());
        std::fs::write(dir.join("gradlew"), b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(dir.join("gradlew"), std::fs::Permissions::from_mode(0o644)).unwrap();
        let ctx = android_context(temp.path(), BuildType::Debug);

        let gradlew = AndroidBuilder.prepare(&ctx).await.unwrap();
        assert_eq!(gradlew, dir.join("gradlew"));
        assert_eq!(std::fs::metadata(&gradlew).unwrap().permissions().mode() & 0o777, 0o755);
        assert!(dir.join("output").is_dir());
    }

    #[tokio::test]
    async fn validation_layers_copied_once() {
        let temp = TempDir::new().unwrap();
        let layers = temp.path().join("build_cache/android-validation-layers/1.4.313.0");
        std::fs::create_dir_all(layers.join("arm64-v8a")).unwrap();
        std::fs::write(layers.join("arm64-v8a").join(VALIDATION_LAYER_LIB), b"ELF").unwrap();

        let mut ctx = android_context(temp.path(), BuildType::Debug);
        ctx.toolchain = toolchain(&[(ToolKind::AndroidValidationLayers, layers.as_path(), layers.as_path())]);

        AndroidBuilder.install_validation_layers(&ctx).await.unwrap();
        let copied = AndroidBuilder::jni_libs_dir(&ctx).join("arm64-v8a").join(VALIDATION_LAYER_LIB);
        assert_eq!(std::fs::read(&copied).unwrap(), b"ELF");

        std::fs::write(&copied, b"local build").unwrap();
        AndroidBuilder.install_validation_layers(&ctx).await.unwrap();
        assert_eq!(std::fs::read(&copied).unwrap(), b"local build");
    }

    #[tokio::test]
    async fn archive_requires_apk() {
        let temp = TempDir::new().unwrap();
        let ctx = android_context(temp.path(), BuildType::Debug);
        assert!(matches!(
            AndroidBuilder.archive(&ctx).await,
            Err(SparkleError::ArtifactNotFound(_))
        ));

        let apk = AndroidBuilder.artifact_path(&ctx);
        std::fs::create_dir_all(apk.parent().unwrap()).unwrap();
        std::fs::write(&apk, b"PK").unwrap();
        assert_eq!(AndroidBuilder.archive(&ctx).await.unwrap().path, apk);
    }
}
