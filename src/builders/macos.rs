//! macOS app bundle builds through the Xcode generator
//!
//! Archiving signs, notarizes and staples the bundle when all four signing
//! credentials are present. Any missing credential or failed step degrades
//! to an unsigned zip of the untouched bundle.

use super::builder::{prepare_dir, require_artifact, run_stage, Stage};
use super::{ArchiveOutcome, BuildArtifact, BuildContext, Framework, FrameworkBuilder, LaunchSpec, RunOutcome};
use crate::archive::{compress, copy_dir, robust_remove};
use crate::error::SparkleResult;
use crate::platform::Host;
use crate::prerequisites::ToolKind;
use crate::process::{capture, run_inherited, CommandLine};
use crate::ui;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// `(variable, what it holds)` for each signing credential
const CREDENTIAL_VARS: [(&str, &str); 4] = [
    ("APPLE_ID", "Apple ID email"),
    ("APPLE_APP_SPECIFIC_PASSWORD", "app-specific password"),
    ("APPLE_DEVELOPER_TEAM_ID", "developer team id"),
    ("APPLE_SIGNING_IDENTITY", "Developer ID signing identity"),
];

/// Everything notarization needs; all four or nothing
#[derive(Clone, PartialEq, Eq)]
pub struct SigningCredentials {
    pub apple_id: String,
    pub password: String,
    pub team_id: String,
    pub identity: String,
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("apple_id", &self.apple_id)
            .field("team_id", &self.team_id)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl SigningCredentials {
    /// Read the credentials; `Err` lists the variables that are unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Vec<&'static str>> {
        let values: Vec<Option<String>> = CREDENTIAL_VARS.iter().map(|(var, _)| lookup(var)).collect();
        let missing: Vec<&'static str> = CREDENTIAL_VARS
            .iter()
            .zip(&values)
            .filter(|(_, value)| value.is_none())
            .map(|((var, _), _)| *var)
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }

        let mut values = values.into_iter().flatten();
        let mut next = || values.next().unwrap_or_default();
        Ok(Self {
            apple_id: next(),
            password: next(),
            team_id: next(),
            identity: next(),
        })
    }

    fn notary_args(&self) -> [String; 6] {
        [
            "--apple-id".to_string(),
            self.apple_id.clone(),
            "--password".to_string(),
            self.password.clone(),
            "--team-id".to_string(),
            self.team_id.clone(),
        ]
    }
}

/// A signing step that failed; logged and discarded
#[derive(Debug, Error)]
enum SigningStepError {
    #[error("{step} failed: {detail}")]
    Step { step: &'static str, detail: String },
}

impl SigningStepError {
    fn step(step: &'static str, detail: impl ToString) -> Self {
        Self::Step {
            step,
            detail: detail.to_string(),
        }
    }
}

/// `notarytool ... --output-format json` response
#[derive(Debug, Deserialize)]
struct NotaryResponse {
    id: Option<String>,
    status: Option<String>,
    message: Option<String>,
}

pub struct MacosBuilder;

impl MacosBuilder {
    fn bundle_name(ctx: &BuildContext) -> String {
        format!("{}.app", ctx.settings.project.target)
    }

    pub fn launch_spec(&self, ctx: &BuildContext) -> LaunchSpec {
        let bundle = self.artifact_path(ctx);
        LaunchSpec {
            program: bundle.join("Contents").join("MacOS").join(&ctx.settings.project.target),
            args: ctx.config.passthrough_args.clone(),
            working_dir: ctx.layout.project_dir(Framework::Macos),
            env: ctx.toolchain.env().clone(),
        }
    }

    /// Sign, notarize and staple a copy of the bundle, zipped to `dest`.
    /// The signing directory is removed afterwards either way.
    async fn sign_and_notarize(
        &self,
        ctx: &BuildContext,
        credentials: &SigningCredentials,
        bundle: &Path,
        dest: &Path,
    ) -> Result<(), SigningStepError> {
        let staging = ctx.layout.project_dir(Framework::Macos).join("signing");
        robust_remove(&staging)
            .await
            .map_err(|e| SigningStepError::step("preparing signing directory", e))?;

        let result = self.sign_in(&staging, ctx, credentials, bundle, dest).await;
        if let Err(e) = robust_remove(&staging).await {
            warn!("Could not remove {}: {}", staging.display(), e);
        }
        result
    }

    async fn sign_in(
        &self,
        staging: &Path,
        ctx: &BuildContext,
        credentials: &SigningCredentials,
        bundle: &Path,
        dest: &Path,
    ) -> Result<(), SigningStepError> {
        let staged = staging.join(Self::bundle_name(ctx));
        copy_dir(bundle, &staged)
            .await
            .map_err(|e| SigningStepError::step("copying bundle", e))?;

        let codesign = ctx.command("codesign").args(["--force", "--options", "runtime", "--timestamp", "--sign"]);
        let codesign = codesign.arg(&credentials.identity).arg(&staged);
        self.step(&codesign, "codesign").await?;

        let upload = staging.join("notarize.zip");
        compress(&staged, &upload)
            .await
            .map_err(|e| SigningStepError::step("zipping for notarization", e))?;

        let submit = ctx
            .command("xcrun")
            .args(["notarytool", "submit"])
            .arg(&upload)
            .args(credentials.notary_args())
            .args(["--output-format", "json"]);
        let submitted = self.notary(&submit, "notarytool submit").await?;
        let id = submitted
            .id
            .ok_or_else(|| SigningStepError::step("notarytool submit", "no submission id in response"))?;
        info!("Notarization submission {}", id);

        let wait = ctx
            .command("xcrun")
            .args(["notarytool", "wait"])
            .arg(&id)
            .args(credentials.notary_args())
            .args(["--output-format", "json"]);
        let result = self.notary(&wait, "notarytool wait").await?;
        if result.status.as_deref() != Some("Accepted") {
            return Err(SigningStepError::step(
                "notarization",
                format!(
                    "status {} ({})",
                    result.status.unwrap_or_default(),
                    result.message.unwrap_or_default()
                ),
            ));
        }

        let staple = ctx.command("xcrun").args(["stapler", "staple"]).arg(&staged);
        self.step(&staple, "stapler staple").await?;

        compress(&staged, dest)
            .await
            .map_err(|e| SigningStepError::step("zipping signed bundle", e))
    }

    async fn step(&self, cmd: &CommandLine, step: &'static str) -> Result<Vec<u8>, SigningStepError> {
        debug!("Signing step: {}", cmd);
        let output = capture(cmd).await.map_err(|e| SigningStepError::step(step, e))?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(SigningStepError::step(step, String::from_utf8_lossy(&output.stderr).trim()))
        }
    }

    async fn notary(&self, cmd: &CommandLine, step: &'static str) -> Result<NotaryResponse, SigningStepError> {
        let stdout = self.step(cmd, step).await?;
        serde_json::from_slice(&stdout).map_err(|e| SigningStepError::step(step, e))
    }
}

#[async_trait]
impl FrameworkBuilder for MacosBuilder {
    fn framework(&self) -> Framework {
        Framework::Macos
    }

    fn required_tools(&self, _host: Host) -> Vec<ToolKind> {
        vec![ToolKind::Cmake, ToolKind::Llvm]
    }

    /// `project/<build type>/sparkle.app`
    fn artifact_path(&self, ctx: &BuildContext) -> PathBuf {
        ctx.layout
            .project_dir(Framework::Macos)
            .join(ctx.build_type().as_str())
            .join(Self::bundle_name(ctx))
    }

    async fn configure_for_ide_tooling(&self, ctx: &BuildContext) -> SparkleResult<PathBuf> {
        let dir = ctx.layout.clangd_dir(Framework::Macos);
        prepare_dir(&dir, ctx.config.clean).await?;

        let bin = ctx.toolchain.root(ToolKind::Llvm)?.join("bin");
        let cmd = ctx
            .cmake(&dir)?
            .arg(ctx.layout.root())
            .arg(format!("-DCMAKE_BUILD_TYPE={}", ctx.build_type()))
            .arg(format!("-DCMAKE_C_COMPILER={}", bin.join("clang").display()))
            .arg(format!("-DCMAKE_CXX_COMPILER={}", bin.join("clang++").display()))
            .args(ctx.config.cmake_options());
        run_stage(ctx, Stage::Configure, &cmd, &dir.join("configure.log"), "Configuring CMake for clangd").await?;
        Ok(dir)
    }

    async fn generate_project(&self, ctx: &BuildContext) -> SparkleResult<PathBuf> {
        let dir = ctx.layout.project_dir(Framework::Macos);
        prepare_dir(&dir, ctx.config.clean).await?;

        let cmd = ctx
            .cmake(&dir)?
            .arg(ctx.layout.root())
            .args(["-G", "Xcode"])
            .args(ctx.config.cmake_options());
        run_stage(ctx, Stage::Configure, &cmd, &dir.join("configure.log"), "Generating Xcode project").await?;

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
        run_stage(ctx, Stage::Build, &cmd, &dir.join("build.log"), "Building macOS project").await?;

        let bundle = self.artifact_path(ctx);
        require_artifact(&bundle)?;
        Ok(ctx.artifact(bundle))
    }

    async fn archive(&self, ctx: &BuildContext) -> SparkleResult<ArchiveOutcome> {
        let bundle = self.artifact_path(ctx);
        require_artifact(&bundle)?;
        let path = ctx.layout.project_dir(Framework::Macos).join("product.zip");

        match SigningCredentials::from_lookup(|key| ctx.var(key)) {
            Ok(credentials) => match self.sign_and_notarize(ctx, &credentials, &bundle, &path).await {
                Ok(()) => {
                    ui::step_ok(ctx.ui(), "Signed, notarized and stapled");
                    return Ok(ArchiveOutcome { path, signed: true });
                }
                Err(e) => {
                    warn!("{}", e);
                    ui::step_warn_hint(ctx.ui(), "Signing discarded, archiving the unsigned bundle", &e.to_string());
                }
            },
            Err(missing) => {
                ui::step_warn_hint(
                    ctx.ui(),
                    "Signing discarded, archiving the unsigned bundle",
                    &format!("unset: {}", missing.join(", ")),
                );
            }
        }

        compress(&bundle, &path).await?;
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
