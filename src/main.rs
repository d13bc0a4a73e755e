//! sparkle-build - cross-platform build driver
//!
//! CLI entry point: parses arguments, loads the project config and hands
//! over to the orchestrator.

use clap::Parser;
use console::style;
use sparkle_build::cli::Cli;
use sparkle_build::config::ConfigManager;
use sparkle_build::error::{SparkleError, SparkleResult};
use sparkle_build::orchestrator::{Orchestrator, Outcome};
use sparkle_build::platform::Host;
use sparkle_build::prerequisites::{process_env, HttpFetcher, ResolveContext, VersionManifest};
use sparkle_build::ui::{self, UiContext};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> SparkleResult<()> {
    let cli = Cli::parse();

    // 0 = warn (step output only), 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("sparkle_build=warn"),
        1 => EnvFilter::new("sparkle_build=info"),
        _ => EnvFilter::new("sparkle_build=debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let root = match cli.root {
        Some(ref root) => root
            .canonicalize()
            .map_err(|e| SparkleError::io(format!("resolving project root {}", root.display()), e))?,
        None => std::env::current_dir().map_err(|e| SparkleError::io("getting current directory", e))?,
    };
    debug!("Project root: {}", root.display());

    let config_manager = match cli.config_file {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(&root),
    };
    let settings = config_manager.load().await?;

    let ui_ctx = UiContext::detect();
    let build = cli.configuration();
    ui::intro(
        &ui_ctx,
        &format!("sparkle-build {} {}", build.framework, build.build_type),
    );

    let manifest = VersionManifest::load(&root).await;
    let cx = ResolveContext::new(
        Host::detect(),
        root,
        manifest,
        Arc::new(HttpFetcher::new(ui_ctx.clone())),
        process_env(),
        ui_ctx.clone(),
    );

    let outcome = Orchestrator::new(build, settings, cx).execute().await?;
    let message = match outcome {
        Outcome::SetupOnly => "Setup complete".to_string(),
        Outcome::IdeTooling(dir) => format!("IDE tooling configured in {}", dir.display()),
        Outcome::Generated(dir) => format!("Project generated in {}", dir.display()),
        Outcome::Built { product: Some(product), .. } => format!("Product at {}", product.display()),
        Outcome::Built { artifact, .. } => format!("Built {}", artifact.path.display()),
    };
    ui::outro_success(&ui_ctx, &message);
    Ok(())
}
