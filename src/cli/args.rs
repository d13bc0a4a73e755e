//! CLI argument definitions using clap derive

use crate::builders::{BuildConfiguration, BuildType, Framework};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// sparkle-build - cross-platform build driver for the Sparkle renderer
///
/// Resolves every prerequisite (CMake, Ninja, compilers, Vulkan SDK, shader
/// compiler, JDK), then configures, builds, archives and runs the
/// application for the chosen framework.
#[derive(Parser, Debug)]
#[command(name = "sparkle-build")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Target framework
    #[arg(short, long, value_enum, default_value_t = Framework::Glfw)]
    pub framework: Framework,

    /// Build configuration
    #[arg(long, visible_alias = "config", value_enum, default_value_t = BuildType::Debug)]
    pub build_type: BuildType,

    /// Remove the stage's output directory before configuring
    #[arg(long)]
    pub clean: bool,

    /// Archive the build product and copy it to product/
    #[arg(long)]
    pub archive: bool,

    /// Launch or deploy the built application
    #[arg(long)]
    pub run: bool,

    /// Only generate the IDE project
    #[arg(long, conflicts_with = "ide_tooling_only")]
    pub generate_only: bool,

    /// Only configure for language-server tooling (compile_commands.json)
    #[arg(long, visible_alias = "clangd")]
    pub ide_tooling_only: bool,

    /// Sync sources and bootstrap resources, then exit
    #[arg(long)]
    pub setup_only: bool,

    /// Build with AddressSanitizer
    #[arg(long, visible_alias = "asan")]
    pub sanitizer: bool,

    /// Build with the profiler enabled
    #[arg(long, visible_alias = "profile")]
    pub profiler: bool,

    /// Build shaders with debug information
    #[arg(long)]
    pub shader_debug: bool,

    /// Let Xcode sign iOS builds automatically (needs APPLE_DEVELOPER_TEAM_ID)
    #[arg(long)]
    pub apple_auto_sign: bool,

    /// Extra arguments passed to CMake, whitespace separated
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub extra_toolchain_args: String,

    /// Project root (defaults to the current directory)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Configuration file path
    #[arg(long, env = "SPARKLE_BUILD_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Arguments forwarded to the launched application
    #[arg(last = true)]
    pub passthrough: Vec<String>,
}

impl Cli {
    /// The immutable build request these arguments describe
    pub fn configuration(&self) -> BuildConfiguration {
        BuildConfiguration {
            clean: self.clean,
            generate_only: self.generate_only,
            ide_tooling_only: self.ide_tooling_only,
            archive: self.archive,
            run: self.run,
            setup_only: self.setup_only,
            sanitizer: self.sanitizer,
            profiler: self.profiler,
            shader_debug: self.shader_debug,
            apple_auto_sign: self.apple_auto_sign,
            extra_toolchain_args: self.extra_toolchain_args.clone(),
            passthrough_args: self.passthrough.clone(),
            ..BuildConfiguration::new(self.framework, self.build_type)
        }
    }
}
