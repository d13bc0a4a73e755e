//! sparkle-build - cross-platform build orchestration
//!
//! Resolves the native toolchain a Vulkan renderer needs on each host and
//! drives configure, build, archive and run for desktop, macOS, iOS and
//! Android targets.

pub mod archive;
pub mod builders;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod platform;
pub mod prerequisites;
pub mod process;
pub mod ui;

pub use error::{SparkleError, SparkleResult};
