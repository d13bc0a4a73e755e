//! Terminal output
//!
//! `cliclack` logs and spinners in a terminal, prefixed plain lines
//! (`[OK]`, `[WARN]`, ...) when piped or running under CI.
//!
//! ```rust,ignore
//! use sparkle_build::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//! ui::intro(&ctx, "sparkle-build glfw Debug");
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Installing glfw...");
//! spinner.stop("glfw installed");
//!
//! ui::step_warn_hint(&ctx, "Signing skipped", "Set APPLE_ID to notarize");
//! ui::outro_success(&ctx, "Build complete");
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{intro, note, outro_success, section, step_info, step_ok, step_ok_detail, step_warn, step_warn_hint};
pub use progress::{DownloadProgress, TaskSpinner};
