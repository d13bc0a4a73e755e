//! Spinners for install steps and byte progress for downloads

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const BAR_TEMPLATE: &str = "  {spinner:.cyan} {prefix}  {bar:24.cyan/dim} {bytes}/{total_bytes} {bytes_per_sec:.dim}";

/// Spinner around one long-running step; plain lines without a terminal
pub struct TaskSpinner {
    fancy: bool,
    active: Option<cliclack::ProgressBar>,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            fancy: ctx.use_fancy_output(),
            active: None,
        }
    }

    pub fn start(&mut self, message: &str) {
        if !self.fancy {
            println!("  {} {}", style("...").dim(), message);
            return;
        }
        let spinner = cliclack::spinner();
        spinner.start(message);
        self.active = Some(spinner);
    }

    pub fn stop(&mut self, message: &str) {
        match self.active.take() {
            Some(spinner) => spinner.stop(message),
            None => println!("  {} {}", style("[OK]").green(), message),
        }
    }

    pub fn stop_warn(&mut self, message: &str) {
        match self.active.take() {
            Some(spinner) => spinner.error(message),
            None => println!("  {} {}", style("[WARN]").yellow(), message),
        }
    }
}

/// Byte progress of one download, movable into the blocking task
pub struct DownloadProgress {
    label: String,
    bar: Option<ProgressBar>,
}

impl DownloadProgress {
    pub fn new(ctx: &UiContext, label: &str) -> Self {
        let bar = ctx.use_fancy_output().then(|| {
            let style = ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> ");
            let bar = ProgressBar::new(0).with_style(style).with_prefix(label.to_string());
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });
        if bar.is_none() {
            println!("  Downloading {}...", label);
        }
        Self {
            label: label.to_string(),
            bar,
        }
    }

    /// Total size, when the server sends Content-Length
    pub fn set_length(&self, total: u64) {
        if let Some(bar) = &self.bar {
            bar.set_length(total);
        }
    }

    pub fn advance(&self, bytes: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(bytes);
        }
    }

    /// Back to zero before a retry
    pub fn reset(&self) {
        if let Some(bar) = &self.bar {
            bar.set_position(0);
        }
    }

    pub fn finish(&self) {
        match &self.bar {
            Some(bar) => bar.finish_and_clear(),
            None => println!("  {} {}", style("[OK]").green(), self.label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_spinner() {
        let ctx = UiContext::non_interactive();
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start("Cloning vcpkg...");
        spinner.stop("Cloning vcpkg");
        spinner.start("Installing GLFW via brew...");
        spinner.stop_warn("Could not install GLFW via brew");
        assert!(spinner.active.is_none());
    }

    #[test]
    fn plain_download_progress() {
        let ctx = UiContext::non_interactive();
        let progress = DownloadProgress::new(&ctx, "ninja-linux.zip");
        assert!(progress.bar.is_none());
        progress.set_length(2048);
        progress.advance(1024);
        progress.reset();
        progress.finish();
    }
}
