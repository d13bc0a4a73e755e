//! Step and banner output

use super::context::UiContext;
use console::{style, StyledObject};

/// Severity of a step line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Ok,
    Warn,
    Info,
}

impl Level {
    /// Prefix used when output is plain text
    fn tag(self) -> StyledObject<&'static str> {
        match self {
            Level::Ok => style("[OK]").green(),
            Level::Warn => style("[WARN]").yellow(),
            Level::Info => style("[INFO]").cyan(),
        }
    }
}

fn emit(ctx: &UiContext, level: Level, text: String) {
    if !ctx.use_fancy_output() {
        println!("  {} {}", level.tag(), text);
        return;
    }
    let _ = match level {
        Level::Ok => cliclack::log::success(text),
        Level::Warn => cliclack::log::warning(text),
        Level::Info => cliclack::log::info(text),
    };
}

/// Banner naming the framework and build type
pub fn intro(ctx: &UiContext, title: &str) {
    let title = style(title).cyan().bold();
    if ctx.use_fancy_output() {
        let _ = cliclack::intro(title);
    } else {
        println!("{}", title);
    }
}

pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        let _ = cliclack::outro(style(message).green().bold());
    } else {
        println!("{} {}", Level::Ok.tag(), message);
    }
}

/// Boxed multi-line text, e.g. manual deployment steps
pub fn note(ctx: &UiContext, title: &str, message: &str) {
    if ctx.use_fancy_output() {
        let _ = cliclack::note(title, message);
        return;
    }
    println!("{}:", style(title).bold());
    message.lines().for_each(|line| println!("  {}", line));
}

/// Phase header: Setup, Prerequisites, Building, ...
pub fn section(ctx: &UiContext, title: &str) {
    println!();
    if ctx.use_fancy_output() {
        let _ = cliclack::log::step(style(title).bold());
    } else {
        println!("== {} ==", style(title).bold());
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    emit(ctx, Level::Ok, message.to_string());
}

/// Success with a dimmed detail such as the resolution source
pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    emit(ctx, Level::Ok, format!("{} ({})", message, style(detail).dim()));
}

pub fn step_warn(ctx: &UiContext, message: &str) {
    emit(ctx, Level::Warn, message.to_string());
}

pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    emit(ctx, Level::Warn, format!("{}: {}", message, style(hint).dim()));
}

pub fn step_info(ctx: &UiContext, message: &str) {
    emit(ctx, Level::Info, message.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_output_does_not_panic() {
        let ctx = UiContext::non_interactive();
        intro(&ctx, "sparkle-build glfw Debug");
        section(&ctx, "Prerequisites");
        step_ok(&ctx, "CMake 3.30.5");
        step_ok_detail(&ctx, "Ninja 1.12.1", "cache: build_cache/ninja/1.12.1/ninja");
        step_warn(&ctx, "GLFW could not be installed automatically");
        step_warn_hint(&ctx, "Signing discarded", "unset: APPLE_ID");
        step_info(&ctx, "Using Xcode clang");
        note(&ctx, "Manual deployment", "1. Open the generated Xcode project\n2. Build and run");
        outro_success(&ctx, "Build complete");
    }

    #[test]
    fn plain_tags() {
        console::set_colors_enabled(false);
        assert_eq!(Level::Ok.tag().to_string(), "[OK]");
        assert_eq!(Level::Warn.tag().to_string(), "[WARN]");
    }
}
