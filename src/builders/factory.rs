//! Builder selection

use super::{AndroidBuilder, DesktopBuilder, Framework, FrameworkBuilder, IosBuilder, MacosBuilder};

/// Create the builder for a target framework
pub fn create_builder(framework: Framework) -> Box<dyn FrameworkBuilder> {
    match framework {
        Framework::Glfw => Box::new(DesktopBuilder),
        Framework::Macos => Box::new(MacosBuilder),
        Framework::Ios => Box::new(IosBuilder),
        Framework::Android => Box::new(AndroidBuilder),
    }
}
