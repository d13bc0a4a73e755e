//! Framework builders
//!
//! One lifecycle (IDE tooling, project generation, build, archive, run)
//! implemented per target platform and selected by [`create_builder`].

mod android;
pub(crate) mod builder;
mod desktop;
mod factory;
mod ios;
mod layout;
mod macos;

pub use android::AndroidBuilder;
pub use builder::{
    ArchiveOutcome, BuildArtifact, BuildConfiguration, BuildContext, FrameworkBuilder, LaunchSpec, RunOutcome,
};
pub use desktop::DesktopBuilder;
pub use factory::create_builder;
pub use ios::IosBuilder;
pub use layout::ProjectLayout;
pub use macos::{MacosBuilder, SigningCredentials};

use clap::ValueEnum;
use std::fmt;

/// Target platform family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Framework {
    /// Desktop window via GLFW
    #[value(alias = "desktop")]
    Glfw,
    /// macOS app bundle
    Macos,
    /// iOS app bundle
    Ios,
    /// Android APK
    Android,
}

impl Framework {
    /// Identifier used in directory and product names
    pub fn id(&self) -> &'static str {
        match self {
            Framework::Glfw => "glfw",
            Framework::Macos => "macos",
            Framework::Ios => "ios",
            Framework::Android => "android",
        }
    }

    /// Apple frameworks need Xcode and therefore a macOS host
    pub fn requires_macos(&self) -> bool {
        matches!(self, Framework::Macos | Framework::Ios)
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// CMake configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum BuildType {
    #[value(name = "Release", alias = "release")]
    Release,
    #[value(name = "Debug", alias = "debug")]
    Debug,
}

impl BuildType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Release => "Release",
            BuildType::Debug => "Debug",
        }
    }

    /// Lower-case Gradle variant name
    pub fn variant(&self) -> &'static str {
        match self {
            BuildType::Release => "release",
            BuildType::Debug => "debug",
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_is_an_alias() {
        assert_eq!(Framework::from_str("desktop", false).unwrap(), Framework::Glfw);
        assert_eq!(Framework::from_str("android", false).unwrap(), Framework::Android);
    }

    #[test]
    fn build_type_names() {
        assert_eq!(BuildType::from_str("Release", false).unwrap(), BuildType::Release);
        assert_eq!(BuildType::from_str("debug", false).unwrap(), BuildType::Debug);
        assert_eq!(BuildType::Debug.variant(), "debug");
        assert_eq!(BuildType::Release.to_string(), "Release");
    }

    #[test]
    fn apple_frameworks_need_macos() {
        assert!(Framework::Ios.requires_macos());
        assert!(!Framework::Android.requires_macos());
    }
}
