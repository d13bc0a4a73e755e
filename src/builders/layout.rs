//! Canonical on-disk locations of a project

use super::{BuildType, Framework};
use crate::config::schema::PathsConfig;
use crate::platform::HostOs;
use std::path::{Path, PathBuf};

/// Paths derived from the project root; pure functions of their inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
    build_system: PathBuf,
    resources: PathBuf,
    ide: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>, paths: &PathsConfig) -> Self {
        let root = root.into();
        Self {
            build_system: root.join(&paths.build_system),
            resources: root.join(&paths.resources),
            ide: root.join(&paths.ide),
            root,
        }
    }

    /// Project root, also the top-level CMake source directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resources_dir(&self) -> &Path {
        &self.resources
    }

    pub fn ide_dir(&self) -> &Path {
        &self.ide
    }

    /// `build_system/<framework>`
    pub fn framework_dir(&self, framework: Framework) -> PathBuf {
        self.build_system.join(framework.id())
    }

    /// Binaries and toolchain logs
    pub fn output_dir(&self, framework: Framework) -> PathBuf {
        self.framework_dir(framework).join("output")
    }

    /// Generated IDE projects
    pub fn project_dir(&self, framework: Framework) -> PathBuf {
        self.framework_dir(framework).join("project")
    }

    /// Language-server configuration tree
    pub fn clangd_dir(&self, framework: Framework) -> PathBuf {
        self.framework_dir(framework).join("clangd")
    }

    /// Final renamed archives
    pub fn product_dir(&self, framework: Framework) -> PathBuf {
        self.framework_dir(framework).join("product")
    }

    /// `build_system/<framework>/product/{os}-{framework}-{build type}{ext}`
    pub fn product_path(&self, os: HostOs, framework: Framework, build_type: BuildType, archive: &Path) -> PathBuf {
        let name = format!(
            "{}-{}-{}{}",
            os.product_name(),
            framework.id(),
            build_type.as_str(),
            full_extension(archive)
        );
        self.product_dir(framework).join(name)
    }
}

/// Every suffix of the file name (`.tar.gz`, not just `.gz`)
pub fn full_extension(path: &Path) -> String {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
        return String::new();
    };
    let name = name.trim_start_matches('.');
    match name.find('.') {
        Some(dot) if !name.ends_with('.') => name[dot..].to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ProjectLayout {
        ProjectLayout::new("/work/sparkle", &PathsConfig::default())
    }

    #[test]
    fn framework_directories() {
        let layout = layout();
        assert_eq!(
            layout.output_dir(Framework::Glfw),
            PathBuf::from("/work/sparkle/build_system/glfw/output")
        );
        assert_eq!(
            layout.clangd_dir(Framework::Ios),
            PathBuf::from("/work/sparkle/build_system/ios/clangd")
        );
        assert_eq!(layout.resources_dir(), Path::new("/work/sparkle/resources"));
    }

    #[test]
    fn product_naming() {
        let layout = layout();
        assert_eq!(
            layout.product_path(HostOs::Linux, Framework::Glfw, BuildType::Debug, Path::new("/x/product.zip")),
            PathBuf::from("/work/sparkle/build_system/glfw/product/linux-glfw-Debug.zip")
        );
        assert_eq!(
            layout.product_path(
                HostOs::MacOS,
                Framework::Android,
                BuildType::Release,
                Path::new("/x/app-release.apk")
            ),
            PathBuf::from("/work/sparkle/build_system/android/product/macos-android-Release.apk")
        );
    }

    #[test]
    fn extensions_keep_every_suffix() {
        assert_eq!(full_extension(Path::new("sparkle.ipa")), ".ipa");
        assert_eq!(full_extension(Path::new("bundle.tar.gz")), ".tar.gz");
        assert_eq!(full_extension(Path::new(".hidden")), "");
        assert_eq!(full_extension(Path::new("sparkle")), "");
    }
}
