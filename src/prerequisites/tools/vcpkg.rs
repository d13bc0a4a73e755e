//! vcpkg (Windows dependency manager)

use super::{is_executable, mark_executable, Installation, Tool};
use crate::error::SparkleResult;
use crate::platform::Host;
use crate::prerequisites::{ResolveContext, ToolKind};
use crate::process::{CommandLine, ToolEnv};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const REPOSITORY: &str = "https://github.com/Microsoft/vcpkg.git";

pub struct Vcpkg;

impl Vcpkg {
    /// CMake toolchain file inside a vcpkg root
    pub fn toolchain_file(root: &Path) -> PathBuf {
        root.join("scripts").join("buildsystems").join("vcpkg.cmake")
    }
}

#[async_trait]
impl Tool for Vcpkg {
    fn kind(&self) -> ToolKind {
        ToolKind::Vcpkg
    }

    fn version(&self) -> Option<&str> {
        None
    }

    fn validate(&self, root: &Path, host: Host) -> Option<Installation> {
        let exe = root.join(host.os.exe("vcpkg"));
        is_executable(&exe).then(|| Installation::new(root, exe))
    }

    async fn locate_system(&self, cx: &ResolveContext) -> Option<Installation> {
        let exe = cx.which("vcpkg")?;
        let root = exe.parent()?.to_path_buf();
        Some(Installation::new(root, exe))
    }

    fn can_install(&self, _host: Host) -> bool {
        true
    }

    /// Clone the repository and build the vcpkg binary
    async fn install(&self, cx: &ResolveContext, staging: &Path) -> SparkleResult<()> {
        // git refuses to clone into a non-empty directory; staging is fresh
        cx.run_install_step(
            CommandLine::new("git").arg("clone").arg(REPOSITORY).arg(staging),
            "Cloning vcpkg",
        )
        .await?;

        let script = if cx.host.is_windows() {
            staging.join("bootstrap-vcpkg.bat")
        } else {
            let script = staging.join("bootstrap-vcpkg.sh");
            mark_executable(&script).await?;
            script
        };

        cx.run_install_step(CommandLine::new(&script).current_dir(staging), "Building vcpkg")
            .await
    }

    fn environment(&self, install: &Installation, _cx: &ResolveContext) -> ToolEnv {
        let mut env = ToolEnv::new();
        env.set("VCPKG_ROOT", install.root.to_string_lossy());
        env
    }

    fn hint(&self, _host: Host) -> String {
        format!("Clone {} and run its bootstrap script, then set VCPKG_PATH", REPOSITORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toolchain_file_location() {
        assert_eq!(
            Vcpkg::toolchain_file(Path::new("/cache/vcpkg")),
            PathBuf::from("/cache/vcpkg/scripts/buildsystems/vcpkg.cmake")
        );
    }
}
