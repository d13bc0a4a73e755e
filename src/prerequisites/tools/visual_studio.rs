//! Visual Studio 2022 (Windows desktop builds)

use super::{Installation, Tool};
use crate::platform::Host;
use crate::prerequisites::{ResolveContext, ToolKind};
use crate::process::{probe, CommandLine, PROBE_TIMEOUT};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const VSWHERE_LOCATIONS: [&str; 2] = [
    r"C:\Program Files (x86)\Microsoft Visual Studio\Installer\vswhere.exe",
    r"C:\Program Files\Microsoft Visual Studio\Installer\vswhere.exe",
];

const DEFAULT_INSTALLS: [&str; 3] = [
    r"C:\Program Files\Microsoft Visual Studio\2022\Professional",
    r"C:\Program Files\Microsoft Visual Studio\2022\Community",
    r"C:\Program Files\Microsoft Visual Studio\2022\Enterprise",
];

/// Installation root holding `vcvars64.bat` and the bundled `clang-cl`
pub struct VisualStudio;

impl VisualStudio {
    /// Environment setup script inside an installation
    pub fn vcvars(root: &Path) -> PathBuf {
        root.join("VC").join("Auxiliary").join("Build").join("vcvars64.bat")
    }

    /// Clang front end shipped with the C++ Clang tools component
    pub fn clang_cl(root: &Path) -> PathBuf {
        root.join("VC")
            .join("Tools")
            .join("Llvm")
            .join("x64")
            .join("bin")
            .join("clang-cl.exe")
    }

    async fn query_vswhere(&self, vswhere: &Path) -> Option<PathBuf> {
        let cmd = CommandLine::new(vswhere).args([
            "-latest",
            "-products",
            "*",
            "-requires",
            "Microsoft.VisualStudio.Component.VC.Tools.x86.x64",
            "-version",
            "[17.0,18.0)",
            "-property",
            "installationPath",
            "-format",
            "value",
        ]);
        let output = probe(&cmd, PROBE_TIMEOUT).await.ok()?;
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || path.is_empty() {
            return None;
        }

        let version_cmd = CommandLine::new(vswhere).args([
            "-path",
            path.as_str(),
            "-property",
            "catalog_productDisplayVersion",
            "-format",
            "value",
        ]);
        if let Ok(version) = probe(&version_cmd, PROBE_TIMEOUT).await {
            let version = String::from_utf8_lossy(&version.stdout).trim().to_string();
            if !version.is_empty() && !version.starts_with("17.") {
                warn!("Found Visual Studio {} but VS 2022 (17.x) is required", version);
                return None;
            }
        }
        Some(PathBuf::from(path))
    }
}

#[async_trait]
impl Tool for VisualStudio {
    fn kind(&self) -> ToolKind {
        ToolKind::VisualStudio
    }

    fn version(&self) -> Option<&str> {
        None
    }

    fn validate(&self, root: &Path, _host: Host) -> Option<Installation> {
        let vcvars = Self::vcvars(root);
        (vcvars.is_file() && Self::clang_cl(root).is_file()).then(|| Installation::new(root, vcvars))
    }

    async fn locate_system(&self, cx: &ResolveContext) -> Option<Installation> {
        if !cx.host.is_windows() {
            return None;
        }

        for vswhere in VSWHERE_LOCATIONS.iter().map(Path::new).filter(|p| p.is_file()) {
            if let Some(root) = self.query_vswhere(vswhere).await {
                debug!("vswhere reported {}", root.display());
                if let Some(found) = self.validate(&root, cx.host) {
                    return Some(found);
                }
            }
        }

        DEFAULT_INSTALLS
            .iter()
            .find_map(|p| self.validate(Path::new(p), cx.host))
    }

    fn hint(&self, _host: Host) -> String {
        "Install Visual Studio 2022 with the C++ desktop workload and the C++ Clang tools component, or set VS_PATH"
            .to_string()
    }
}
