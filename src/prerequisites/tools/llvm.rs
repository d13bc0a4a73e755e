//! LLVM / clang for non-Windows desktop and Apple IDE tooling

use super::{bin_in, Installation, Tool};
use crate::platform::{Host, HostOs};
use crate::prerequisites::{ResolveContext, ToolKind};
use crate::process::CommandLine;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

const HOMEBREW_PREFIXES: [&str; 2] = ["/opt/homebrew/opt/llvm", "/usr/local/opt/llvm"];
const LINUX_PREFIXES: [&str; 2] = ["/usr/local/llvm", "/opt/llvm"];

/// Prefix holding `bin/clang` and `bin/clang++`
pub struct Llvm;

impl Llvm {
    fn first_valid<'a>(&self, prefixes: impl IntoIterator<Item = &'a str>, host: Host) -> Option<Installation> {
        prefixes
            .into_iter()
            .find_map(|prefix| self.validate(Path::new(prefix), host))
    }
}

#[async_trait]
impl Tool for Llvm {
    fn kind(&self) -> ToolKind {
        ToolKind::Llvm
    }

    fn version(&self) -> Option<&str> {
        None
    }

    fn validate(&self, root: &Path, host: Host) -> Option<Installation> {
        let clang = bin_in(root, host, "clang")?;
        bin_in(root, host, "clang++")?;
        Some(Installation::new(root, clang))
    }

    async fn locate_system(&self, cx: &ResolveContext) -> Option<Installation> {
        if cx.host.os == HostOs::MacOS {
            // Xcode's clang first, then Homebrew
            if let Some(found) = self.validate(Path::new("/usr"), cx.host) {
                info!("Found Xcode clang at /usr");
                return Some(found);
            }
            return self.first_valid(HOMEBREW_PREFIXES, cx.host);
        }

        if let Some(clang) = cx.which("clang") {
            let prefix: Option<PathBuf> = clang.parent().and_then(Path::parent).map(Path::to_path_buf);
            if let Some(found) = prefix.and_then(|p| self.validate(&p, cx.host)) {
                return Some(found);
            }
        }
        self.first_valid(LINUX_PREFIXES, cx.host)
    }

    async fn install_with_package_manager(&self, cx: &ResolveContext) -> bool {
        cx.host.is_macos()
            && cx
                .package_manager_install(CommandLine::new("brew").args(["install", "llvm"]), "LLVM")
                .await
    }

    fn hint(&self, host: Host) -> String {
        match host.os {
            HostOs::MacOS => "Install Xcode command line tools (xcode-select --install) or run: brew install llvm".to_string(),
            HostOs::Linux => {
                "Install clang with your package manager (sudo apt install clang, sudo dnf install clang) or set LLVM to its prefix".to_string()
            }
            _ => "Install LLVM and set LLVM to its installation prefix".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Arch;

    #[cfg(unix)]
    #[test]
    fn requires_both_compilers() {
        use crate::prerequisites::context::testing::write_executable;

        let temp = tempfile::TempDir::new().unwrap();
        let host = Host::new(HostOs::Linux, Arch::X86_64);
        write_executable(&temp.path().join("bin/clang"));
        assert!(Llvm.validate(temp.path(), host).is_none());

        write_executable(&temp.path().join("bin/clang++"));
        let found = Llvm.validate(temp.path(), host).unwrap();
        assert_eq!(found.root, temp.path());
        assert_eq!(found.path, temp.path().join("bin/clang"));
    }

    #[test]
    fn linux_hint_names_package_managers() {
        let hint = Llvm.hint(Host::new(HostOs::Linux, Arch::X86_64));
        assert!(hint.contains("apt install clang"));
        assert!(hint.contains("dnf install clang"));
    }
}
