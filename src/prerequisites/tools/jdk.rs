//! Java toolchain for the Android build

use super::{bin_in, Installation, Tool};
use crate::platform::{Host, HostOs};
use crate::prerequisites::{ResolveContext, ToolKind};
use crate::process::ToolEnv;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// A `JAVA_HOME` holding `bin/java`
pub struct Jdk;

impl Jdk {
    /// Java homes bundled with Android Studio or installed by distro packages
    pub fn candidates(host: Host) -> Vec<PathBuf> {
        match host.os {
            HostOs::MacOS => vec![
                PathBuf::from("/Applications/Android Studio.app/Contents/jbr/Contents/Home"),
                PathBuf::from("/Applications/Android Studio.app/Contents/jre/Contents/Home"),
            ],
            HostOs::Windows => vec![
                PathBuf::from("C:/Program Files/Android/Android Studio/jbr"),
                PathBuf::from("C:/Program Files/Android/Android Studio/jre"),
            ],
            HostOs::Linux => {
                let mut paths = vec![
                    PathBuf::from("/usr/lib/jvm/temurin-17-jdk-amd64"),
                    PathBuf::from("/usr/lib/jvm/java-17-openjdk-amd64"),
                    PathBuf::from("/usr/lib/jvm/java-17"),
                    PathBuf::from("/opt/android-studio/jbr"),
                ];
                if let Some(home) = dirs::home_dir() {
                    paths.push(home.join("android-studio").join("jbr"));
                }
                paths.push(PathBuf::from("/snap/android-studio/current/android-studio/jbr"));
                paths
            }
            HostOs::Unsupported => Vec::new(),
        }
    }

    /// Where the IDE puts its bundled runtime by default
    pub fn default_ide_path(host: Host) -> &'static str {
        match host.os {
            HostOs::MacOS => "/Applications/Android Studio.app/Contents/jbr/Contents/Home",
            HostOs::Windows => "C:/Program Files/Android/Android Studio/jbr",
            _ => "/opt/android-studio/jbr",
        }
    }
}

#[async_trait]
impl Tool for Jdk {
    fn kind(&self) -> ToolKind {
        ToolKind::Jdk
    }

    fn version(&self) -> Option<&str> {
        None
    }

    fn validate(&self, root: &Path, host: Host) -> Option<Installation> {
        bin_in(root, host, "java").map(|java| Installation::new(root, java))
    }

    async fn locate_system(&self, cx: &ResolveContext) -> Option<Installation> {
        Self::candidates(cx.host)
            .iter()
            .find_map(|candidate| self.validate(candidate, cx.host))
    }

    fn environment(&self, install: &Installation, _cx: &ResolveContext) -> ToolEnv {
        let mut env = ToolEnv::new();
        env.set("JAVA_HOME", install.root.to_string_lossy());
        env.prepend_path(install.root.join("bin"));
        env
    }

    fn hint(&self, host: Host) -> String {
        format!(
            "Install Android Studio (bundles a JDK) or JDK 17, then set JAVA_HOME, e.g. export JAVA_HOME='{}'",
            Self::default_ide_path(host)
        )
    }
}
