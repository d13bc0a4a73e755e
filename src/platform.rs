//! Host platform detection
//!
//! Every OS- or architecture-dependent decision goes through [`Host`] so it
//! can be overridden in tests instead of branching on `cfg!` at call sites.

use std::fmt;

/// Operating system of the machine running the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOs {
    Linux,
    MacOS,
    Windows,
    /// Anything else; auto-installation is refused
    Unsupported,
}

impl HostOs {
    /// Detect the current operating system
    pub fn detect() -> Self {
        match std::env::consts::OS {
            "linux" => HostOs::Linux,
            "macos" => HostOs::MacOS,
            "windows" => HostOs::Windows,
            _ => HostOs::Unsupported,
        }
    }

    /// Name used in product file names (`{os}-{framework}-{build-type}.zip`)
    pub fn product_name(&self) -> &'static str {
        match self {
            HostOs::Linux => "linux",
            HostOs::MacOS => "macos",
            HostOs::Windows => "windows",
            HostOs::Unsupported => "unknown",
        }
    }

    /// Suffix for executables on this OS
    pub fn exe_suffix(&self) -> &'static str {
        match self {
            HostOs::Windows => ".exe",
            _ => "",
        }
    }

    /// Append the executable suffix to a program name
    pub fn exe(&self, name: &str) -> String {
        format!("{}{}", name, self.exe_suffix())
    }

    /// Separator for PATH-like environment variables
    pub fn path_separator(&self) -> &'static str {
        match self {
            HostOs::Windows => ";",
            _ => ":",
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostOs::Linux => "Linux",
            HostOs::MacOS => "macOS",
            HostOs::Windows => "Windows",
            HostOs::Unsupported => std::env::consts::OS,
        };
        write!(f, "{}", name)
    }
}

/// CPU architecture of the machine running the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    Aarch64,
    Unsupported,
}

impl Arch {
    /// Detect the current architecture
    pub fn detect() -> Self {
        match std::env::consts::ARCH {
            "x86_64" => Arch::X86_64,
            "aarch64" => Arch::Aarch64,
            _ => Arch::Unsupported,
        }
    }

    /// Name used by most release artifacts
    pub fn name(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::Unsupported => std::env::consts::ARCH,
        }
    }
}

/// Operating system and architecture pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Host {
    pub os: HostOs,
    pub arch: Arch,
}

impl Host {
    /// Detect the current host
    pub fn detect() -> Self {
        Self {
            os: HostOs::detect(),
            arch: Arch::detect(),
        }
    }

    pub fn new(os: HostOs, arch: Arch) -> Self {
        Self { os, arch }
    }

    pub fn is_macos(&self) -> bool {
        self.os == HostOs::MacOS
    }

    pub fn is_windows(&self) -> bool {
        self.os == HostOs::Windows
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.os, self.arch.name())
    }
}
