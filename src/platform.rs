use std::path::Path;

/// Kernel version string; contains "microsoft" under WSL.
const PROC_VERSION: &str = "/proc/version";

/// Platform information for the current system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Running inside the Windows Subsystem for Linux.
    pub is_wsl: bool,
    /// The effective user is root, so commands need no elevation.
    pub privileged: bool,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub fn detect() -> Self {
        let proc_version = std::fs::read_to_string(Path::new(PROC_VERSION)).unwrap_or_default();
        Self {
            is_wsl: is_wsl_kernel(&proc_version),
            privileged: nix::unistd::geteuid().is_root(),
        }
    }

    /// Create a platform with explicit values (for testing).
    #[must_use]
    pub const fn new(is_wsl: bool, privileged: bool) -> Self {
        Self { is_wsl, privileged }
    }
}

/// Whether a `/proc/version` string belongs to a WSL kernel.
#[must_use]
pub fn is_wsl_kernel(proc_version: &str) -> bool {
    proc_version.to_lowercase().contains("microsoft")
}
