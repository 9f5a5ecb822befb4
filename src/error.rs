//! Domain-specific error types for the installer.
//!
//! Step implementations return [`anyhow::Result`] so that every external
//! command failure carries its context chain. The pipeline runner converts a
//! failing step into [`ProvisionError::StepFailed`], which is what the CLI
//! reports to the user.
//!
//! # Error hierarchy
//!
//! ```text
//! ProvisionError
//! ├── StepFailed            a pipeline step returned an error
//! ├── WslRestartRequired    /etc/wsl.conf was changed, WSL must restart
//! ├── ChecksumMismatch      a downloaded artifact failed verification
//! └── EmptyLookup           a subprocess query returned nothing
//! ConfigError               config file I/O and TOML parsing
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while provisioning or tearing down the node.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// A named pipeline step failed.
    #[error("{step} failed: {reason}")]
    StepFailed {
        /// Name of the step that failed.
        step: String,
        /// Rendered error chain of the underlying failure.
        reason: String,
    },

    /// `/etc/wsl.conf` had to be updated to enable systemd.
    #[error(
        "WSL restart required - run 'wsl --shutdown' from Windows PowerShell, restart WSL and run install again"
    )]
    WslRestartRequired,

    /// A downloaded file did not match its published SHA-256 digest.
    #[error("checksum verification failed for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// File that was verified.
        file: String,
        /// Digest published alongside the download.
        expected: String,
        /// Digest computed locally.
        actual: String,
    },

    /// A subprocess lookup produced no output.
    #[error("could not determine {0}")]
    EmptyLookup(&'static str),
}

/// Errors that arise while loading the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("IO error reading config file {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has mistyped keys.
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// Path to the offending file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid value for '{key}': {message}")]
    InvalidValue {
        /// Config key.
        key: &'static str,
        /// What is wrong with it.
        message: String,
    },
}
