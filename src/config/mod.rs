//! Installer settings.
//!
//! Every setting has a default matching a stock single-node install, so the
//! config file is optional. A file is read from `--config <path>` or the
//! `NUCLEUS_CONFIG` environment variable:
//!
//! ```toml
//! kubernetes-version = "v1.31"
//! pod-network-cidr = "10.0.0.0/16"
//! cilium-version = "1.18.2"
//! kubelet-settle-secs = 15
//! ```
pub mod toml_loader;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "NUCLEUS_CONFIG";

/// Settings that parameterize the install and cleanup pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Kubernetes minor release channel on `pkgs.k8s.io`, e.g. `v1.31`.
    pub kubernetes_version: String,
    /// Pod network CIDR handed to `kubeadm init`.
    pub pod_network_cidr: String,
    /// CRI endpoint handed to `kubeadm init`.
    pub cri_socket: String,
    /// Cilium release installed by `cilium install --version`.
    pub cilium_version: String,
    /// Text file holding the latest stable Cilium CLI tag.
    pub cilium_cli_stable_url: String,
    /// Directory the Cilium CLI binary is extracted into.
    pub binary_dir: PathBuf,
    /// Where release tarballs are downloaded; a fresh private temp dir if unset.
    pub download_dir: Option<PathBuf>,
    /// Seconds to wait after restarting containerd.
    pub containerd_settle_secs: u64,
    /// Seconds to wait after restarting kubelet.
    pub kubelet_settle_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kubernetes_version: "v1.31".to_string(),
            pod_network_cidr: "10.0.0.0/16".to_string(),
            cri_socket: "unix:///run/containerd/containerd.sock".to_string(),
            cilium_version: "1.18.2".to_string(),
            cilium_cli_stable_url:
                "https://raw.githubusercontent.com/cilium/cilium-cli/main/stable.txt".to_string(),
            binary_dir: PathBuf::from("/usr/local/bin"),
            download_dir: None,
            containerd_settle_secs: 5,
            kubelet_settle_secs: 15,
        }
    }
}

impl Config {
    /// Load settings from `path`, or return the defaults when no path is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or holds
    /// an unusable value.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = match path {
            Some(path) => toml_loader::load_config(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let minor = self.kubernetes_version.strip_prefix('v').unwrap_or_default();
        if minor.split('.').count() != 2 || !minor.split('.').all(is_number) {
            return Err(ConfigError::InvalidValue {
                key: "kubernetes-version",
                message: format!(
                    "expected a minor release like v1.31, got '{}'",
                    self.kubernetes_version
                ),
            });
        }
        match self.pod_network_cidr.split_once('/') {
            Some((addr, bits)) if !addr.is_empty() && is_number(bits) => {}
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: "pod-network-cidr",
                    message: format!("expected CIDR notation, got '{}'", self.pod_network_cidr),
                });
            }
        }
        if self.cilium_version.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "cilium-version",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Base URL of the Kubernetes apt repository for the configured release.
    #[must_use]
    pub fn kubernetes_repo_url(&self) -> String {
        format!(
            "https://pkgs.k8s.io/core:/stable:/{}/deb/",
            self.kubernetes_version
        )
    }

    /// Settle time after a containerd restart.
    #[must_use]
    pub const fn containerd_settle(&self) -> Duration {
        Duration::from_secs(self.containerd_settle_secs)
    }

    /// Settle time after a kubelet restart.
    #[must_use]
    pub const fn kubelet_settle(&self) -> Duration {
        Duration::from_secs(self.kubelet_settle_secs)
    }
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
