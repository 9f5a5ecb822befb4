use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::config::Config;
use crate::exec::{Elevated, Executor};
use crate::logging::Log;
use crate::operations::{FileSystemOps, SystemFileSystemOps};
use crate::platform::Platform;

/// The user the installer acts on behalf of.
///
/// Under `sudo` this is the caller from `SUDO_USER`, not root, so that the
/// kubeconfig lands in their home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokingUser {
    /// Login name, if known.
    pub name: Option<String>,
    /// Home directory that receives `.kube/config`.
    pub home: PathBuf,
    /// Whether the name came from `SUDO_USER`.
    pub via_sudo: bool,
}

impl InvokingUser {
    /// Resolve the invoking user from an environment snapshot.
    ///
    /// A non-root `SUDO_USER` maps to `/home/<user>`; otherwise `HOME` and
    /// `USER` describe the current user.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no usable `SUDO_USER` and `HOME` is unset.
    pub fn from_env(env: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| env.get(key).map(String::as_str).filter(|v| !v.is_empty());

        if let Some(user) = get("SUDO_USER").filter(|u| *u != "root") {
            return Ok(Self {
                name: Some(user.to_string()),
                home: PathBuf::from("/home").join(user),
                via_sudo: true,
            });
        }

        let home = get("HOME").ok_or_else(|| anyhow!("HOME environment variable is not set"))?;
        Ok(Self {
            name: get("USER").map(String::from),
            home: PathBuf::from(home),
            via_sudo: false,
        })
    }

    /// The user's `~/.kube` directory.
    #[must_use]
    pub fn kube_dir(&self) -> PathBuf {
        self.home.join(".kube")
    }

    /// Name for log messages.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("current user")
    }
}

/// Shared execution context passed to every step.
///
/// Holds everything a step may read from the host environment so that steps
/// never consult process globals directly.
pub struct Context {
    /// Installer settings.
    pub config: Arc<Config>,
    /// Detected platform information.
    pub platform: Platform,
    /// Logger for output and step recording.
    pub log: Arc<dyn Log>,
    /// Command executor (real, dry-run, or a test double).
    pub executor: Arc<dyn Executor>,
    /// Filesystem operation abstraction (injectable for testing).
    pub fs_ops: Arc<dyn FileSystemOps>,
    /// Environment snapshot taken at startup.
    pub env: HashMap<String, String>,
    /// Real UID of this process.
    pub uid: u32,
    /// Real GID of this process.
    pub gid: u32,
    /// Log commands instead of running them.
    pub dry_run: bool,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("platform", &self.platform)
            .field("log", &"<dyn Log>")
            .field("executor", &"<dyn Executor>")
            .field("fs_ops", &"<dyn FileSystemOps>")
            .field("env", &format!("<{} vars>", self.env.len()))
            .field("uid", &self.uid)
            .field("gid", &self.gid)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Context {
    /// Creates a context from an environment snapshot and the current process
    /// credentials.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        platform: Platform,
        log: Arc<dyn Log>,
        executor: Arc<dyn Executor>,
        env: HashMap<String, String>,
        dry_run: bool,
    ) -> Self {
        Self {
            config,
            platform,
            log,
            executor,
            fs_ops: Arc::new(SystemFileSystemOps),
            env,
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
            dry_run,
        }
    }

    /// The user the kubeconfig is written for.
    ///
    /// Resolved on demand so that only the steps touching `~/.kube` fail
    /// when the environment does not name a home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no usable `SUDO_USER` and `HOME` is unset.
    pub fn invoking_user(&self) -> Result<InvokingUser> {
        InvokingUser::from_env(&self.env)
    }

    /// The executor wrapped with `sudo` elevation when not running as root.
    #[must_use]
    pub fn sudo(&self) -> Elevated<'_> {
        Elevated::new(self.executor.as_ref(), self.platform.privileged)
    }

    /// Block for `duration` to let a daemon settle. Skipped in dry-run.
    pub fn settle(&self, duration: Duration, what: &str) {
        if duration.is_zero() {
            return;
        }
        if self.dry_run {
            self.log.dry_run(&format!(
                "would wait {}s for {what}",
                duration.as_secs()
            ));
            return;
        }
        self.log
            .info(&format!("waiting {}s for {what}", duration.as_secs()));
        std::thread::sleep(duration);
    }

    /// Create a copy of this context with a different [`FileSystemOps`].
    #[cfg(test)]
    #[must_use]
    pub fn with_fs_ops(self, fs_ops: Arc<dyn FileSystemOps>) -> Self {
        Self { fs_ops, ..self }
    }
}
