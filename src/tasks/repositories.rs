//! Third-party apt repositories for containerd and the Kubernetes tools.
use anyhow::Result;

use super::helpers::{run_each, write_root_file};
use super::{Context, Task, TaskResult};
use crate::exec::Executor as _;

/// Docker's signing key, which also signs `containerd.io`.
pub const DOCKER_KEY_URL: &str = "https://download.docker.com/linux/ubuntu/gpg";
/// Dearmored Docker key.
pub const DOCKER_KEYRING: &str = "/usr/share/keyrings/docker-archive-keyring.gpg";
/// Docker apt source list.
pub const DOCKER_LIST: &str = "/etc/apt/sources.list.d/docker.list";
/// Dearmored `pkgs.k8s.io` key.
pub const KUBERNETES_KEYRING: &str = "/usr/share/keyrings/kubernetes-apt-keyring.gpg";
/// Kubernetes apt source list.
pub const KUBERNETES_LIST: &str = "/etc/apt/sources.list.d/kubernetes.list";
/// Keyring used by the retired `apt.kubernetes.io` repository.
const LEGACY_KUBERNETES_KEYRING: &str = "/usr/share/keyrings/kubernetes-archive-keyring.gpg";

/// Fetch the key at `url` and store it dearmored in `keyring`.
///
/// # Errors
///
/// Returns an error if the download or `gpg --dearmor` fails.
pub fn add_signing_key(ctx: &Context, url: &str, keyring: &str) -> Result<()> {
    let key = ctx.executor.run("curl", &["-fsSL", url])?.stdout;
    ctx.sudo().run_with_input(
        "gpg",
        &["--dearmor", "-o", keyring, "--yes"],
        key.as_bytes(),
    )?;
    Ok(())
}

/// Write a one-line apt source list.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn add_source(ctx: &Context, list: &str, line: &str) -> Result<()> {
    ctx.log.debug(&format!("{list}: {line}"));
    write_root_file(ctx, list, &format!("{line}\n"))
}

/// Remove the source lists and keyrings added by install.
#[derive(Debug)]
pub struct RemoveRepositorySources;

impl Task for RemoveRepositorySources {
    fn name(&self) -> &str {
        "Remove repository sources"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let commands: &[&[&str]] = &[
            &["rm", "-f", KUBERNETES_LIST],
            &["rm", "-f", DOCKER_LIST],
            &["rm", "-f", LEGACY_KUBERNETES_KEYRING],
            &["rm", "-f", KUBERNETES_KEYRING],
            &["rm", "-f", DOCKER_KEYRING],
            &["apt-get", "update"],
        ];
        run_each(&ctx.sudo(), commands)?;
        Ok(TaskResult::Ok)
    }
}
