use anyhow::{Context as _, Result};

use super::helpers::{os_codename, package_architecture, run_commands, write_root_file};
use super::repositories::{DOCKER_KEY_URL, DOCKER_KEYRING, DOCKER_LIST, add_signing_key, add_source};
use super::{Context, Task, TaskResult};
use crate::exec::Executor as _;

const CONFIG_DIR: &str = "/etc/containerd";
const CONFIG_FILE: &str = "/etc/containerd/config.toml";

/// Install `containerd.io` from Docker's apt repository.
#[derive(Debug)]
pub struct InstallContainerd;

impl Task for InstallContainerd {
    fn name(&self) -> &str {
        "Install containerd"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        add_signing_key(ctx, DOCKER_KEY_URL, DOCKER_KEYRING)?;

        let arch = package_architecture(ctx)?;
        let codename = os_codename(ctx)?;
        add_source(
            ctx,
            DOCKER_LIST,
            &format!(
                "deb [arch={arch} signed-by={DOCKER_KEYRING}] https://download.docker.com/linux/ubuntu {codename} stable"
            ),
        )?;

        run_commands(
            &ctx.sudo(),
            &[
                &["apt-get", "update"],
                &["apt-get", "install", "-y", "containerd.io"],
            ],
        )?;
        Ok(TaskResult::Ok)
    }
}

/// Generate the default containerd config with the systemd cgroup driver.
#[derive(Debug)]
pub struct ConfigureContainerd;

impl Task for ConfigureContainerd {
    fn name(&self) -> &str {
        "Configure containerd"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let sudo = ctx.sudo();
        sudo.run("mkdir", &["-p", CONFIG_DIR])
            .context("failed to create containerd config directory")?;

        ctx.log.info("generating default containerd configuration");
        let defaults = ctx
            .executor
            .run("containerd", &["config", "default"])
            .context("failed to generate containerd config")?
            .stdout;
        write_root_file(ctx, CONFIG_FILE, &defaults)
            .context("failed to write containerd config")?;

        sudo.run(
            "sed",
            &[
                "-i",
                "s/SystemdCgroup = false/SystemdCgroup = true/g",
                CONFIG_FILE,
            ],
        )
        .context("failed to enable SystemdCgroup")?;

        run_commands(
            &sudo,
            &[
                &["systemctl", "daemon-reload"],
                &["systemctl", "enable", "containerd"],
                &["systemctl", "restart", "containerd"],
            ],
        )
        .context("failed to restart containerd")?;

        ctx.settle(ctx.config.containerd_settle(), "containerd to initialize");
        Ok(TaskResult::Ok)
    }
}

/// Restart containerd and kubelet so the CNI is picked up.
#[derive(Debug)]
pub struct RestartContainerRuntime;

impl Task for RestartContainerRuntime {
    fn name(&self) -> &str {
        "Restart container runtime"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let sudo = ctx.sudo();
        ctx.log.info("restarting containerd");
        sudo.run("systemctl", &["restart", "containerd"])?;
        ctx.log.info("restarting kubelet");
        sudo.run("systemctl", &["restart", "kubelet"])?;
        ctx.settle(ctx.config.kubelet_settle(), "kubelet to initialize CNI");
        Ok(TaskResult::Ok)
    }
}
