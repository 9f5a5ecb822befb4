use anyhow::{Context as _, Result};

use super::helpers::lookup;
use super::kubernetes::ADMIN_KUBECONFIG;
use super::{Context, Task, TaskResult};
use crate::exec::Executor as _;

/// Give the invoking user a kubeconfig they own.
#[derive(Debug)]
pub struct ConfigureKubectl;

impl Task for ConfigureKubectl {
    fn name(&self) -> &str {
        "Configure kubectl"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let user = ctx.invoking_user()?;
        let kube_dir = user.kube_dir();
        let kube_dir = kube_dir.to_string_lossy();
        let config = format!("{kube_dir}/config");
        let sudo_user = user.name.as_deref().filter(|_| user.via_sudo);

        let created = match sudo_user {
            Some(user) => ctx
                .executor
                .run("sudo", &["-u", user, "mkdir", "-p", &kube_dir]),
            None => ctx.executor.run("mkdir", &["-p", &kube_dir]),
        };
        created.context("failed to create .kube directory")?;

        ctx.sudo().run("cp", &["-f", ADMIN_KUBECONFIG, &config])?;

        let (uid, gid) = match sudo_user {
            Some(user) => (
                lookup(ctx, "user UID", "id", &["-u", user])?,
                lookup(ctx, "user GID", "id", &["-g", user])?,
            ),
            None => (ctx.uid.to_string(), ctx.gid.to_string()),
        };
        ctx.sudo()
            .run("chown", &[&format!("{uid}:{gid}"), &config])?;

        ctx.log.info(&format!(
            "configured kubectl for {} at {config}",
            user.display_name()
        ));
        Ok(TaskResult::Ok)
    }
}

/// Delete the invoking user's `~/.kube` directory.
#[derive(Debug)]
pub struct RemoveKubectlConfig;

impl Task for RemoveKubectlConfig {
    fn name(&self) -> &str {
        "Remove kubectl configuration"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let kube_dir = ctx.invoking_user()?.kube_dir();
        if ctx.dry_run {
            ctx.log
                .dry_run(&format!("would remove {}", kube_dir.display()));
            return Ok(TaskResult::DryRun);
        }
        ctx.fs_ops.remove_dir_all(&kube_dir)?;
        ctx.log.debug(&format!("removed {}", kube_dir.display()));
        Ok(TaskResult::Ok)
    }
}
