use anyhow::Result;

use super::helpers::{run_commands, run_each};
use super::repositories::{KUBERNETES_KEYRING, KUBERNETES_LIST, add_signing_key, add_source};
use super::{Context, Task, TaskResult};
use crate::exec::Executor as _;

/// Cluster-admin kubeconfig written by `kubeadm init`.
pub const ADMIN_KUBECONFIG: &str = "/etc/kubernetes/admin.conf";

const TOOLS: &[&str] = &["kubelet", "kubeadm", "kubectl"];

/// State left behind by `kubeadm` and the CNI.
const STATE_DIRS: &[&str] = &[
    "/etc/kubernetes",
    "/var/lib/kubelet",
    "/var/lib/etcd",
    "/etc/cni/net.d",
    "/opt/cni/bin",
];

fn with_tools<'a>(prefix: &[&'a str]) -> Vec<&'a str> {
    let mut command = prefix.to_vec();
    command.extend_from_slice(TOOLS);
    command
}

/// Install and pin kubelet, kubeadm and kubectl from `pkgs.k8s.io`.
#[derive(Debug)]
pub struct InstallKubernetesTools;

impl Task for InstallKubernetesTools {
    fn name(&self) -> &str {
        "Install Kubernetes tools"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let repo = ctx.config.kubernetes_repo_url();
        add_signing_key(ctx, &format!("{repo}Release.key"), KUBERNETES_KEYRING)?;
        add_source(
            ctx,
            KUBERNETES_LIST,
            &format!("deb [signed-by={KUBERNETES_KEYRING}] {repo} /"),
        )?;

        let install = with_tools(&["apt-get", "install", "-y"]);
        let hold = with_tools(&["apt-mark", "hold"]);
        let commands: [&[&str]; 3] = [&["apt-get", "update"], &install, &hold];
        run_commands(&ctx.sudo(), &commands)?;
        Ok(TaskResult::Ok)
    }
}

/// Bootstrap the control plane with `kubeadm init`.
#[derive(Debug)]
pub struct InitControlPlane;

impl Task for InitControlPlane {
    fn name(&self) -> &str {
        "Initialize control plane"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let cidr = format!("--pod-network-cidr={}", ctx.config.pod_network_cidr);
        let socket = format!("--cri-socket={}", ctx.config.cri_socket);
        ctx.sudo().run("kubeadm", &["init", &cidr, &socket])?;
        Ok(TaskResult::Ok)
    }
}

/// Allow workloads on the single node by removing the control-plane taint.
///
/// The taint may already be gone, so a failure is only a warning.
#[derive(Debug)]
pub struct UntaintControlPlane;

impl Task for UntaintControlPlane {
    fn name(&self) -> &str {
        "Untaint control-plane node"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let result = ctx.executor.run_with_env(
            "kubectl",
            &[
                "taint",
                "nodes",
                "--all",
                "node-role.kubernetes.io/control-plane-",
            ],
            &[("KUBECONFIG", ADMIN_KUBECONFIG)],
        );
        if let Err(e) = result {
            ctx.log.warn(&format!("could not remove taint: {e:#}"));
        }
        Ok(TaskResult::Ok)
    }
}

/// Tear down the cluster state with `kubeadm reset`.
#[derive(Debug)]
pub struct ResetKubeadm;

impl Task for ResetKubeadm {
    fn name(&self) -> &str {
        "Reset kubeadm"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        ctx.sudo().run("kubeadm", &["reset", "-f"])?;
        Ok(TaskResult::Ok)
    }
}

/// Unpin and purge the Kubernetes packages.
#[derive(Debug)]
pub struct RemoveKubernetesPackages;

impl Task for RemoveKubernetesPackages {
    fn name(&self) -> &str {
        "Remove Kubernetes packages"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let unhold = with_tools(&["apt-mark", "unhold"]);
        let purge = with_tools(&["apt-get", "purge", "-y"]);
        let commands: [&[&str]; 3] = [&unhold, &purge, &["apt-get", "autoremove", "-y"]];
        run_each(&ctx.sudo(), &commands)?;
        Ok(TaskResult::Ok)
    }
}

/// Delete the directories left behind by the cluster.
#[derive(Debug)]
pub struct CleanupDirectories;

impl Task for CleanupDirectories {
    fn name(&self) -> &str {
        "Clean up directories"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let commands: Vec<[&str; 3]> = STATE_DIRS.iter().map(|dir| ["rm", "-rf", *dir]).collect();
        let commands: Vec<&[&str]> = commands.iter().map(<[&str; 3]>::as_slice).collect();
        run_each(&ctx.sudo(), &commands)?;
        Ok(TaskResult::Ok)
    }
}
