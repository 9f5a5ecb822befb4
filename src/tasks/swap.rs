use anyhow::Result;

use super::helpers::run_commands;
use super::{Context, Task, TaskResult};
use crate::exec::Executor as _;

/// Turn swap off now and on future boots; kubelet refuses to start with swap.
#[derive(Debug)]
pub struct DisableSwap;

impl Task for DisableSwap {
    fn name(&self) -> &str {
        "Disable swap"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        run_commands(
            &ctx.sudo(),
            &[
                &["swapoff", "-a"],
                &["sed", "-i", "/ swap / s/^/#/", "/etc/fstab"],
                // WSL2 mounts / private; Cilium needs shared propagation
                &["mount", "--make-shared", "/"],
            ],
        )?;
        Ok(TaskResult::Ok)
    }
}

/// Restore the swap entries commented out by [`DisableSwap`].
#[derive(Debug)]
pub struct EnableSwap;

impl Task for EnableSwap {
    fn name(&self) -> &str {
        "Re-enable swap"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let sudo = ctx.sudo();
        sudo.run("sed", &["-i", "/^#.*swap/s/^#//", "/etc/fstab"])?;
        let swapon = sudo.run_unchecked("swapon", &["-a"])?;
        if !swapon.success {
            ctx.log.debug(&format!("swapon -a: {}", swapon.stderr.trim()));
        }
        Ok(TaskResult::Ok)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use crate::tasks::test_helpers::{RecordingExecutor, make_context, root_context};
    use std::sync::Arc;

    #[test]
    fn disable_swap_comments_fstab_and_shares_root() {
        let (ctx, exec, _) = root_context();
        DisableSwap.run(&ctx).unwrap();
        assert_eq!(
            exec.lines(),
            vec![
                "swapoff -a",
                "sed -i / swap / s/^/#/ /etc/fstab",
                "mount --make-shared /",
            ]
        );
    }

    #[test]
    fn disable_swap_stops_on_swapoff_failure() {
        let exec = Arc::new(RecordingExecutor::new().failing_on("swapoff"));
        let (ctx, _) = make_context(Platform::new(false, true), exec.clone(), &[]);
        assert!(DisableSwap.run(&ctx).is_err());
        assert_eq!(exec.lines().len(), 1);
    }

    #[test]
    fn enable_swap_ignores_swapon_failure() {
        let exec = Arc::new(RecordingExecutor::new().failing_on("swapon"));
        let (ctx, _) = make_context(Platform::new(false, true), exec.clone(), &[]);
        assert_eq!(EnableSwap.run(&ctx).unwrap(), TaskResult::Ok);
        assert_eq!(
            exec.lines(),
            vec!["sed -i /^#.*swap/s/^#// /etc/fstab", "swapon -a"]
        );
    }
}
