use anyhow::Result;

use super::{Context, Task, TaskResult};

/// Stop and remove every Docker container. Failures are ignored.
#[derive(Debug)]
pub struct StopContainers;

impl Task for StopContainers {
    fn name(&self) -> &str {
        "Stop containers"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        if !ctx.executor.which("docker") {
            return Ok(TaskResult::Skipped("docker not installed".to_string()));
        }

        let listed = ctx.executor.run_unchecked("docker", &["ps", "-aq"])?;
        let ids: Vec<&str> = listed.stdout.split_whitespace().collect();
        if ids.is_empty() {
            ctx.log.info("no containers found");
            return Ok(TaskResult::Ok);
        }

        for action in ["stop", "rm"] {
            let mut args = vec![action];
            args.extend_from_slice(&ids);
            let result = ctx.executor.run_unchecked("docker", &args)?;
            if !result.success {
                ctx.log
                    .debug(&format!("docker {action}: {}", result.stderr.trim()));
            }
        }
        ctx.log.info(&format!("removed {} containers", ids.len()));
        Ok(TaskResult::Ok)
    }
}
