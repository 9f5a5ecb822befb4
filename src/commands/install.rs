use std::sync::Arc;

use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::logging::Logger;
use crate::tasks::{self, Policy};

/// Run the install command.
///
/// Steps run in order and the first failure aborts the run.
///
/// # Errors
///
/// Returns an error if setup fails or any step fails.
pub fn run(global: &GlobalOpts, log: &Arc<Logger>) -> Result<()> {
    log.info(&format!("nucleus {}", super::version()));
    let ctx = super::setup(global, log)?;

    let result = tasks::run_steps(&tasks::all_install_tasks(), &ctx, Policy::FailFast);
    log.print_summary();
    result?;

    if ctx.dry_run {
        log.info("dry run complete, no changes were made");
    } else {
        log.info("✓ Kubernetes master node with Cilium CNI is ready!");
    }
    Ok(())
}
